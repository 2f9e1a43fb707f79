//! One chart card: controls, OHLC pill, overlay list and the plot itself.

use eframe::egui::{self, Align, Color32, Frame, Id, Key, Layout, Margin, Spinner, TextEdit, Ui};
use strum::IntoEnumIterator;

use crate::chart::{ChartEvent, ChartInstance};
use crate::config::PLOT_CONFIG;
use crate::domain::{CandlePoint, Interval, RetracementParams};
use crate::ui::config::{UI_CONFIG, UI_TEXT};
use crate::ui::page_controller::ChartAction;
use crate::ui::plot_view::PlotView;
use crate::ui::styles::UiStyleExt;
use crate::ui::utils::colored_heading;
use crate::utils::format::{fmt_num, fmt_ymd_hm_utc, parse_utc_datetime};

/// UI-only state kept per card between frames.
#[derive(Default)]
pub struct CardState {
    pub plot: PlotView,
    symbol_input: String,
    form: Option<RetracementForm>,
}

/// What the user did to a card this frame.
#[derive(Default)]
pub struct CardOutput {
    pub actions: Vec<ChartAction>,
    pub events: Vec<ChartEvent>,
}

/// Text fields of the retracement popup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetracementForm {
    pub start_date: String,
    pub start_price: String,
    pub end_date: String,
    pub end_price: String,
    pub error: Option<String>,
}

impl RetracementForm {
    /// Dates default to the first and last candle in view; prices start blank.
    pub fn prefilled(chart: &ChartInstance) -> Self {
        let candles = chart.candles();
        let (first, last) = match chart.widget() {
            Some(widget) if !candles.is_empty() => {
                let window = widget.options().x_window;
                let last_index = candles.len() - 1;
                let first = (window.min.ceil().max(0.0) as usize).min(last_index);
                let last = (window.max.floor().max(0.0) as usize).min(last_index);
                (Some(candles[first]), Some(candles[last]))
            }
            _ => (None, None),
        };
        Self {
            start_date: first.map(|c| fmt_ymd_hm_utc(c.timestamp_ms)).unwrap_or_default(),
            end_date: last.map(|c| fmt_ymd_hm_utc(c.timestamp_ms)).unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Validates the form. A blank price takes the close of the candle at that date.
    pub fn build(&self, candles: &[CandlePoint]) -> Result<RetracementParams, String> {
        let start_date_ms =
            parse_utc_datetime(&self.start_date).ok_or("Unreadable start date")?;
        let end_date_ms = parse_utc_datetime(&self.end_date).ok_or("Unreadable end date")?;
        if end_date_ms <= start_date_ms {
            return Err("End date must be after the start date".to_string());
        }

        let start_price = resolve_price(&self.start_price, candles, start_date_ms, "start")?;
        let end_price = resolve_price(&self.end_price, candles, end_date_ms, "end")?;
        if start_price == end_price {
            return Err("Start and end prices must differ".to_string());
        }

        Ok(RetracementParams {
            id: format!("ret-{}-{}", start_date_ms, end_date_ms),
            start_price,
            end_price,
            start_date_ms,
            end_date_ms,
            hidden: false,
        })
    }
}

fn resolve_price(
    text: &str,
    candles: &[CandlePoint],
    date_ms: i64,
    which: &str,
) -> Result<f64, String> {
    let text = text.trim().replace(',', "");
    if text.is_empty() {
        return close_at(candles, date_ms)
            .ok_or_else(|| format!("No loaded candle at the {} date, enter a price", which));
    }
    match text.parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(format!("Unreadable {} price", which)),
    }
}

/// Close of the candle covering `date_ms`: the last one opened at or before it.
pub fn close_at(candles: &[CandlePoint], date_ms: i64) -> Option<f64> {
    let after = candles.partition_point(|c| c.timestamp_ms <= date_ms);
    after.checked_sub(1).map(|index| candles[index].close)
}

pub fn show_chart_card(ui: &mut Ui, chart: &ChartInstance, state: &mut CardState) -> CardOutput {
    let mut output = CardOutput::default();

    Frame::group(ui.style())
        .fill(UI_CONFIG.colors.card_fill)
        .inner_margin(Margin::same(8))
        .show(ui, |ui| {
            render_toolbar(ui, chart, state, &mut output.actions);
            render_status_row(ui, chart);
            render_overlay_list(ui, chart, &mut output.actions);

            match chart.widget() {
                Some(widget) => {
                    output.events = state.plot.show(
                        ui,
                        chart.key(),
                        widget.options(),
                        widget.view_revision(),
                    );
                }
                None => {
                    ui.allocate_ui(egui::vec2(ui.available_width(), chart.height()), |ui| {
                        ui.centered_and_justified(|ui| {
                            if chart.last_error().is_some() {
                                ui.label_subdued("No data");
                            } else {
                                ui.add(Spinner::new());
                            }
                        });
                    });
                }
            }
        });

    render_retracement_popup(ui, chart, state, &mut output.actions);
    output
}

fn render_toolbar(ui: &mut Ui, chart: &ChartInstance, state: &mut CardState, actions: &mut Vec<ChartAction>) {
    ui.horizontal_wrapped(|ui| {
        ui.heading(colored_heading(chart.symbol()));

        let symbol_edit = ui.add(
            TextEdit::singleline(&mut state.symbol_input)
                .hint_text(UI_TEXT.symbol_hint)
                .desired_width(UI_CONFIG.symbol_input_width),
        );
        if symbol_edit.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter)) {
            let symbol = state.symbol_input.trim().to_uppercase();
            if !symbol.is_empty() && symbol != chart.symbol() {
                actions.push(ChartAction::ChangeSymbol(symbol));
            }
            state.symbol_input.clear();
        }

        ui.separator();
        for interval in Interval::iter() {
            if ui
                .selectable_label(chart.interval() == interval, interval.as_str())
                .clicked()
                && chart.interval() != interval
            {
                actions.push(ChartAction::SetTimeframe(interval));
            }
        }
        if ui.button(UI_TEXT.auto_interval_button).clicked() {
            actions.push(ChartAction::AutoTimeframe);
        }

        ui.separator();
        if ui.button(UI_TEXT.latest_button).clicked() {
            actions.push(ChartAction::GoToLatest);
        }
        if ui
            .selectable_label(chart.volume_visible(), UI_TEXT.volume_button)
            .clicked()
        {
            actions.push(ChartAction::ToggleVolume);
        }
        if ui.button(UI_TEXT.retracement_button).clicked() && state.form.is_none() {
            state.form = Some(RetracementForm::prefilled(chart));
        }

        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            if ui.button(UI_TEXT.remove_button).clicked() {
                actions.push(ChartAction::Remove);
            }
            if ui.button(UI_TEXT.reload_button).clicked() {
                actions.push(ChartAction::Reload);
            }
            if chart.is_loading() {
                ui.add(Spinner::new());
            }
        });
    });
}

fn render_status_row(ui: &mut Ui, chart: &ChartInstance) {
    ui.horizontal(|ui| {
        if let Some(ohlc) = chart.ohlc_label() {
            let color = if ohlc.bullish {
                PLOT_CONFIG.bullish_color
            } else {
                PLOT_CONFIG.bearish_color
            };
            ui.label_subdued(&ohlc.date);
            ui.metric("O", &ohlc.open, color);
            ui.metric("H", &ohlc.high, UI_CONFIG.colors.ohlc_neutral);
            ui.metric("L", &ohlc.low, UI_CONFIG.colors.ohlc_neutral);
            ui.metric("C", &ohlc.close, color);
        }
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            ui.label_subdued(chart.loaded_label());
        });
    });
    if let Some(error) = chart.last_error() {
        ui.label_error(error);
    }
}

fn render_overlay_list(ui: &mut Ui, chart: &ChartInstance, actions: &mut Vec<ChartAction>) {
    if chart.retracements().is_empty() {
        return;
    }
    ui.horizontal_wrapped(|ui| {
        ui.label_subheader(UI_TEXT.retracement_heading);
        for overlay in chart.retracements() {
            let mut visible = !overlay.is_hidden();
            let text = format!(
                "{} → {}",
                fmt_num(Some(overlay.params.start_price)),
                fmt_num(Some(overlay.params.end_price))
            );
            if ui.checkbox(&mut visible, text).changed() {
                actions.push(ChartAction::ToggleRetracement(overlay.id().to_string()));
            }
            if ui.small_button(UI_TEXT.remove_button).clicked() {
                actions.push(ChartAction::RemoveRetracement(overlay.id().to_string()));
            }
            ui.add_space(UI_CONFIG.card_spacing);
        }
    });
}

fn render_retracement_popup(
    ui: &mut Ui,
    chart: &ChartInstance,
    state: &mut CardState,
    actions: &mut Vec<ChartAction>,
) {
    let Some(form) = state.form.as_mut() else {
        return;
    };
    let mut close = false;

    egui::Window::new(format!("{} · {}", UI_TEXT.retracement_heading, chart.symbol()))
        .id(Id::new(("retracement-form", chart.key())))
        .collapsible(false)
        .resizable(false)
        .show(ui.ctx(), |ui| {
            egui::Grid::new(("retracement-grid", chart.key()))
                .num_columns(3)
                .show(ui, |ui| {
                    ui.label(UI_TEXT.retracement_start);
                    date_and_price(ui, &mut form.start_date, &mut form.start_price);
                    ui.end_row();
                    ui.label(UI_TEXT.retracement_end);
                    date_and_price(ui, &mut form.end_date, &mut form.end_price);
                    ui.end_row();
                });

            if let Some(error) = &form.error {
                ui.label_error(error.as_str());
            }

            ui.horizontal(|ui| {
                if ui.button(UI_TEXT.retracement_add).clicked() {
                    match form.build(chart.candles()) {
                        Ok(params) => {
                            actions.push(ChartAction::AddRetracement(params));
                            close = true;
                        }
                        Err(e) => form.error = Some(e),
                    }
                }
                if ui.button(UI_TEXT.retracement_cancel).clicked() {
                    close = true;
                }
            });
        });

    if close {
        state.form = None;
    }
}

fn date_and_price(ui: &mut Ui, date: &mut String, price: &mut String) {
    ui.add(
        TextEdit::singleline(date)
            .hint_text(UI_TEXT.retracement_date_hint)
            .desired_width(UI_CONFIG.date_input_width),
    );
    ui.add(
        TextEdit::singleline(price)
            .hint_text(egui::RichText::new(UI_TEXT.retracement_price_hint).color(Color32::DARK_GRAY))
            .desired_width(UI_CONFIG.date_input_width),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::TimeUtils;

    fn candles() -> Vec<CandlePoint> {
        (0..4)
            .map(|i| {
                let base = 100.0 + 10.0 * i as f64;
                CandlePoint::new(i * TimeUtils::MS_IN_D, base, base + 5.0, base - 5.0, base + 1.0, None)
            })
            .collect()
    }

    fn form(start: &str, start_price: &str, end: &str, end_price: &str) -> RetracementForm {
        RetracementForm {
            start_date: start.into(),
            start_price: start_price.into(),
            end_date: end.into(),
            end_price: end_price.into(),
            error: None,
        }
    }

    #[test]
    fn close_at_uses_the_covering_candle() {
        let candles = candles();
        assert_eq!(close_at(&candles, 0), Some(101.0));
        assert_eq!(close_at(&candles, TimeUtils::MS_IN_D + 5), Some(111.0));
        assert_eq!(close_at(&candles, 10 * TimeUtils::MS_IN_D), Some(131.0));
        assert_eq!(close_at(&candles, -1), None);
        assert_eq!(close_at(&[], 0), None);
    }

    #[test]
    fn blank_prices_come_from_the_candles() {
        let params = form("1970-01-01", "", "1970/01/04 00:00", "")
            .build(&candles())
            .unwrap();
        assert_eq!(params.start_price, 101.0);
        assert_eq!(params.end_price, 131.0);
        assert_eq!(params.end_date_ms, 3 * TimeUtils::MS_IN_D);
        assert!(!params.hidden);
        assert_eq!(params.id, format!("ret-0-{}", 3 * TimeUtils::MS_IN_D));
    }

    #[test]
    fn typed_prices_win_and_accept_grouping() {
        let params = form("1970-01-01", "1,250.5", "1970-01-02", "900")
            .build(&candles())
            .unwrap();
        assert_eq!(params.start_price, 1250.5);
        assert_eq!(params.end_price, 900.0);
    }

    #[test]
    fn bad_input_is_explained() {
        let candles = candles();
        assert_eq!(
            form("yesterday", "", "1970-01-02", "").build(&candles),
            Err("Unreadable start date".to_string())
        );
        assert_eq!(
            form("1970-01-03", "", "1970-01-02", "").build(&candles),
            Err("End date must be after the start date".to_string())
        );
        assert_eq!(
            form("1970-01-01", "abc", "1970-01-02", "").build(&candles),
            Err("Unreadable start price".to_string())
        );
        assert_eq!(
            form("1970-01-01", "5", "1970-01-02", "5").build(&candles),
            Err("Start and end prices must differ".to_string())
        );
        assert!(form("1960-01-01", "", "1970-01-02", "").build(&candles).is_err());
    }
}
