use eframe::egui::{self, Id};
use egui_plot::{AxisHints, Corner, GridInput, GridMark, HPlacement, Legend, Plot, PlotBounds};

use crate::chart::{ChartEvent, WidgetOptions};
use crate::config::PLOT_CONFIG;
use crate::domain::Interval;
use crate::ui::plot_layers::{CandleLayer, LayerContext, MarkerLayer, PlotLayer, VolumeLayer};
use crate::ui::utils::format_price;
use crate::utils::format::{fmt_volume, format_for_interval};

/// Per chart plot state that has to survive between frames.
#[derive(Default)]
pub struct PlotView {
    /// Last widget view revision adopted. A newer one means the instance moved the view.
    seen_revision: u64,
    last_x: Option<(f64, f64)>,
    hovered: Option<usize>,
}

impl PlotView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws the price plot and, when shown, the linked volume plot underneath.
    /// Returns the interaction that happened this frame, in order.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        key: &str,
        options: &WidgetOptions,
        view_revision: u64,
    ) -> Vec<ChartEvent> {
        let apply_view = view_revision != self.seen_revision;
        self.seen_revision = view_revision;

        let window = options.x_window;
        let price = options.price_axis;
        let volume = options.volume_axis;
        let link_group = Id::new(("candle-deck-x", key));
        let (price_height, volume_height) = split_height(options.height, options.volume_visible);
        let timestamps: Vec<i64> = options.candles.iter().map(|c| c.timestamp_ms).collect();
        let layer_ctx = LayerContext { options };

        let mut plot = Plot::new(format!("price-{}", key))
            .height(price_height)
            .link_axis(link_group, [true, false])
            .link_cursor(link_group, [true, false])
            .allow_drag([true, false])
            .allow_zoom([true, false])
            .allow_scroll([true, false])
            .allow_boxed_zoom(false)
            .show_grid(options.style.show_grid)
            .custom_x_axes(vec![time_axis(timestamps, options.interval)])
            .custom_y_axes(vec![price_axis()])
            .x_grid_spacer(index_grid)
            // Suppress Defaults
            .label_formatter(|_, _| String::new());
        if options.style.show_legend {
            plot = plot.legend(Legend::default().position(Corner::LeftTop));
        }

        let response = plot.show(ui, |plot_ui| {
            if apply_view {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [window.min, price.min],
                    [window.max, price.max],
                ));
            }

            let layers: Vec<Box<dyn PlotLayer>> = vec![Box::new(CandleLayer), Box::new(MarkerLayer)];
            for layer in layers {
                layer.render(plot_ui, &layer_ctx);
            }

            let bounds = plot_ui.plot_bounds();
            (bounds.min()[0], bounds.max()[0], plot_ui.pointer_coordinate())
        });

        if options.volume_visible {
            Plot::new(format!("volume-{}", key))
                .height(volume_height)
                .link_axis(link_group, [true, false])
                .link_cursor(link_group, [true, false])
                .allow_drag(false)
                .allow_zoom(false)
                .allow_scroll(false)
                .allow_boxed_zoom(false)
                .show_axes([false, true])
                .show_grid(options.style.show_grid)
                .custom_y_axes(vec![volume_axis()])
                .label_formatter(|_, _| String::new())
                .show(ui, |plot_ui| {
                    if apply_view {
                        plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                            [window.min, volume.min],
                            [window.max, volume.max],
                        ));
                    }
                    VolumeLayer.render(plot_ui, &layer_ctx);
                });
        }

        let (min, max, pointer) = response.inner;
        let plot_response = &response.response;
        let mut events = Vec::new();

        if plot_response.drag_started() {
            events.push(ChartEvent::PanStarted);
        }
        if apply_view {
            self.last_x = Some((window.min, window.max));
        } else {
            let moved = self
                .last_x
                .is_some_and(|(a, b)| (a - min).abs() > 1e-9 || (b - max).abs() > 1e-9);
            if moved {
                events.push(if plot_response.dragged() {
                    ChartEvent::Panned { min, max }
                } else {
                    ChartEvent::Zoomed { min, max }
                });
            }
            self.last_x = Some((min, max));
        }
        if plot_response.drag_stopped() {
            events.push(ChartEvent::PanEnded);
        }

        let hovered = pointer
            .filter(|_| plot_response.hovered())
            .and_then(|point| hovered_index(point.x, options.candles.len()));
        match hovered {
            Some(point_index) if self.hovered != Some(point_index) => {
                events.push(ChartEvent::HoverPoint {
                    series_index: 0,
                    point_index,
                });
            }
            None if self.hovered.is_some() => events.push(ChartEvent::HoverLeft),
            _ => {}
        }
        self.hovered = hovered;

        events
    }
}

fn split_height(total: f32, volume_visible: bool) -> (f32, f32) {
    if !volume_visible {
        return (total, 0.0);
    }
    let volume = total * PLOT_CONFIG.volume_height_ratio;
    (total - volume, volume)
}

/// Candle under the pointer, if any.
pub fn hovered_index(x: f64, len: usize) -> Option<usize> {
    let index = x.round();
    if index < 0.0 || index >= len as f64 {
        return None;
    }
    Some(index as usize)
}

/// Whole-candle grid step giving roughly `divisions` marks over `span`.
pub fn index_step(span: f64, divisions: u32) -> f64 {
    (span / divisions.max(1) as f64).ceil().max(1.0)
}

fn index_grid(input: GridInput) -> Vec<GridMark> {
    let (min, max) = input.bounds;
    let step = index_step(max - min, PLOT_CONFIG.plot_axis_divisions);
    let start = (min / step).ceil() as i64;
    let end = (max / step).floor() as i64;
    (start..=end)
        .map(|i| GridMark {
            value: i as f64 * step,
            step_size: step,
        })
        .collect()
}

/// Timestamp label for an index-space x value. Blank between candles and off the data.
pub fn axis_label(timestamps: &[i64], x: f64, interval: Interval) -> String {
    if x < 0.0 || x.fract().abs() > 1e-6 {
        return String::new();
    }
    timestamps
        .get(x as usize)
        .map(|ts| format_for_interval(*ts, interval))
        .unwrap_or_default()
}

fn time_axis(timestamps: Vec<i64>, interval: Interval) -> AxisHints<'static> {
    AxisHints::new_x().formatter(move |grid_mark, _range| axis_label(&timestamps, grid_mark.value, interval))
}

fn price_axis() -> AxisHints<'static> {
    AxisHints::new_y()
        .formatter(|grid_mark, _range| format_price(grid_mark.value))
        .placement(HPlacement::Right)
}

fn volume_axis() -> AxisHints<'static> {
    AxisHints::new_y()
        .formatter(|grid_mark, _range| fmt_volume(grid_mark.value))
        .placement(HPlacement::Right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::TimeUtils;

    #[test]
    fn pointer_snaps_to_the_nearest_candle() {
        assert_eq!(hovered_index(2.4, 5), Some(2));
        assert_eq!(hovered_index(2.6, 5), Some(3));
        assert_eq!(hovered_index(-0.6, 5), None);
        assert_eq!(hovered_index(4.6, 5), None);
        assert_eq!(hovered_index(0.0, 0), None);
    }

    #[test]
    fn labels_only_on_whole_indices() {
        let timestamps = [0, TimeUtils::MS_IN_D];
        assert_eq!(axis_label(&timestamps, 1.0, Interval::D1), "1970/01/02");
        assert_eq!(axis_label(&timestamps, 0.0, Interval::H1), "1970/01/01 00:00");
        assert_eq!(axis_label(&timestamps, 0.5, Interval::D1), "");
        assert_eq!(axis_label(&timestamps, 7.0, Interval::D1), "");
    }

    #[test]
    fn grid_step_is_a_whole_candle() {
        assert_eq!(index_step(3.0, 8), 1.0);
        assert_eq!(index_step(120.0, 8), 15.0);
        assert_eq!(index_step(121.0, 8), 16.0);
    }

    #[test]
    fn volume_takes_its_share_only_when_shown() {
        let (price, volume) = split_height(400.0, true);
        assert_eq!(volume, 100.0);
        assert_eq!(price, 300.0);
        assert_eq!(split_height(400.0, false), (400.0, 0.0));
    }
}
