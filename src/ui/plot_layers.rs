use eframe::egui::{Color32, Stroke};
use egui_plot::{Bar, BarChart, BoxElem, BoxPlot, BoxSpread, HLine, LineStyle, PlotUi};

use crate::chart::WidgetOptions;
use crate::config::PLOT_CONFIG;
use crate::domain::retracement::MarkerTone;
use crate::domain::{CandlePoint, PriceMarker, VolumeBar};

/// Context passed to every layer during rendering.
pub struct LayerContext<'a> {
    pub options: &'a WidgetOptions,
}

/// A standardized layer in the plot stack.
pub trait PlotLayer {
    fn render(&self, ui: &mut PlotUi, ctx: &LayerContext);
}

// ============================================================================
// 1. CANDLE LAYER
// ============================================================================
pub struct CandleLayer;

impl PlotLayer for CandleLayer {
    fn render(&self, plot_ui: &mut PlotUi, ctx: &LayerContext) {
        let style = &ctx.options.style;
        let (bullish, bearish): (Vec<_>, Vec<_>) = ctx
            .options
            .candles
            .iter()
            .enumerate()
            .partition(|(_, candle)| candle.is_bullish());

        // Two plots so each colour gets its own legend entry.
        plot_ui.box_plot(BoxPlot::new("Bullish", candle_elems(&bullish, style.bullish)));
        plot_ui.box_plot(BoxPlot::new("Bearish", candle_elems(&bearish, style.bearish)));
    }
}

fn candle_elems(candles: &[(usize, &CandlePoint)], color: Color32) -> Vec<BoxElem> {
    candles
        .iter()
        .map(|(index, candle)| {
            let (body_low, body_high) = candle.body_range();
            let mid = (body_low + body_high) / 2.0;
            BoxElem::new(
                *index as f64,
                BoxSpread::new(candle.low, body_low, mid, body_high, candle.high),
            )
            .box_width(PLOT_CONFIG.candle_body_width)
            .whisker_width(0.0)
            .fill(color)
            .stroke(Stroke::new(1.0, color))
        })
        .collect()
}

// ============================================================================
// 2. RETRACEMENT MARKER LAYER
// ============================================================================
pub struct MarkerLayer;

impl PlotLayer for MarkerLayer {
    fn render(&self, plot_ui: &mut PlotUi, ctx: &LayerContext) {
        for marker in &ctx.options.markers {
            let mut line = HLine::new(marker.label.as_str(), marker.price)
                .color(marker_color(marker))
                .width(marker_width(marker));
            if matches!(marker.tone, MarkerTone::Uptrend | MarkerTone::Downtrend) {
                line = line.style(LineStyle::dashed_loose());
            }
            plot_ui.hline(line);
        }
    }
}

pub fn marker_color(marker: &PriceMarker) -> Color32 {
    match marker.tone {
        MarkerTone::Start => PLOT_CONFIG.retracement_start_color,
        MarkerTone::End => PLOT_CONFIG.retracement_end_color,
        MarkerTone::Uptrend => PLOT_CONFIG.retracement_uptrend_color,
        MarkerTone::Downtrend => PLOT_CONFIG.retracement_downtrend_color,
    }
}

fn marker_width(marker: &PriceMarker) -> f32 {
    match marker.tone {
        MarkerTone::Start | MarkerTone::End => PLOT_CONFIG.retracement_anchor_line_width,
        MarkerTone::Uptrend | MarkerTone::Downtrend => PLOT_CONFIG.retracement_line_width,
    }
}

// ============================================================================
// 3. VOLUME LAYER (drawn in the linked plot underneath)
// ============================================================================
pub struct VolumeLayer;

impl PlotLayer for VolumeLayer {
    fn render(&self, plot_ui: &mut PlotUi, ctx: &LayerContext) {
        if !ctx.options.volume_visible {
            return;
        }
        let style = &ctx.options.style;
        let bars = volume_columns(&ctx.options.volume, style.bullish, style.bearish);
        plot_ui.bar_chart(BarChart::new("Volume", bars));
    }
}

fn volume_columns(volume: &[VolumeBar], bullish: Color32, bearish: Color32) -> Vec<Bar> {
    volume
        .iter()
        .enumerate()
        .map(|(index, bar)| {
            let color = if bar.bullish { bullish } else { bearish };
            Bar::new(index as f64, bar.volume)
                .width(PLOT_CONFIG.candle_body_width)
                .fill(color.gamma_multiply(PLOT_CONFIG.volume_opacity_pct))
                .stroke(Stroke::NONE)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_are_wider_than_levels() {
        let start = PriceMarker {
            price: 1.0,
            label: "Start".into(),
            tone: MarkerTone::Start,
        };
        let level = PriceMarker {
            price: 2.0,
            label: "50%".into(),
            tone: MarkerTone::Downtrend,
        };
        assert!(marker_width(&start) > marker_width(&level));
        assert_eq!(marker_color(&level), PLOT_CONFIG.retracement_downtrend_color);
    }

    #[test]
    fn candles_keep_their_index_position() {
        let candles = [
            CandlePoint::new(0, 10.0, 12.0, 9.0, 11.0, None),
            CandlePoint::new(60_000, 11.0, 11.5, 8.0, 9.0, None),
        ];
        let indexed: Vec<(usize, &CandlePoint)> = candles.iter().enumerate().collect();
        let elems = candle_elems(&indexed, Color32::WHITE);
        assert_eq!(elems[1].argument, 1.0);
        assert_eq!(elems[1].spread.lower_whisker, 8.0);
        assert_eq!(elems[1].spread.quartile1, 9.0);
        assert_eq!(elems[1].spread.quartile3, 11.0);
        assert_eq!(elems[1].spread.upper_whisker, 11.5);
    }
}
