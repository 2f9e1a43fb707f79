//! Plot visualization configuration

use eframe::egui::Color32;

pub struct PlotConfig {
    pub bullish_color: Color32,
    pub bearish_color: Color32,
    /// Volume columns reuse the candle colours at this opacity
    pub volume_opacity_pct: f32,
    pub retracement_start_color: Color32,
    pub retracement_end_color: Color32,
    pub retracement_uptrend_color: Color32,
    pub retracement_downtrend_color: Color32,
    /// Width of retracement level lines
    pub retracement_line_width: f32,
    /// Width of the start / end lines
    pub retracement_anchor_line_width: f32,
    /// Fraction of one x unit a candle body occupies
    pub candle_body_width: f64,
    /// Share of the card height given to the volume plot when it is shown
    pub volume_height_ratio: f32,
    /// Plot x axis divisions (split axis into n equal parts)
    pub plot_axis_divisions: u32,
}

pub const PLOT_CONFIG: PlotConfig = PlotConfig {
    bullish_color: Color32::from_rgb(38, 166, 154), // Teal green
    bearish_color: Color32::from_rgb(239, 83, 80),  // Soft red
    volume_opacity_pct: 0.6,
    retracement_start_color: Color32::from_rgb(0, 191, 255), // Deep sky blue
    retracement_end_color: Color32::from_rgb(255, 215, 0),   // Gold
    retracement_uptrend_color: Color32::from_rgb(0, 200, 0), // Green
    retracement_downtrend_color: Color32::from_rgb(200, 0, 0), // Red
    retracement_line_width: 1.0,
    retracement_anchor_line_width: 2.0,
    candle_body_width: 0.7,
    volume_height_ratio: 0.25,
    plot_axis_divisions: 8,
};
