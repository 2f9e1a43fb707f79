//! Chart behaviour tuning: windowing, prefetch pacing and card layout.

use std::time::Duration;

/// Incremental history loading while the user pans towards older data
pub struct PrefetchConfig {
    /// Upper bound on sequential page fetches per triggering interaction
    pub max_steps: u32,
    /// Pause between two steps of the same run
    pub step_cooldown: Duration,
    /// Fraction of the visible span that counts as "near the left edge"
    pub edge_ratio: f64,
    /// Edge threshold floor, in x units
    pub edge_min_units: f64,
}

/// Price / volume axis behaviour
pub struct AxisConfig {
    /// Padding added above and below the visible data, as a fraction of its range
    pub margin_pct: f64,
    /// Quiet time after the last pan/zoom event before the axes are recomputed
    pub recompute_debounce: Duration,
}

/// Card heights for the registry resize rule
pub struct LayoutConfig {
    pub single_chart_chrome_px: f32,
    pub two_chart_chrome_px: f32,
    pub multi_chart_height_px: f32,
    /// Used until the first frame reports a real viewport
    pub default_viewport_height_px: f32,
    pub min_chart_height_px: f32,
}

/// The Master Configuration Struct
pub struct ChartConfig {
    pub prefetch: PrefetchConfig,
    pub axis: AxisConfig,
    pub layout: LayoutConfig,
    /// How many candles the default window shows after a reload
    pub default_window_size: usize,
    pub default_symbol: &'static str,
    /// Candle count the "Auto" timeframe aims for over the loaded span
    pub auto_interval_target_points: usize,
}

pub const CHART: ChartConfig = ChartConfig {
    prefetch: PrefetchConfig {
        max_steps: 4,
        step_cooldown: Duration::from_millis(250),
        edge_ratio: 0.12,
        edge_min_units: 5.0,
    },
    axis: AxisConfig {
        margin_pct: 0.025,
        recompute_debounce: Duration::from_millis(150),
    },
    layout: LayoutConfig {
        single_chart_chrome_px: 269.0,
        two_chart_chrome_px: 100.0,
        multi_chart_height_px: 300.0,
        default_viewport_height_px: 900.0,
        min_chart_height_px: 160.0,
    },
    default_window_size: 120,
    default_symbol: "BTCUSDT",
    auto_interval_target_points: 250,
};
