//! Axis maths in index space: point `i` of a series sits at `x = i`.

use crate::chart::series::{SeriesDef, SeriesKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for AxisBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisLimits {
    pub price: AxisBounds,
    pub volume: AxisBounds,
}

/// Visible x range, in (fractional) point indices.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XWindow {
    pub min: f64,
    pub max: f64,
}

impl XWindow {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn shifted(&self, by: f64) -> Self {
        Self {
            min: self.min + by,
            max: self.max + by,
        }
    }

    pub fn contains_index(&self, index: usize) -> bool {
        let x = index as f64;
        x >= self.min && x <= self.max
    }
}

/// Price bounds over every candlestick point inside `window`, volume bounds over the
/// same points. Ranges are padded by `margin_pct` of their height; volume always starts at 0.
pub fn compute_axis_bounds(series: &[SeriesDef], window: XWindow, margin_pct: f64) -> AxisLimits {
    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;
    let mut max_volume = f64::NEG_INFINITY;

    for def in series.iter().filter(|s| s.kind == SeriesKind::Candlestick) {
        for (index, point) in def.points().iter().enumerate() {
            if !window.contains_index(index) {
                continue;
            }
            low = low.min(point.low);
            high = high.max(point.high);
            if let Some(volume) = point.volume {
                max_volume = max_volume.max(volume);
            }
        }
    }

    let price = if low.is_finite() && high.is_finite() {
        let pad = ((high - low) * margin_pct).abs();
        AxisBounds {
            min: low - pad,
            max: high + pad,
        }
    } else {
        AxisBounds::default()
    };

    let volume = if max_volume.is_finite() && max_volume > 0.0 {
        AxisBounds {
            min: 0.0,
            max: max_volume + max_volume * margin_pct,
        }
    } else {
        AxisBounds::default()
    };

    AxisLimits { price, volume }
}

/// `true` when the window's left edge is close enough to the earliest buffered point
/// that older history should be fetched.
///
/// Threshold is `max(edge_min * unit, floor(span * edge_ratio))` past the earliest point.
pub fn is_near_left_edge(
    min: f64,
    max: f64,
    earliest: f64,
    unit: f64,
    edge_ratio: f64,
    edge_min: f64,
) -> bool {
    let span = (max - min).max(unit);
    let threshold = (edge_min * unit).max((span * edge_ratio).floor());
    min <= earliest + threshold
}

/// The last `window_size` indices, or everything when there are fewer points.
pub fn default_window(len: usize, window_size: usize) -> XWindow {
    if len == 0 {
        return XWindow::new(0.0, 1.0);
    }
    let max = (len - 1) as f64;
    let min = len.saturating_sub(window_size.max(1)) as f64;
    XWindow::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandlePoint;

    fn candles() -> Vec<CandlePoint> {
        vec![
            CandlePoint::new(0, 10.0, 12.0, 9.0, 11.0, Some(100.0)),
            CandlePoint::new(1, 11.0, 20.0, 10.0, 19.0, Some(300.0)),
            CandlePoint::new(2, 19.0, 19.5, 15.0, 16.0, None),
        ]
    }

    #[test]
    fn empty_range_defaults_to_unit_bounds() {
        let series = vec![SeriesDef::static_candles("s", "S", candles())];
        let limits = compute_axis_bounds(&series, XWindow::new(10.0, 20.0), 0.025);
        assert_eq!(limits.price, AxisBounds { min: 0.0, max: 1.0 });
        assert_eq!(limits.volume, AxisBounds { min: 0.0, max: 1.0 });

        let limits = compute_axis_bounds(&[], XWindow::new(0.0, 5.0), 0.025);
        assert_eq!(limits, AxisLimits::default());
    }

    #[test]
    fn bounds_cover_points_in_window_with_margin() {
        let series = vec![SeriesDef::static_candles("s", "S", candles())];
        let limits = compute_axis_bounds(&series, XWindow::new(0.0, 1.0), 0.1);
        // low 9, high 20, pad 1.1
        assert!((limits.price.min - 7.9).abs() < 1e-9);
        assert!((limits.price.max - 21.1).abs() < 1e-9);
        assert_eq!(limits.volume.min, 0.0);
        assert!((limits.volume.max - 330.0).abs() < 1e-9);
    }

    #[test]
    fn volume_series_does_not_feed_price_bounds() {
        let series = vec![
            SeriesDef::static_candles("s", "S", candles()),
            SeriesDef::volume("v", "Volume"),
        ];
        let limits = compute_axis_bounds(&series, XWindow::new(2.0, 2.0), 0.0);
        assert_eq!(limits.price, AxisBounds { min: 15.0, max: 19.5 });
        assert_eq!(limits.volume, AxisBounds::default());
    }

    #[test]
    fn left_edge_threshold() {
        // span 100 -> floor(12) beats 5
        assert!(is_near_left_edge(12.0, 112.0, 0.0, 1.0, 0.12, 5.0));
        assert!(!is_near_left_edge(12.5, 112.5, 0.0, 1.0, 0.12, 5.0));
        // window [100, 200]
        assert!(!is_near_left_edge(100.0, 200.0, 0.0, 1.0, 0.12, 5.0));
        assert!(is_near_left_edge(100.0, 200.0, 88.0, 1.0, 0.12, 5.0));
        // narrow window falls back to the floor of 5 units
        assert!(is_near_left_edge(5.0, 20.0, 0.0, 1.0, 0.12, 5.0));
        assert!(!is_near_left_edge(6.0, 21.0, 0.0, 1.0, 0.12, 5.0));
    }

    #[test]
    fn default_window_takes_the_tail() {
        assert_eq!(default_window(500, 120), XWindow::new(380.0, 499.0));
        assert_eq!(default_window(50, 120), XWindow::new(0.0, 49.0));
        assert_eq!(default_window(0, 120), XWindow::new(0.0, 1.0));
    }
}
