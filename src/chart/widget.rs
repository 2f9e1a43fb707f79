//! The options handle a chart instance pushes to its plot.
//!
//! The instance never draws. It keeps a `WidgetOptions` snapshot up to date through
//! `OptionsUpdate`s and the plot view renders whatever the snapshot says.

use eframe::egui::Color32;

use crate::chart::axis::{AxisBounds, XWindow};
use crate::config::PLOT_CONFIG;
use crate::domain::{CandlePoint, Interval, PriceMarker, VolumeBar};

#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    pub bullish: Color32,
    pub bearish: Color32,
    pub show_grid: bool,
    pub show_legend: bool,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            bullish: PLOT_CONFIG.bullish_color,
            bearish: PLOT_CONFIG.bearish_color,
            show_grid: true,
            show_legend: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetOptions {
    pub height: f32,
    pub interval: Interval,
    pub x_window: XWindow,
    pub price_axis: AxisBounds,
    pub volume_axis: AxisBounds,
    pub candles: Vec<CandlePoint>,
    pub volume: Vec<VolumeBar>,
    pub volume_visible: bool,
    pub markers: Vec<PriceMarker>,
    pub style: ChartStyle,
}

impl WidgetOptions {
    pub fn new(height: f32, interval: Interval, style: ChartStyle) -> Self {
        Self {
            height,
            interval,
            x_window: XWindow::new(0.0, 1.0),
            price_axis: AxisBounds::default(),
            volume_axis: AxisBounds::default(),
            candles: Vec::new(),
            volume: Vec::new(),
            volume_visible: true,
            markers: Vec::new(),
            style,
        }
    }
}

/// Partial options. Present fields replace the current value, absent fields keep it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsUpdate {
    pub height: Option<f32>,
    pub interval: Option<Interval>,
    pub x_window: Option<XWindow>,
    pub price_axis: Option<AxisBounds>,
    pub volume_axis: Option<AxisBounds>,
    pub candles: Option<Vec<CandlePoint>>,
    pub volume: Option<Vec<VolumeBar>>,
    pub volume_visible: Option<bool>,
    pub markers: Option<Vec<PriceMarker>>,
    pub style: Option<ChartStyle>,
}

impl OptionsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == OptionsUpdate::default()
    }

    /// Does this update move the view (so the plot must adopt new bounds)?
    fn moves_view(&self) -> bool {
        self.x_window.is_some() || self.price_axis.is_some() || self.volume_axis.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOverrides {
    pub bullish: Option<Color32>,
    pub bearish: Option<Color32>,
    pub show_grid: Option<bool>,
    pub show_legend: Option<bool>,
}

/// Caller supplied tweaks applied over the defaults. An override always wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartOverrides {
    pub height: Option<f32>,
    pub style: StyleOverrides,
}

impl ChartOverrides {
    pub fn apply_style(&self, base: ChartStyle) -> ChartStyle {
        ChartStyle {
            bullish: self.style.bullish.unwrap_or(base.bullish),
            bearish: self.style.bearish.unwrap_or(base.bearish),
            show_grid: self.style.show_grid.unwrap_or(base.show_grid),
            show_legend: self.style.show_legend.unwrap_or(base.show_legend),
        }
    }

    pub fn apply_height(&self, computed: f32) -> f32 {
        self.height.unwrap_or(computed)
    }
}

#[derive(Debug)]
pub struct ChartWidget {
    options: WidgetOptions,
    update_count: u64,
    view_revision: u64,
}

impl ChartWidget {
    pub fn new(options: WidgetOptions) -> Self {
        Self {
            options,
            update_count: 0,
            view_revision: 1,
        }
    }

    pub fn options(&self) -> &WidgetOptions {
        &self.options
    }

    /// Number of `update_options` calls applied so far.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Bumped whenever the instance moves the view programmatically.
    pub fn view_revision(&self) -> u64 {
        self.view_revision
    }

    pub fn update_options(&mut self, update: OptionsUpdate) {
        if update.is_empty() {
            return;
        }
        if update.moves_view() {
            self.view_revision += 1;
        }

        let OptionsUpdate {
            height,
            interval,
            x_window,
            price_axis,
            volume_axis,
            candles,
            volume,
            volume_visible,
            markers,
            style,
        } = update;
        let o = &mut self.options;
        if let Some(v) = height {
            o.height = v;
        }
        if let Some(v) = interval {
            o.interval = v;
        }
        if let Some(v) = x_window {
            o.x_window = v;
        }
        if let Some(v) = price_axis {
            o.price_axis = v;
        }
        if let Some(v) = volume_axis {
            o.volume_axis = v;
        }
        if let Some(v) = candles {
            o.candles = v;
        }
        if let Some(v) = volume {
            o.volume = v;
        }
        if let Some(v) = volume_visible {
            o.volume_visible = v;
        }
        if let Some(v) = markers {
            o.markers = v;
        }
        if let Some(v) = style {
            o.style = v;
        }
        self.update_count += 1;
    }

    /// Records where the user panned to. Not an options update: the plot already shows it.
    pub fn sync_user_window(&mut self, window: XWindow) {
        self.options.x_window = window;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> ChartWidget {
        ChartWidget::new(WidgetOptions::new(300.0, Interval::H1, ChartStyle::default()))
    }

    #[test]
    fn merge_replaces_only_present_fields() {
        let mut w = widget();
        w.update_options(OptionsUpdate {
            height: Some(420.0),
            markers: Some(vec![]),
            ..Default::default()
        });
        assert_eq!(w.options().height, 420.0);
        assert_eq!(w.options().interval, Interval::H1);
        assert_eq!(w.update_count(), 1);
        assert_eq!(w.view_revision(), 1);
    }

    #[test]
    fn programmatic_window_changes_bump_revision() {
        let mut w = widget();
        w.update_options(OptionsUpdate {
            x_window: Some(XWindow::new(5.0, 10.0)),
            ..Default::default()
        });
        assert_eq!(w.view_revision(), 2);

        w.sync_user_window(XWindow::new(6.0, 11.0));
        assert_eq!(w.view_revision(), 2);
        assert_eq!(w.update_count(), 1);
        assert_eq!(w.options().x_window, XWindow::new(6.0, 11.0));
    }

    #[test]
    fn empty_update_is_ignored() {
        let mut w = widget();
        w.update_options(OptionsUpdate::default());
        assert_eq!(w.update_count(), 0);
    }

    #[test]
    fn overrides_win_over_defaults() {
        let overrides = ChartOverrides {
            height: Some(250.0),
            style: StyleOverrides {
                bullish: Some(Color32::WHITE),
                ..Default::default()
            },
        };
        let style = overrides.apply_style(ChartStyle::default());
        assert_eq!(style.bullish, Color32::WHITE);
        assert_eq!(style.bearish, PLOT_CONFIG.bearish_color);
        assert_eq!(overrides.apply_height(600.0), 250.0);
        assert_eq!(ChartOverrides::default().apply_height(600.0), 600.0);
    }
}
