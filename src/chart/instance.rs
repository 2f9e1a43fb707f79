//! One on-screen chart: its series buffers, visible window and interaction state.
//!
//! The instance is driven from the UI thread. `handle_event` feeds it plot interaction,
//! `poll` collects finished fetches and runs timers. Nothing here blocks: fetches are
//! spawned through the `TaskRunner` and land on a later `poll`.

use std::collections::HashMap;
use std::sync::Arc;

use poll_promise::Promise;

use crate::chart::axis::{XWindow, compute_axis_bounds, default_window, is_near_left_edge};
use crate::chart::series::{SeriesDef, SeriesKind};
use crate::chart::tasks::{SourceBatch, TaskRunner, fetch_one_page_each, fetch_one_page_sequential};
use crate::chart::widget::{ChartOverrides, ChartStyle, ChartWidget, OptionsUpdate, WidgetOptions};
use crate::config::{BINANCE, CHART};
#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;
use crate::data::{HistorySource, KlineFetcher};
use crate::domain::candle::{prepend_older, volume_bars};
use crate::domain::retracement::combined_markers;
use crate::domain::{CandlePoint, Interval, RetracementOverlay, RetracementParams, VolumeBar};
use crate::utils::app_time::{AppInstant, elapsed_at_least};
use crate::utils::format::{fmt_num, format_for_interval};

/// What a chart card needs to build its instance.
#[derive(Debug)]
pub struct InstanceConfig {
    pub key: String,
    pub container_id: String,
    pub symbol: String,
    pub interval: Interval,
    pub window_size: usize,
    pub page_size: usize,
    pub overrides: ChartOverrides,
    /// Externally supplied series drawn next to the fetched one. They are never refetched.
    pub extra_series: Vec<SeriesDef>,
}

impl InstanceConfig {
    pub fn for_symbol(symbol: &str, interval: Interval) -> Self {
        let symbol = symbol.trim().to_uppercase();
        Self {
            key: symbol.clone(),
            container_id: format!("chart-{}", symbol.to_lowercase()),
            symbol,
            interval,
            window_size: CHART.default_window_size,
            page_size: BINANCE.limits.default_page_size,
            overrides: ChartOverrides::default(),
            extra_series: Vec::new(),
        }
    }
}

/// Shared collaborators handed to every instance.
#[derive(Clone)]
pub struct ChartEnv {
    pub fetcher: Arc<dyn KlineFetcher>,
    pub runner: TaskRunner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Uninitialized,
    Loading,
    Ready,
    Reloading,
    Destroyed,
}

/// Plot interaction, reported by the view layer. Window bounds are in index space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChartEvent {
    PanStarted,
    Panned { min: f64, max: f64 },
    PanEnded,
    Zoomed { min: f64, max: f64 },
    HoverPoint { series_index: usize, point_index: usize },
    HoverLeft,
}

/// Outcome of asking for older history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchStart {
    Started,
    /// A fetch or prefetch run is already active. Counts as zero points added.
    Dropped,
    NotNearEdge,
    /// The last step came back empty; nothing older exists until the next reload.
    Exhausted,
    NoSource,
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Empty,
    Budget,
    Stale,
    DirectionChanged,
    EdgeCleared,
    Failed,
}

/// The OHLC pill: hovered candle, or the latest one when nothing is hovered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OhlcLabel {
    pub date: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub bullish: bool,
}

impl OhlcLabel {
    pub fn from_candle(candle: &CandlePoint, interval: Interval) -> Self {
        Self {
            date: format_for_interval(candle.timestamp_ms, interval),
            open: fmt_num(Some(candle.open)),
            high: fmt_num(Some(candle.high)),
            low: fmt_num(Some(candle.low)),
            close: fmt_num(Some(candle.close)),
            bullish: candle.is_bullish(),
        }
    }
}

/// Interval and per-series symbols behind the buffers the widget is showing.
#[derive(Debug, Clone, PartialEq)]
struct LoadedParams {
    interval: Interval,
    symbols: Vec<(usize, String)>,
}

#[derive(Debug)]
struct PrefetchRun {
    token: u64,
    steps_taken: u32,
    direction_changed: bool,
    next_step_at: Option<AppInstant>,
}

#[derive(Default)]
struct PrefetchLoop {
    /// Bumped on every new pan gesture and every reload. Runs holding an older value are stale.
    token: u64,
    run: Option<PrefetchRun>,
    task: Option<Promise<Vec<SourceBatch>>>,
}

pub struct ChartInstance {
    key: String,
    container_id: String,
    state: InstanceState,
    env: ChartEnv,

    symbol: String,
    interval: Interval,
    window_size: usize,
    series: Vec<SeriesDef>,
    primary: usize,
    volume_series: Option<usize>,
    pending_symbols: HashMap<usize, String>,

    widget: Option<ChartWidget>,
    loaded: Option<LoadedParams>,
    overrides: ChartOverrides,
    height: f32,
    volume_visible: bool,
    retracements: Vec<RetracementOverlay>,

    reload_task: Option<Promise<Vec<SourceBatch>>>,
    pending_reload: bool,
    prefetch: PrefetchLoop,
    history_exhausted: bool,

    dragging: bool,
    last_pan_min: Option<f64>,
    axis_dirty_since: Option<AppInstant>,

    hover_active: bool,
    ohlc: Option<OhlcLabel>,
    loading: bool,
    loaded_label: String,
    last_error: Option<String>,
}

impl ChartInstance {
    pub fn new(config: InstanceConfig, env: ChartEnv, height: f32) -> Self {
        let InstanceConfig {
            key,
            container_id,
            symbol,
            interval,
            window_size,
            page_size,
            overrides,
            extra_series,
        } = config;

        let source = HistorySource::new(&symbol, interval, env.fetcher.clone()).with_page_size(page_size);
        let name = source.symbol().to_string();
        let mut series = vec![
            SeriesDef::sourced("price", &name, source),
            SeriesDef::volume("volume", "Volume"),
        ];
        series.extend(extra_series);

        Self {
            key,
            container_id,
            state: InstanceState::Uninitialized,
            env,
            symbol: symbol.trim().to_uppercase(),
            interval,
            window_size: window_size.max(1),
            series,
            primary: 0,
            volume_series: Some(1),
            pending_symbols: HashMap::new(),
            widget: None,
            loaded: None,
            height: overrides.apply_height(height),
            overrides,
            volume_visible: true,
            retracements: Vec::new(),
            reload_task: None,
            pending_reload: false,
            prefetch: PrefetchLoop::default(),
            history_exhausted: false,
            dragging: false,
            last_pan_min: None,
            axis_dirty_since: None,
            hover_active: false,
            ohlc: None,
            loading: false,
            loaded_label: String::new(),
            last_error: None,
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == InstanceState::Ready
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn widget(&self) -> Option<&ChartWidget> {
        self.widget.as_ref()
    }

    pub fn series(&self) -> &[SeriesDef] {
        &self.series
    }

    pub fn candles(&self) -> &[CandlePoint] {
        self.series[self.primary].points()
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn volume_visible(&self) -> bool {
        self.volume_visible
    }

    pub fn retracements(&self) -> &[RetracementOverlay] {
        &self.retracements
    }

    pub fn ohlc_label(&self) -> Option<&OhlcLabel> {
        self.ohlc.as_ref()
    }

    pub fn hover_active(&self) -> bool {
        self.hover_active
    }

    /// Spinner flag. Set for every fetch, cleared on every completion path.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn loaded_label(&self) -> &str {
        &self.loaded_label
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// At most one fetch (reload or prefetch step) is ever outstanding.
    pub fn fetch_in_flight(&self) -> bool {
        self.reload_task.is_some() || self.prefetch.task.is_some()
    }

    pub fn prefetch_active(&self) -> bool {
        self.prefetch.run.is_some()
    }

    fn x_window(&self) -> Option<XWindow> {
        self.widget.as_ref().map(|w| w.options().x_window)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// First load. Only meaningful from `Uninitialized`.
    pub fn init(&mut self) {
        if self.state != InstanceState::Uninitialized {
            return;
        }
        self.start_reload();
    }

    /// Refetches everything from "now". Deferred while another fetch is in flight.
    pub fn reload(&mut self) {
        self.start_reload();
    }

    pub fn change_timeframe(&mut self, interval: Interval) {
        if self.state == InstanceState::Destroyed {
            return;
        }
        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_ui_interactions {
            log::info!("[{}] timeframe {} -> {}", self.key, self.interval, interval);
        }
        self.interval = interval;
        for def in self.series.iter_mut() {
            if let Some(source) = def.source_mut() {
                source.set_interval(interval);
            }
        }
        self.start_reload();
    }

    /// Points one sourced series at another symbol and reloads.
    pub fn change_symbol_for(&mut self, series_index: usize, symbol: &str) -> bool {
        if self.state == InstanceState::Destroyed {
            return false;
        }
        let Some(def) = self.series.get_mut(series_index) else {
            log::warn!("[{}] no series {} to change symbol on", self.key, series_index);
            return false;
        };
        if !def.is_sourced() {
            log::warn!("[{}] series {} has no history source", self.key, series_index);
            return false;
        }

        let symbol = symbol.trim().to_uppercase();
        def.name = symbol.clone();
        match def.source_mut() {
            Some(source) => source.set_symbol(&symbol),
            // Lent to an in-flight fetch; applied when the next reload takes it.
            None => {
                self.pending_symbols.insert(series_index, symbol.clone());
            }
        }
        if series_index == self.primary {
            self.symbol = symbol;
        }
        self.start_reload();
        true
    }

    /// Renames the chart after its primary symbol changed. Only the registry calls this.
    pub(crate) fn rekey(&mut self, key: &str) {
        log::info!("[{}] now keyed as '{}'", self.key, key);
        self.key = key.to_string();
        self.container_id = format!("chart-{}", key.to_lowercase());
    }

    pub fn destroy(&mut self) {
        self.state = InstanceState::Destroyed;
        self.widget = None;
        self.reload_task = None;
        self.prefetch.task = None;
        self.prefetch.run = None;
        self.prefetch.token += 1;
        self.pending_reload = false;
        self.loading = false;
        log::info!("[{}] destroyed", self.key);
    }

    pub fn set_height(&mut self, height: f32) {
        let height = self.overrides.apply_height(height);
        if (self.height - height).abs() < f32::EPSILON {
            return;
        }
        self.height = height;
        if let Some(widget) = self.widget.as_mut() {
            widget.update_options(OptionsUpdate {
                height: Some(height),
                ..Default::default()
            });
        }
    }

    // ---------------------------------------------------------------------
    // Reload
    // ---------------------------------------------------------------------

    fn start_reload(&mut self) {
        if self.state == InstanceState::Destroyed {
            return;
        }
        if self.fetch_in_flight() {
            self.pending_reload = true;
            return;
        }

        self.state = if self.widget.is_some() {
            InstanceState::Reloading
        } else {
            InstanceState::Loading
        };
        self.pending_reload = false;
        self.prefetch.token += 1;
        self.prefetch.run = None;
        self.history_exhausted = false;
        self.axis_dirty_since = None;
        self.last_pan_min = None;

        // Buffers stay as they are until every page is back.
        let interval = self.interval;
        let mut jobs = Vec::new();
        for (index, def) in self.series.iter_mut().enumerate() {
            if let Some(mut source) = def.take_source() {
                if let Some(symbol) = self.pending_symbols.remove(&index) {
                    source.set_symbol(&symbol);
                }
                if source.interval() != interval {
                    source.set_interval(interval);
                }
                source.reset_cursor();
                jobs.push((index, source));
            }
        }

        log::info!("[{}] loading {} {}", self.key, self.symbol, self.interval);
        self.loading = true;
        self.reload_task = Some(self.env.runner.spawn("chart_reload", fetch_one_page_each(jobs)));
    }

    fn apply_reload(&mut self, batches: Vec<SourceBatch>) {
        self.loading = false;
        let mut pages = Vec::with_capacity(batches.len());
        let mut failures = 0;
        for batch in batches {
            let SourceBatch {
                series_index,
                source,
                result,
            } = batch;
            let def = &mut self.series[series_index];
            def.restore_source(source);
            match result {
                Ok(points) => pages.push((series_index, points)),
                Err(e) => {
                    failures += 1;
                    log::error!("[{}] reload failed for {}: {}", self.key, def.name, e);
                    self.last_error = Some(e.to_string());
                }
            }
        }

        if self.pending_reload {
            self.start_reload();
            return;
        }

        if failures > 0 {
            self.keep_last_good();
            return;
        }
        self.last_error = None;

        for (series_index, points) in pages {
            let def = &mut self.series[series_index];
            def.clear();
            prepend_older(def.points_mut(), points);
        }
        self.loaded = Some(self.current_params());

        let len = self.candles().len();
        let window = default_window(len, self.window_size);
        let limits = compute_axis_bounds(&self.series, window, CHART.axis.margin_pct);
        let volume = self.sync_volume_series();

        let update = OptionsUpdate {
            interval: Some(self.interval),
            x_window: Some(window),
            price_axis: Some(limits.price),
            volume_axis: Some(limits.volume),
            candles: Some(self.candles().to_vec()),
            volume: Some(volume),
            volume_visible: Some(self.volume_visible),
            markers: Some(combined_markers(&self.retracements)),
            ..Default::default()
        };

        let style = self.overrides.apply_style(ChartStyle::default());
        let (height, interval) = (self.height, self.interval);
        self.widget
            .get_or_insert_with(|| ChartWidget::new(WidgetOptions::new(height, interval, style)))
            .update_options(update);

        self.state = InstanceState::Ready;
        self.refresh_latest_ohlc();
        self.update_loaded_label(window);
        log::info!("[{}] ready with {} candles", self.key, len);
    }

    fn current_params(&self) -> LoadedParams {
        LoadedParams {
            interval: self.interval,
            symbols: self
                .series
                .iter()
                .enumerate()
                .filter_map(|(index, def)| def.source().map(|s| (index, s.symbol().to_string())))
                .collect(),
        }
    }

    /// After a failed reload: back to the parameters and cursors of the buffers on screen.
    /// With nothing loaded yet the chart returns to `Uninitialized` so it can be retried.
    fn keep_last_good(&mut self) {
        let Some(loaded) = self.loaded.clone() else {
            self.state = InstanceState::Uninitialized;
            return;
        };
        if loaded != self.current_params() {
            log::warn!(
                "[{}] keeping {} {} after the failed load",
                self.key,
                self.primary_symbol(&loaded),
                loaded.interval
            );
        }

        self.interval = loaded.interval;
        for (index, symbol) in &loaded.symbols {
            let def = &mut self.series[*index];
            let oldest = def.points().first().map(|p| p.timestamp_ms);
            def.name = symbol.clone();
            if let Some(source) = def.source_mut() {
                source.set_symbol(symbol);
                source.set_interval(loaded.interval);
                source.restore_cursor(oldest);
            }
        }
        self.symbol = self.primary_symbol(&loaded).to_string();
        self.state = InstanceState::Ready;
    }

    fn primary_symbol<'a>(&'a self, loaded: &'a LoadedParams) -> &'a str {
        loaded
            .symbols
            .iter()
            .find(|(index, _)| *index == self.primary)
            .map(|(_, symbol)| symbol.as_str())
            .unwrap_or(self.symbol.as_str())
    }

    // ---------------------------------------------------------------------
    // Prefetch
    // ---------------------------------------------------------------------

    /// Starts a prefetch run when the visible window is close to the oldest buffered point.
    pub fn request_prefetch(&mut self) -> PrefetchStart {
        if self.state != InstanceState::Ready {
            return PrefetchStart::NotReady;
        }
        if self.fetch_in_flight() || self.prefetch.run.is_some() {
            #[cfg(debug_assertions)]
            if DEBUG_FLAGS.print_prefetch_steps {
                log::info!("[{}] prefetch dropped: already running", self.key);
            }
            return PrefetchStart::Dropped;
        }
        if !self.series[self.primary].is_sourced() {
            return PrefetchStart::NoSource;
        }
        if self.history_exhausted {
            return PrefetchStart::Exhausted;
        }
        if !self.near_left_edge() {
            return PrefetchStart::NotNearEdge;
        }

        self.prefetch.run = Some(PrefetchRun {
            token: self.prefetch.token,
            steps_taken: 0,
            direction_changed: false,
            next_step_at: None,
        });
        self.start_prefetch_step();
        PrefetchStart::Started
    }

    fn near_left_edge(&self) -> bool {
        let Some(window) = self.x_window() else {
            return false;
        };
        if self.candles().is_empty() {
            return false;
        }
        is_near_left_edge(
            window.min,
            window.max,
            0.0,
            1.0,
            CHART.prefetch.edge_ratio,
            CHART.prefetch.edge_min_units,
        )
    }

    fn start_prefetch_step(&mut self) {
        let Some(run) = self.prefetch.run.as_mut() else {
            return;
        };
        run.steps_taken += 1;
        run.next_step_at = None;

        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_prefetch_steps {
            log::info!("[{}] prefetch step {}", self.key, run.steps_taken);
        }

        let jobs: Vec<(usize, HistorySource)> = self
            .series
            .iter_mut()
            .enumerate()
            .filter_map(|(index, def)| def.take_source().map(|source| (index, source)))
            .collect();
        if jobs.is_empty() {
            self.prefetch.run = None;
            return;
        }

        self.loading = true;
        self.prefetch.task = Some(
            self.env
                .runner
                .spawn("chart_prefetch", fetch_one_page_sequential(jobs)),
        );
    }

    fn apply_prefetch_step(&mut self, batches: Vec<SourceBatch>, now: AppInstant) {
        self.loading = false;
        let mut primary_added = 0;
        let mut total_added = 0;
        let mut failed = false;

        for batch in batches {
            let SourceBatch {
                series_index,
                source,
                result,
            } = batch;
            let def = &mut self.series[series_index];
            def.restore_source(source);
            match result {
                Ok(points) => {
                    let added = prepend_older(def.points_mut(), points);
                    if series_index == self.primary {
                        primary_added = added;
                    }
                    total_added += added;
                }
                Err(e) => {
                    failed = true;
                    log::error!("[{}] prefetch failed for {}: {}", self.key, def.name, e);
                    self.last_error = Some(e.to_string());
                }
            }
        }

        if total_added > 0 && self.state == InstanceState::Ready {
            let shift = primary_added as f64;
            let window = self.x_window().unwrap_or_default().shifted(shift);
            self.last_pan_min = self.last_pan_min.map(|min| min + shift);
            let volume = self.sync_volume_series();
            let candles = self.candles().to_vec();
            if let Some(widget) = self.widget.as_mut() {
                widget.update_options(OptionsUpdate {
                    x_window: Some(window),
                    candles: Some(candles),
                    volume: Some(volume),
                    ..Default::default()
                });
            }
            self.refresh_latest_ohlc();
            self.update_loaded_label(window);
        }

        if failed {
            self.finish_prefetch(StopReason::Failed);
        } else if primary_added == 0 {
            self.history_exhausted = true;
            self.finish_prefetch(StopReason::Empty);
        } else if let Some(run) = self.prefetch.run.as_mut() {
            run.next_step_at = Some(now + CHART.prefetch.step_cooldown);
        }

        if self.pending_reload {
            self.prefetch.run = None;
            self.start_reload();
        }
    }

    /// Step boundary: decide whether the run may fetch again.
    fn continue_prefetch(&mut self, now: AppInstant) {
        let Some(run) = self.prefetch.run.as_ref() else {
            return;
        };
        let Some(due) = run.next_step_at else {
            return;
        };
        if now < due {
            return;
        }

        let reason = if run.token != self.prefetch.token {
            Some(StopReason::Stale)
        } else if run.direction_changed {
            Some(StopReason::DirectionChanged)
        } else if run.steps_taken >= CHART.prefetch.max_steps {
            Some(StopReason::Budget)
        } else if !self.near_left_edge() {
            Some(StopReason::EdgeCleared)
        } else {
            None
        };

        match reason {
            Some(reason) => self.finish_prefetch(reason),
            None => self.start_prefetch_step(),
        }
    }

    fn finish_prefetch(&mut self, reason: StopReason) {
        let run = self.prefetch.run.take();

        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_prefetch_steps {
            if let Some(run) = &run {
                log::info!(
                    "[{}] prefetch stopped after {} step(s): {:?}",
                    self.key,
                    run.steps_taken,
                    reason
                );
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = (run, reason);
    }

    // ---------------------------------------------------------------------
    // Interaction
    // ---------------------------------------------------------------------

    pub fn handle_event(&mut self, event: ChartEvent, now: AppInstant) {
        if self.state == InstanceState::Destroyed {
            return;
        }
        match event {
            ChartEvent::PanStarted => {
                self.dragging = true;
                self.prefetch.token += 1;
                self.last_pan_min = self.x_window().map(|w| w.min);
            }
            ChartEvent::Panned { min, max } => {
                self.track_direction(min);
                self.sync_window(XWindow::new(min, max), now);
                self.request_prefetch();
            }
            ChartEvent::PanEnded => {
                self.dragging = false;
                self.axis_dirty_since = Some(now);
                if let Some(window) = self.x_window() {
                    self.update_loaded_label(window);
                }
            }
            ChartEvent::Zoomed { min, max } => {
                self.sync_window(XWindow::new(min, max), now);
                self.request_prefetch();
            }
            ChartEvent::HoverPoint {
                series_index,
                point_index,
            } => self.hover_point(series_index, point_index),
            ChartEvent::HoverLeft => {
                self.hover_active = false;
                self.refresh_latest_ohlc();
            }
        }
    }

    fn track_direction(&mut self, min: f64) {
        if let Some(previous) = self.last_pan_min {
            if min > previous {
                if let Some(run) = self.prefetch.run.as_mut() {
                    run.direction_changed = true;
                }
            }
        }
        self.last_pan_min = Some(min);
    }

    fn sync_window(&mut self, window: XWindow, now: AppInstant) {
        if let Some(widget) = self.widget.as_mut() {
            widget.sync_user_window(window);
        }
        self.axis_dirty_since = Some(now);
    }

    fn hover_point(&mut self, series_index: usize, point_index: usize) {
        let Some(def) = self.series.get(series_index) else {
            return;
        };
        if def.kind != SeriesKind::Candlestick {
            return;
        }
        if let Some(candle) = def.points().get(point_index) {
            self.hover_active = true;
            self.ohlc = Some(OhlcLabel::from_candle(candle, self.interval));
        }
    }

    fn refresh_latest_ohlc(&mut self) {
        if self.hover_active {
            return;
        }
        self.ohlc = self
            .candles()
            .last()
            .map(|candle| OhlcLabel::from_candle(candle, self.interval));
    }

    /// Collects finished fetches and runs the prefetch cooldown and axis debounce.
    /// Returns `true` while the instance still has work pending (so the UI keeps repainting).
    pub fn poll(&mut self, now: AppInstant) -> bool {
        if self.state == InstanceState::Destroyed {
            return false;
        }

        if let Some(task) = self.reload_task.take() {
            match task.try_take() {
                Ok(batches) => self.apply_reload(batches),
                Err(task) => self.reload_task = Some(task),
            }
        }

        if let Some(task) = self.prefetch.task.take() {
            match task.try_take() {
                Ok(batches) => self.apply_prefetch_step(batches, now),
                Err(task) => self.prefetch.task = Some(task),
            }
        }

        if self.prefetch.task.is_none() {
            self.continue_prefetch(now);
        }

        if let Some(since) = self.axis_dirty_since {
            if !self.dragging && elapsed_at_least(since, now, CHART.axis.recompute_debounce) {
                self.axis_dirty_since = None;
                self.recompute_axes();
            }
        }

        self.fetch_in_flight() || self.prefetch.run.is_some() || self.axis_dirty_since.is_some()
    }

    fn recompute_axes(&mut self) {
        let Some(window) = self.x_window() else {
            return;
        };
        let limits = compute_axis_bounds(&self.series, window, CHART.axis.margin_pct);
        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_axis_recompute {
            log::info!("[{}] axes for {:?}: {:?}", self.key, window, limits);
        }
        if let Some(widget) = self.widget.as_mut() {
            widget.update_options(OptionsUpdate {
                price_axis: Some(limits.price),
                volume_axis: Some(limits.volume),
                ..Default::default()
            });
        }
        self.update_loaded_label(window);
    }

    /// Back to the default window over the newest candles.
    pub fn go_to_latest(&mut self) {
        if self.state != InstanceState::Ready {
            return;
        }
        let window = default_window(self.candles().len(), self.window_size);
        let limits = compute_axis_bounds(&self.series, window, CHART.axis.margin_pct);
        if let Some(widget) = self.widget.as_mut() {
            widget.update_options(OptionsUpdate {
                x_window: Some(window),
                price_axis: Some(limits.price),
                volume_axis: Some(limits.volume),
                ..Default::default()
            });
        }
        self.axis_dirty_since = None;
        self.update_loaded_label(window);
    }

    // ---------------------------------------------------------------------
    // Volume
    // ---------------------------------------------------------------------

    /// Copies the candles into the volume series when volume is shown, empties it otherwise.
    fn sync_volume_series(&mut self) -> Vec<VolumeBar> {
        let Some(index) = self.volume_series else {
            return Vec::new();
        };
        let candles = if self.volume_visible {
            self.candles().to_vec()
        } else {
            Vec::new()
        };
        let bars = volume_bars(&candles);
        *self.series[index].points_mut() = candles;
        bars
    }

    pub fn toggle_volume(&mut self) -> bool {
        let visible = !self.volume_visible;
        self.set_volume_visible(visible);
        visible
    }

    pub fn set_volume_visible(&mut self, visible: bool) {
        self.volume_visible = visible;
        let volume = self.sync_volume_series();
        if let Some(widget) = self.widget.as_mut() {
            widget.update_options(OptionsUpdate {
                volume: Some(volume),
                volume_visible: Some(visible),
                ..Default::default()
            });
        }
    }

    // ---------------------------------------------------------------------
    // Retracements
    // ---------------------------------------------------------------------

    /// Adds an overlay, replacing any overlay with the same id.
    pub fn add_retracement(&mut self, params: RetracementParams) {
        let overlay = RetracementOverlay::new(params);
        match self.retracements.iter_mut().find(|o| o.id() == overlay.id()) {
            Some(existing) => *existing = overlay,
            None => self.retracements.push(overlay),
        }
        self.push_markers();
    }

    pub fn set_retracements(&mut self, params: Vec<RetracementParams>) {
        self.retracements = params.into_iter().map(RetracementOverlay::new).collect();
        self.push_markers();
    }

    /// Flips visibility. Returns the new hidden flag, or `None` for an unknown id.
    pub fn toggle_retracement(&mut self, id: &str) -> Option<bool> {
        let overlay = self.retracements.iter_mut().find(|o| o.id() == id)?;
        overlay.params.hidden = !overlay.params.hidden;
        let hidden = overlay.params.hidden;
        self.push_markers();
        Some(hidden)
    }

    pub fn remove_retracement(&mut self, id: &str) -> bool {
        let before = self.retracements.len();
        self.retracements.retain(|o| o.id() != id);
        let removed = self.retracements.len() != before;
        if removed {
            self.push_markers();
        }
        removed
    }

    fn push_markers(&mut self) {
        let markers = combined_markers(&self.retracements);
        if let Some(widget) = self.widget.as_mut() {
            widget.update_options(OptionsUpdate {
                markers: Some(markers),
                ..Default::default()
            });
        }
    }

    // ---------------------------------------------------------------------
    // Labels
    // ---------------------------------------------------------------------

    fn update_loaded_label(&mut self, window: XWindow) {
        let candles = self.candles();
        if candles.is_empty() {
            self.loaded_label.clear();
            return;
        }
        let last = candles.len() - 1;
        let index_at = |x: f64| (x.round().max(0.0) as usize).min(last);
        let from = format_for_interval(candles[index_at(window.min)].timestamp_ms, self.interval);
        let to = format_for_interval(candles[index_at(window.max)].timestamp_ms, self.interval);
        self.loaded_label = format!("{} … {} (len {})", from, to, self.series[0].points().len());
    }
}
