//! Page level glue between the chart registry and the saved chart settings.
//!
//! Nothing here draws. The app feeds `ChartAction`s in, calls `poll` once per frame and
//! renders whatever the registry holds.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;
use poll_promise::Promise;

use crate::chart::{ChartEnv, ChartInstance, ChartRegistry, ConfigError, InstanceConfig, TaskRunner};
use crate::config::CHART;
#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;
use crate::data::{ChartSettings, SettingsStore};
use crate::domain::retracement::{decode_params_list, encode_params_list};
use crate::domain::{Interval, RetracementParams};
use crate::utils::app_time::AppInstant;

/// What a chart card asks the page to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartAction {
    SetTimeframe(Interval),
    /// Pick the interval that fits the loaded span.
    AutoTimeframe,
    ChangeSymbol(String),
    GoToLatest,
    Reload,
    ToggleVolume,
    AddRetracement(RetracementParams),
    ToggleRetracement(String),
    RemoveRetracement(String),
    Remove,
}

impl ChartAction {
    /// Does applying this action change what gets saved for the chart?
    fn changes_settings(&self) -> bool {
        !matches!(self, ChartAction::GoToLatest | ChartAction::Reload | ChartAction::Remove)
    }
}

pub struct PageController {
    registry: ChartRegistry,
    store: Arc<dyn SettingsStore>,
    runner: TaskRunner,
    window_size: usize,
    settings_task: Option<Promise<Result<Vec<ChartSettings>>>>,
    /// Saved state waiting for its chart's first successful load.
    pending_apply: HashMap<String, ChartSettings>,
    /// Last settings written (or loaded) per chart key.
    saved: HashMap<String, ChartSettings>,
    writes: Vec<Promise<()>>,
}

impl PageController {
    pub fn new(env: ChartEnv, store: Arc<dyn SettingsStore>, window_size: usize) -> Self {
        let runner = env.runner.clone();
        Self {
            registry: ChartRegistry::new(env),
            store,
            runner,
            window_size: window_size.max(1),
            settings_task: None,
            pending_apply: HashMap::new(),
            saved: HashMap::new(),
            writes: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ChartRegistry {
        &self.registry
    }

    pub fn chart(&self, key: &str) -> Option<&ChartInstance> {
        self.registry.get(key)
    }

    pub fn chart_mut(&mut self, key: &str) -> Option<&mut ChartInstance> {
        self.registry.get_mut(key)
    }

    pub fn is_loading_settings(&self) -> bool {
        self.settings_task.is_some()
    }

    /// Saves and deletes that have not completed yet.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.registry.set_viewport_height(height);
    }

    /// Kicks off the settings load. Charts are created when it lands on a later `poll`.
    pub fn start(&mut self) {
        if self.settings_task.is_some() || !self.registry.is_empty() {
            return;
        }
        log::info!("Loading chart settings from {}", self.store.signature());
        let store = self.store.clone();
        self.settings_task = Some(
            self.runner
                .spawn("load_chart_settings", async move { store.load_all().await }),
        );
    }

    /// Per frame housekeeping. Returns `true` while anything is still in progress.
    pub fn poll(&mut self, now: AppInstant) -> bool {
        if let Some(task) = self.settings_task.take() {
            match task.try_take() {
                Ok(result) => self.open_saved_charts(result),
                Err(task) => self.settings_task = Some(task),
            }
        }

        let charts_busy = self.registry.poll_all(now);
        self.apply_saved_state();
        self.save_drifted();
        self.writes.retain(|write| write.ready().is_none());

        // Charts waiting on a first load count through `charts_busy` only while they fetch.
        charts_busy || self.settings_task.is_some()
    }

    fn open_saved_charts(&mut self, result: Result<Vec<ChartSettings>>) {
        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Could not load chart settings: {:#}", e);
                Vec::new()
            }
        };

        if rows.is_empty() {
            if let Err(e) = self.open_chart(ChartSettings::new(CHART.default_symbol)) {
                log::error!("Could not open the default chart: {}", e);
            }
            return;
        }
        log::info!(
            "Opening saved charts: {}",
            rows.iter().map(|row| row.symbol.as_str()).join(", ")
        );
        for row in rows {
            let symbol = row.symbol.clone();
            if let Err(e) = self.open_chart(row) {
                log::warn!("Skipping saved chart {}: {}", symbol, e);
            }
        }
    }

    fn open_chart(&mut self, settings: ChartSettings) -> Result<(), ConfigError> {
        let mut config = InstanceConfig::for_symbol(&settings.symbol, settings.parsed_interval());
        config.window_size = self.window_size;
        let key = self.registry.create(config)?.key().to_string();
        self.saved.insert(key.clone(), settings.clone());
        self.pending_apply.insert(key, settings);
        Ok(())
    }

    fn apply_saved_state(&mut self) {
        if self.pending_apply.is_empty() {
            return;
        }
        let ready: Vec<String> = self
            .pending_apply
            .keys()
            .filter(|key| self.registry.get(key).is_none_or(|chart| chart.is_ready()))
            .cloned()
            .collect();

        for key in ready {
            self.apply_pending(&key);
        }
    }

    /// Hands a chart the saved state still waiting for it, if any.
    fn apply_pending(&mut self, key: &str) {
        let Some(settings) = self.pending_apply.remove(key) else {
            return;
        };
        let Some(chart) = self.registry.get_mut(key) else {
            return;
        };
        chart.set_volume_visible(!settings.volume_hidden);
        chart.set_retracements(decode_params_list(&settings.retracements));
        self.saved.insert(key.to_string(), settings_of(chart));

        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_settings_io {
            log::info!(
                "[{}] applied saved state: volume hidden {}, {} retracement(s)",
                key,
                settings.volume_hidden,
                chart.retracements().len()
            );
        }
    }

    /// Saves ready charts whose state no longer matches the last save. This happens when a
    /// failed timeframe or symbol change puts a chart back on what it still shows.
    fn save_drifted(&mut self) {
        let drifted: Vec<(String, ChartSettings)> = self
            .registry
            .iter()
            .filter(|chart| chart.is_ready() && !self.pending_apply.contains_key(chart.key()))
            .map(|chart| (chart.key().to_string(), settings_of(chart)))
            .filter(|(key, settings)| self.saved.get(key) != Some(settings))
            .collect();

        for (key, settings) in drifted {
            log::info!("[{}] saving settings after a reverted change", key);
            if settings.symbol != key {
                if let Err(e) = self.registry.rekey(&key, &settings.symbol) {
                    log::warn!("[{}] cannot move back to '{}': {}", key, settings.symbol, e);
                    self.saved.insert(key, settings);
                    continue;
                }
                self.saved.remove(&key);
                self.delete(key);
            }
            self.save(settings);
        }
    }

    /// Opens a new card for `symbol` and saves its default settings.
    pub fn add_chart(&mut self, symbol: &str) -> Result<(), ConfigError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ConfigError::MissingKey);
        }
        let settings = ChartSettings::new(&symbol);
        self.open_chart(settings.clone())?;
        // Nothing to restore for a brand new chart.
        self.pending_apply.remove(&symbol);
        self.save(settings);
        Ok(())
    }

    /// Applies a card action. Returns `false` when no chart has that key.
    pub fn apply(&mut self, key: &str, action: ChartAction) -> bool {
        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_ui_interactions {
            log::info!("[{}] action {:?}", key, action);
        }

        if action == ChartAction::Remove {
            return self.remove_chart(key);
        }

        if self.registry.get(key).is_none() {
            log::warn!("No chart '{}' for {:?}", key, action);
            return false;
        }
        if let ChartAction::ChangeSymbol(symbol) = &action {
            let symbol = symbol.trim().to_uppercase();
            if symbol.is_empty() || self.registry.get(&symbol).is_some() {
                log::warn!("[{}] not switching to '{}': blank or already open", key, symbol);
                return true;
            }
        }

        let persist = action.changes_settings();
        if persist {
            // The save below would otherwise replace saved state the chart never received.
            self.apply_pending(key);
        }
        let Some(chart) = self.registry.get_mut(key) else {
            return false;
        };
        let previous_symbol = chart.symbol().to_string();

        match action {
            ChartAction::SetTimeframe(interval) => chart.change_timeframe(interval),
            ChartAction::AutoTimeframe => {
                let Some(span) = visible_span_ms(chart) else {
                    return true;
                };
                let interval = Interval::suggest_for_span(span, CHART.auto_interval_target_points);
                if interval == chart.interval() {
                    return true;
                }
                chart.change_timeframe(interval);
            }
            ChartAction::ChangeSymbol(symbol) => {
                if !chart.change_symbol_for(0, &symbol) {
                    return true;
                }
            }
            ChartAction::GoToLatest => chart.go_to_latest(),
            ChartAction::Reload => chart.reload(),
            ChartAction::ToggleVolume => {
                chart.toggle_volume();
            }
            ChartAction::AddRetracement(params) => chart.add_retracement(params),
            ChartAction::ToggleRetracement(id) => {
                chart.toggle_retracement(&id);
            }
            ChartAction::RemoveRetracement(id) => {
                chart.remove_retracement(&id);
            }
            ChartAction::Remove => {}
        }

        if persist {
            let settings = settings_of(chart);
            if settings.symbol != previous_symbol {
                if let Err(e) = self.registry.rekey(key, &settings.symbol) {
                    log::error!("[{}] could not move to '{}': {}", key, settings.symbol, e);
                }
                self.saved.remove(key);
                self.delete(previous_symbol);
            }
            self.save(settings);
        }
        true
    }

    fn remove_chart(&mut self, key: &str) -> bool {
        let Some(symbol) = self.registry.get(key).map(|chart| chart.symbol().to_string()) else {
            return false;
        };
        self.pending_apply.remove(key);
        self.saved.remove(key);
        self.registry.destroy(key);
        self.delete(symbol);
        true
    }

    fn save(&mut self, settings: ChartSettings) {
        self.saved.insert(settings.symbol.clone(), settings.clone());
        let store = self.store.clone();
        self.writes.push(self.runner.spawn("save_chart_settings", async move {
            if let Err(e) = store.save(&settings).await {
                log::error!("Saving settings for {} failed: {:#}", settings.symbol, e);
            }
        }));
    }

    fn delete(&mut self, symbol: String) {
        let store = self.store.clone();
        self.writes.push(self.runner.spawn("delete_chart_settings", async move {
            if let Err(e) = store.delete(&symbol).await {
                log::error!("Deleting settings for {} failed: {:#}", symbol, e);
            }
        }));
    }
}

/// Current persisted shape of a chart card.
pub fn settings_of(chart: &ChartInstance) -> ChartSettings {
    ChartSettings {
        symbol: chart.symbol().to_string(),
        interval: chart.interval().as_str().to_string(),
        volume_hidden: !chart.volume_visible(),
        retracements: encode_params_list(chart.retracements()),
    }
}

/// Time covered by the candles inside the visible window.
fn visible_span_ms(chart: &ChartInstance) -> Option<i64> {
    let window = chart.widget()?.options().x_window;
    let candles = chart.candles();
    if candles.is_empty() {
        return None;
    }
    let last = candles.len() - 1;
    let first = (window.min.ceil().max(0.0) as usize).min(last);
    let end = (window.max.floor().max(0.0) as usize).min(last);
    if end <= first {
        return None;
    }
    Some(candles[end].timestamp_ms - candles[first].timestamp_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::InstanceState;
    use crate::data::HistoryError;
    use crate::data::test_fetchers::ScriptedFetcher;
    use crate::data::MemorySettingsStore;
    use crate::utils::TimeUtils;
    use crate::utils::app_time::now;

    fn controller_with(rows: Vec<ChartSettings>) -> (PageController, Arc<MemorySettingsStore>) {
        controller_on(Arc::new(ScriptedFetcher::ascending(0, TimeUtils::MS_IN_MIN, 2_000)), rows)
    }

    fn controller_on(
        fetcher: Arc<ScriptedFetcher>,
        rows: Vec<ChartSettings>,
    ) -> (PageController, Arc<MemorySettingsStore>) {
        let env = ChartEnv {
            fetcher,
            runner: TaskRunner::Inline,
        };
        let store = Arc::new(MemorySettingsStore::with_rows(rows));
        let mut controller = PageController::new(env, store.clone(), 100);
        controller.start();
        controller.poll(now());
        (controller, store)
    }

    fn fib(id: &str) -> RetracementParams {
        RetracementParams {
            id: id.to_string(),
            start_price: 100.0,
            end_price: 200.0,
            start_date_ms: 0,
            end_date_ms: TimeUtils::MS_IN_D,
            hidden: false,
        }
    }

    #[test]
    fn empty_settings_open_the_default_chart() {
        let (controller, _) = controller_with(vec![]);
        assert_eq!(controller.registry().keys(), vec![CHART.default_symbol.to_string()]);
        assert!(!controller.is_loading_settings());
    }

    #[test]
    fn saved_rows_become_charts_with_their_state() {
        let mut eth = ChartSettings::new("ETHUSDT");
        eth.interval = "4h".to_string();
        eth.volume_hidden = true;
        eth.retracements = serde_json::to_string(&vec![fib("a")]).unwrap();

        let (controller, _) = controller_with(vec![ChartSettings::new("BTCUSDT"), eth]);

        assert_eq!(controller.registry().keys(), vec!["BTCUSDT", "ETHUSDT"]);
        let chart = controller.chart("ETHUSDT").unwrap();
        assert!(chart.is_ready());
        assert_eq!(chart.interval(), Interval::H4);
        assert!(!chart.volume_visible());
        assert_eq!(chart.retracements().len(), 1);
        assert!(chart.widget().unwrap().options().markers.len() > 2);
    }

    #[test]
    fn unreadable_retracements_still_open_the_chart() {
        let mut row = ChartSettings::new("SOLUSDT");
        row.retracements = "not json".to_string();
        let (controller, _) = controller_with(vec![row]);
        let chart = controller.chart("SOLUSDT").unwrap();
        assert!(chart.retracements().is_empty());
    }

    #[test]
    fn actions_are_saved() {
        let (mut controller, store) = controller_with(vec![]);

        assert!(controller.apply("BTCUSDT", ChartAction::SetTimeframe(Interval::D1)));
        controller.poll(now());
        assert!(controller.apply("BTCUSDT", ChartAction::ToggleVolume));
        assert!(controller.apply("BTCUSDT", ChartAction::AddRetracement(fib("x"))));
        controller.poll(now());

        let rows = store.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].interval, "1d");
        assert!(rows[0].volume_hidden);
        assert_eq!(decode_params_list(&rows[0].retracements), vec![fib("x")]);
        assert_eq!(controller.pending_writes(), 0);
    }

    #[test]
    fn remove_destroys_and_deletes() {
        let (mut controller, store) = controller_with(vec![
            ChartSettings::new("BTCUSDT"),
            ChartSettings::new("ETHUSDT"),
        ]);

        assert!(controller.apply("BTCUSDT", ChartAction::Remove));
        assert!(!controller.apply("BTCUSDT", ChartAction::Remove));

        assert_eq!(controller.registry().keys(), vec!["ETHUSDT"]);
        let symbols: Vec<String> = store.snapshot().into_iter().map(|r| r.symbol).collect();
        assert_eq!(symbols, vec!["ETHUSDT"]);
    }

    #[test]
    fn add_chart_rejects_duplicates_and_blanks() {
        let (mut controller, store) = controller_with(vec![]);

        assert_eq!(controller.add_chart("  "), Err(ConfigError::MissingKey));
        assert_eq!(
            controller.add_chart("btcusdt"),
            Err(ConfigError::DuplicateKey("BTCUSDT".to_string()))
        );
        assert!(controller.add_chart("ethusdt").is_ok());
        controller.poll(now());

        assert_eq!(controller.registry().len(), 2);
        assert!(controller.chart("ETHUSDT").unwrap().is_ready());
        assert!(store.snapshot().iter().any(|r| r.symbol == "ETHUSDT"));
    }

    #[test]
    fn symbol_change_moves_the_saved_row() {
        let (mut controller, store) = controller_with(vec![]);

        assert!(controller.apply("BTCUSDT", ChartAction::ChangeSymbol("paxgusdt".to_string())));
        controller.poll(now());

        let chart = controller.chart("PAXGUSDT").unwrap();
        assert_eq!(chart.symbol(), "PAXGUSDT");
        let symbols: Vec<String> = store.snapshot().into_iter().map(|r| r.symbol).collect();
        assert_eq!(symbols, vec!["PAXGUSDT"]);
    }

    #[test]
    fn symbol_change_frees_the_old_symbol() {
        let (mut controller, store) = controller_with(vec![]);

        assert!(controller.apply("BTCUSDT", ChartAction::ChangeSymbol("ethusdt".to_string())));
        controller.poll(now());
        assert_eq!(controller.registry().keys(), vec!["ETHUSDT"]);
        assert_eq!(
            controller.add_chart("ethusdt"),
            Err(ConfigError::DuplicateKey("ETHUSDT".to_string()))
        );
        assert!(controller.add_chart("btcusdt").is_ok());
        controller.poll(now());

        // A symbol another card already shows is refused.
        assert!(controller.apply("BTCUSDT", ChartAction::ChangeSymbol("ETHUSDT".to_string())));
        assert_eq!(controller.chart("BTCUSDT").unwrap().symbol(), "BTCUSDT");
        assert_eq!(controller.registry().keys(), vec!["ETHUSDT", "BTCUSDT"]);

        let symbols: Vec<String> = store
            .snapshot()
            .into_iter()
            .map(|r| r.symbol)
            .sorted()
            .collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn early_actions_keep_the_saved_state() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, TimeUtils::MS_IN_MIN, 2_000));
        fetcher.fail_next(HistoryError::Network("offline".to_string()));
        let mut eth = ChartSettings::new("ETHUSDT");
        eth.volume_hidden = true;
        eth.retracements = serde_json::to_string(&vec![fib("a")]).unwrap();

        let (mut controller, store) = controller_on(fetcher, vec![eth]);
        assert_eq!(controller.chart("ETHUSDT").unwrap().state(), InstanceState::Uninitialized);

        assert!(controller.apply("ETHUSDT", ChartAction::SetTimeframe(Interval::H4)));
        controller.poll(now());

        let rows = store.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].interval, "4h");
        assert!(rows[0].volume_hidden);
        assert_eq!(decode_params_list(&rows[0].retracements), vec![fib("a")]);

        let chart = controller.chart("ETHUSDT").unwrap();
        assert!(chart.is_ready());
        assert!(!chart.volume_visible());
        assert_eq!(chart.retracements().len(), 1);
    }

    #[test]
    fn failed_changes_are_saved_back_to_what_the_chart_shows() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, TimeUtils::MS_IN_MIN, 2_000));
        let (mut controller, store) = controller_on(fetcher.clone(), vec![]);
        assert!(controller.apply("BTCUSDT", ChartAction::SetTimeframe(Interval::H1)));
        controller.poll(now());

        fetcher.fail_next(HistoryError::Network("offline".to_string()));
        assert!(controller.apply("BTCUSDT", ChartAction::ChangeSymbol("ETHUSDT".to_string())));
        assert_eq!(controller.registry().keys(), vec!["ETHUSDT"]);
        controller.poll(now());

        assert_eq!(controller.registry().keys(), vec!["BTCUSDT"]);
        assert_eq!(controller.chart("BTCUSDT").unwrap().symbol(), "BTCUSDT");
        let symbols: Vec<String> = store.snapshot().into_iter().map(|r| r.symbol).collect();
        assert_eq!(symbols, vec!["BTCUSDT"]);

        fetcher.fail_next(HistoryError::Network("offline".to_string()));
        assert!(controller.apply("BTCUSDT", ChartAction::SetTimeframe(Interval::D1)));
        assert_eq!(store.snapshot()[0].interval, "1d");
        controller.poll(now());
        assert_eq!(store.snapshot()[0].interval, "1h");
        assert!(!controller.poll(now()));
        assert_eq!(controller.pending_writes(), 0);
    }

    #[test]
    fn a_chart_that_never_loads_does_not_keep_the_page_busy() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, TimeUtils::MS_IN_MIN, 2_000));
        fetcher.fail_next(HistoryError::RateLimited);
        let (mut controller, _) = controller_on(fetcher, vec![ChartSettings::new("SOLUSDT")]);

        let chart = controller.chart("SOLUSDT").unwrap();
        assert!(!chart.is_ready());
        assert!(!chart.is_loading());
        assert!(!controller.poll(now()));
    }

    #[test]
    fn auto_timeframe_follows_the_visible_span() {
        let (mut controller, _) = controller_with(vec![]);
        controller.apply("BTCUSDT", ChartAction::SetTimeframe(Interval::W1));
        controller.poll(now());

        // The scripted candles are one minute apart whatever the interval asked for.
        controller.apply("BTCUSDT", ChartAction::AutoTimeframe);
        controller.poll(now());
        assert_eq!(controller.chart("BTCUSDT").unwrap().interval(), Interval::M1);
    }

    #[test]
    fn unknown_key_is_reported() {
        let (mut controller, _) = controller_with(vec![]);
        assert!(!controller.apply("NOPE", ChartAction::GoToLatest));
    }
}
