// Kline history and chart-settings I/O
pub mod bn_kline;
pub mod history_source;
pub mod settings_store;
pub mod synthetic;

#[cfg(test)]
pub mod test_fetchers;

// Re-export commonly used types
pub use bn_kline::BinanceKlineFetcher;
pub use history_source::{HistoryError, HistorySource, KlineFetcher, KlineRequest};
pub use settings_store::{
    ChartSettings, HttpSettingsStore, MemorySettingsStore, SettingsStore, UserChartSettings,
};
pub use synthetic::SyntheticKlineFetcher;
