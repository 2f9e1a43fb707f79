//! Configuration module for the candle-deck application.

pub mod binance;
pub mod chart;

mod debug; // Can be private because of the public re-export. Forces files to use crate::config::DEBUG_FLAGS not crate::config::debug::DEBUG_FLAGS
pub use debug::DEBUG_FLAGS;

pub mod demo;
pub mod persistence;
pub mod plot;

// Re-export commonly used items
pub use binance::BINANCE;
pub use chart::CHART;
pub use demo::DEMO;
pub use persistence::{APP_STATE_PATH, CHART_SETTINGS_PATH, DEFAULT_SETTINGS_URL};
pub use plot::PLOT_CONFIG;
