#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

// Core modules
pub mod chart;
pub mod config;
pub mod data;
pub mod domain;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use chart::{ChartInstance, ChartRegistry};
pub use data::{HistorySource, KlineFetcher};
pub use domain::{CandlePoint, Interval};
pub use ui::CandleDeckApp;
pub use utils::app_time;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::runtime::Handle;

use crate::chart::{ChartEnv, TaskRunner};
use crate::config::{CHART, DEFAULT_SETTINGS_URL, DEMO};
use crate::data::{
    BinanceKlineFetcher, ChartSettings, HttpSettingsStore, MemorySettingsStore, SettingsStore,
    SyntheticKlineFetcher,
};
use crate::ui::PageController;

// CLI argument parsing
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the chart-settings backend
    #[arg(long, default_value = DEFAULT_SETTINGS_URL)]
    pub settings_url: String,

    /// Serve generated candles instead of calling the exchange
    #[arg(long, default_value_t = false)]
    pub demo: bool,

    /// Keep chart settings in memory instead of the backend
    #[arg(long, default_value_t = false)]
    pub offline: bool,

    /// Candles shown after a (re)load
    #[arg(long, default_value_t = CHART.default_window_size)]
    pub window_size: usize,
}

/// Main application entry point - creates the GUI app
/// This is the public API for the binary to call
pub fn run_app(
    cc: &eframe::CreationContext,
    args: &Cli,
    handle: Handle,
) -> anyhow::Result<Box<dyn eframe::App>> {
    let fetcher: Arc<dyn KlineFetcher> = if args.demo {
        log::info!("Demo mode: candles are generated locally");
        Arc::new(SyntheticKlineFetcher::default())
    } else {
        Arc::new(BinanceKlineFetcher::new().context("creating the klines client")?)
    };

    let store: Arc<dyn SettingsStore> = if args.offline && args.demo {
        log::info!("Offline demo: opening {} sample charts", DEMO.pairs.len());
        Arc::new(MemorySettingsStore::with_rows(
            DEMO.pairs.iter().map(|symbol| ChartSettings::new(symbol)).collect(),
        ))
    } else if args.offline {
        log::info!("Offline mode: chart settings are not persisted");
        Arc::new(MemorySettingsStore::default())
    } else {
        Arc::new(HttpSettingsStore::new(&args.settings_url)?)
    };

    let env = ChartEnv {
        fetcher,
        runner: TaskRunner::Runtime(handle),
    };
    let controller = PageController::new(env, store, args.window_size);
    Ok(Box::new(CandleDeckApp::new(cc, controller)))
}
