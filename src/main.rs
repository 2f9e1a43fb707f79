#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use std::path::PathBuf;

use clap::Parser;
use eframe::NativeOptions;
use tokio::runtime::Runtime;

use candle_deck::config::APP_STATE_PATH;
use candle_deck::{Cli, run_app};

fn main() -> eframe::Result {
    // A. Init Logging
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {:?}", panic_info);
    }));
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // B. Parse Args
    let args = Cli::parse();
    #[cfg(debug_assertions)]
    log::info!("Parsed arguments: {:?}", args);

    // C. Runtime for every network call. Lives until the window closes.
    let rt = Runtime::new().map_err(|e| eframe::Error::AppCreation(Box::new(e)))?;
    let handle = rt.handle().clone();

    // D. Run Native App
    let options = NativeOptions {
        persistence_path: Some(PathBuf::from(APP_STATE_PATH)),
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1280.0, 900.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Candle Deck",
        options,
        Box::new(move |cc| run_app(cc, &args, handle).map_err(Into::into)),
    )
}
