// User interface components
pub mod app;
pub mod chart_card;
pub mod config;
pub mod page_controller;
pub mod plot_layers;
pub mod plot_view;
pub mod styles;
pub mod utils;

// Re-export main app
pub use app::CandleDeckApp;
pub use config::{UI_CONFIG, UI_TEXT};
pub use page_controller::{ChartAction, PageController};
