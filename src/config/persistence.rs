//! File persistence and backend settings configuration

// App state persistence
/// Path for saving/loading application UI state
pub const APP_STATE_PATH: &str = ".states.json";

/// Chart-settings backend, overridable with `--settings-url`
pub const DEFAULT_SETTINGS_URL: &str = "http://localhost:8080";

/// Collection endpoint (GET list, POST upsert). DELETE appends `/{SYMBOL}`.
pub const CHART_SETTINGS_PATH: &str = "/api/user/chart-settings";

/// Request timeout for the settings backend
pub const SETTINGS_TIMEOUT_MS: u64 = 5000;
