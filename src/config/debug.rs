//! Debugging feature flags.
//!
//! Toggle individual diagnostics here; keep them `false` by default so
//! builds stay quiet. All of them are further gated by `cfg(debug_assertions)`.

/// Emit UI interaction logs (e.g., timeframe switching, manual actions).
pub const PRINT_UI_INTERACTIONS: bool = true;

/// Emit one line per history page fetched (symbol, interval, count, cursor).
pub const PRINT_HISTORY_FETCHES: bool = false;

/// Emit prefetch run lifecycle (start, step, stop reason).
pub const PRINT_PREFETCH_STEPS: bool = false;

/// Emit axis recompute results after pan/zoom debounce.
pub const PRINT_AXIS_RECOMPUTE: bool = false;

/// Emit chart-settings load/save traffic.
pub const PRINT_SETTINGS_IO: bool = false;

/// Emit details of UI state serialization/deserialization logs.
pub const PRINT_STATE_SERDE: bool = false;

/// Emit shutdown app messages.
pub const PRINT_SHUTDOWN: bool = false;

pub struct DebugFlags {
    pub print_ui_interactions: bool,
    pub print_history_fetches: bool,
    pub print_prefetch_steps: bool,
    pub print_axis_recompute: bool,
    pub print_settings_io: bool,
    pub print_state_serde: bool,
    pub print_shutdown: bool,
}

pub const DEBUG_FLAGS: DebugFlags = DebugFlags {
    print_ui_interactions: PRINT_UI_INTERACTIONS,
    print_history_fetches: PRINT_HISTORY_FETCHES,
    print_prefetch_steps: PRINT_PREFETCH_STEPS,
    print_axis_recompute: PRINT_AXIS_RECOMPUTE,
    print_settings_io: PRINT_SETTINGS_IO,
    print_state_serde: PRINT_STATE_SERDE,
    print_shutdown: PRINT_SHUTDOWN,
};
