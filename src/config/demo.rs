//! config/demo.rs Demo mode knobs.
//!
//! Demo mode swaps the exchange for a synthetic kline generator so the
//! app runs without network access and always shows the same data.

/// The Master Demo Configuration
pub struct DemoConfig {
    /// Charts opened by an offline demo session
    pub pairs: &'static [&'static str],
    /// How many candles of history each symbol/interval has before it runs dry
    pub history_depth: usize,
    /// Fixed "now" so demo output does not depend on the wall clock
    pub anchor_ms: i64,
}

pub const DEMO: DemoConfig = DemoConfig {
    pairs: &["BTCUSDT", "ETHUSDT", "SOLUSDT", "BNBUSDT", "PAXGUSDT"],
    history_depth: 3000,
    // 2025-01-01 00:00 UTC
    anchor_ms: 1_735_689_600_000,
};
