//! Binance-specific configuration constants and types.

/// Configuration for Binance REST API client
/// (This is the runtime struct used by the klines fetcher)
pub struct BinanceApiConfig {
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for BinanceApiConfig {
    fn default() -> Self {
        Self {
            timeout_ms: BINANCE.client.timeout_ms,
            retries: BINANCE.client.retries,
            backoff_ms: BINANCE.client.backoff_ms,
        }
    }
}

/// Configuration for REST API Limits
pub struct RestLimits {
    /// Hard ceiling Binance accepts for `limit` on the klines endpoint
    pub klines_limit_max: i32,
    /// Floor for `limit` (Binance rejects 0)
    pub klines_limit_min: i32,
    /// Page size used for every history fetch unless a caller asks otherwise
    pub default_page_size: usize,
}

/// Default values for the Rest Client
pub struct ClientDefaults {
    pub timeout_ms: u64,
    /// Failed fetches are never retried; the next pan or reload asks again.
    pub retries: u32,
    pub backoff_ms: u64,
}

/// The Master Configuration Struct
pub struct BinanceConfig {
    pub limits: RestLimits,
    pub client: ClientDefaults,
}

pub const BINANCE: BinanceConfig = BinanceConfig {
    limits: RestLimits {
        klines_limit_max: 1000,
        klines_limit_min: 1,
        default_page_size: 250,
    },
    client: ClientDefaults {
        timeout_ms: 5000,
        retries: 0,
        backoff_ms: 0,
    },
};
