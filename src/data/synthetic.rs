//! Offline klines for `--demo`: deterministic candles generated per symbol and interval.

use async_trait::async_trait;

use crate::config::DEMO;
use crate::data::history_source::{HistoryError, KlineFetcher, KlineRequest};
use crate::domain::CandlePoint;

pub struct SyntheticKlineFetcher {
    anchor_ms: i64,
    depth: usize,
}

impl Default for SyntheticKlineFetcher {
    fn default() -> Self {
        Self::new(DEMO.anchor_ms, DEMO.history_depth)
    }
}

impl SyntheticKlineFetcher {
    pub fn new(anchor_ms: i64, depth: usize) -> Self {
        Self { anchor_ms, depth }
    }

    /// Same symbol, interval and bucket always give the same candle.
    pub fn candle_at(symbol: &str, bucket_ms: i64, timestamp_ms: i64) -> CandlePoint {
        let seed = symbol_seed(symbol);
        let base = 20.0 + (seed % 50_000) as f64;
        let k = (timestamp_ms / bucket_ms) as f64;

        let wave = |k: f64| {
            base * (1.0 + 0.18 * (k / 90.0 + seed as f64).sin() + 0.04 * (k / 11.0).sin())
        };
        let open = wave(k - 1.0);
        let close = wave(k);
        let jitter = base * 0.004 * (1.0 + noise(seed, timestamp_ms));
        let high = open.max(close) + jitter;
        let low = open.min(close) - jitter;
        let volume = 500.0 + 4_500.0 * noise(seed ^ 0x9e37, timestamp_ms);

        CandlePoint::new(timestamp_ms, open, high, low, close, Some(volume))
    }
}

#[async_trait]
impl KlineFetcher for SyntheticKlineFetcher {
    async fn fetch_klines(&self, request: &KlineRequest) -> Result<Vec<CandlePoint>, HistoryError> {
        let bucket_ms = request.interval.to_ms();
        let latest = self.anchor_ms - self.anchor_ms.rem_euclid(bucket_ms);
        let earliest = latest - bucket_ms * (self.depth as i64 - 1);

        let end = request
            .end_time_ms
            .map(|end| end.min(latest))
            .unwrap_or(latest);
        let last_bucket = end - end.rem_euclid(bucket_ms);
        if last_bucket < earliest {
            return Ok(Vec::new());
        }

        let available = ((last_bucket - earliest) / bucket_ms + 1) as usize;
        let count = available.min(request.limit);
        let first = last_bucket - bucket_ms * (count as i64 - 1);

        Ok((0..count as i64)
            .map(|i| Self::candle_at(&request.symbol, bucket_ms, first + i * bucket_ms))
            .collect())
    }

    fn signature(&self) -> &'static str {
        "Synthetic demo"
    }
}

fn symbol_seed(symbol: &str) -> u64 {
    // FNV-1a
    symbol.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Deterministic value in [0, 1).
fn noise(seed: u64, timestamp_ms: i64) -> f64 {
    let mut x = seed ^ (timestamp_ms as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    (x >> 11) as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;
    use crate::utils::TimeUtils;
    use futures::executor::block_on;

    fn request(limit: usize, end_time_ms: Option<i64>) -> KlineRequest {
        KlineRequest {
            symbol: "BTCUSDT".to_string(),
            interval: Interval::H1,
            limit,
            end_time_ms,
        }
    }

    #[test]
    fn pages_are_ascending_and_bounded_by_end_time() {
        let fetcher = SyntheticKlineFetcher::new(10 * TimeUtils::MS_IN_D, 100);
        let page = block_on(fetcher.fetch_klines(&request(30, None))).unwrap();
        assert_eq!(page.len(), 30);
        assert!(page.windows(2).all(|w| w[1].timestamp_ms - w[0].timestamp_ms == TimeUtils::MS_IN_H));

        let older = block_on(fetcher.fetch_klines(&request(30, Some(page[0].timestamp_ms - 1)))).unwrap();
        assert_eq!(older.last().unwrap().timestamp_ms, page[0].timestamp_ms - TimeUtils::MS_IN_H);
    }

    #[test]
    fn history_runs_dry_at_depth() {
        let fetcher = SyntheticKlineFetcher::new(10 * TimeUtils::MS_IN_D, 40);
        let page = block_on(fetcher.fetch_klines(&request(30, None))).unwrap();
        let rest = block_on(fetcher.fetch_klines(&request(30, Some(page[0].timestamp_ms - 1)))).unwrap();
        assert_eq!(rest.len(), 10);
        let none = block_on(fetcher.fetch_klines(&request(30, Some(rest[0].timestamp_ms - 1)))).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn candles_are_deterministic_and_well_formed() {
        let a = SyntheticKlineFetcher::candle_at("ETHUSDT", TimeUtils::MS_IN_H, 1_700_000_000_000);
        let b = SyntheticKlineFetcher::candle_at("ETHUSDT", TimeUtils::MS_IN_H, 1_700_000_000_000);
        assert_eq!(a, b);
        assert!(a.high >= a.open.max(a.close));
        assert!(a.low <= a.open.min(a.close));
    }
}
