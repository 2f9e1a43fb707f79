//! Paged, backwards-walking access to historical klines for one symbol/interval.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;
#[cfg(debug_assertions)]
use crate::utils::time_utils::epoch_ms_to_utc;
use crate::config::BINANCE;
use crate::domain::{CandlePoint, Interval};

/// One page request. `end_time_ms == None` means "up to now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineRequest {
    pub symbol: String,
    pub interval: Interval,
    pub limit: usize,
    pub end_time_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryError {
    Network(String),
    /// HTTP 429 / 418. Transient like the others; nothing backs off or retries.
    RateLimited,
    Upstream { status: u16, message: String },
    InvalidResponse(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HistoryError::Network(msg) => write!(f, "Network error: {}", msg),
            HistoryError::RateLimited => write!(f, "Rate limited by exchange"),
            HistoryError::Upstream { status, message } => {
                write!(f, "Upstream error {}: {}", status, message)
            }
            HistoryError::InvalidResponse(msg) => write!(f, "Invalid klines response: {}", msg),
        }
    }
}

impl Error for HistoryError {}

/// Anything that can answer a klines page request.
#[async_trait]
pub trait KlineFetcher: Send + Sync {
    async fn fetch_klines(&self, request: &KlineRequest) -> Result<Vec<CandlePoint>, HistoryError>;

    /// A short name for log lines (so afterwards we know which one we used).
    fn signature(&self) -> &'static str;
}

/// Walks history backwards one page at a time.
///
/// The cursor holds the open time of the oldest point handed out so far; the next
/// page ends just before it. Changing symbol or interval starts again from "now".
#[derive(Clone)]
pub struct HistorySource {
    symbol: String,
    interval: Interval,
    page_size: usize,
    cursor_ms: Option<i64>,
    fetcher: Arc<dyn KlineFetcher>,
}

impl fmt::Debug for HistorySource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HistorySource")
            .field("symbol", &self.symbol)
            .field("interval", &self.interval)
            .field("page_size", &self.page_size)
            .field("cursor_ms", &self.cursor_ms)
            .field("fetcher", &self.fetcher.signature())
            .finish()
    }
}

impl HistorySource {
    pub fn new(symbol: &str, interval: Interval, fetcher: Arc<dyn KlineFetcher>) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            interval,
            page_size: BINANCE.limits.default_page_size,
            cursor_ms: None,
            fetcher,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = clamp_limit(page_size);
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cursor_ms(&self) -> Option<i64> {
        self.cursor_ms
    }

    pub fn set_interval(&mut self, interval: Interval) {
        self.interval = interval;
        self.cursor_ms = None;
    }

    pub fn set_symbol(&mut self, symbol: &str) {
        self.symbol = symbol.trim().to_uppercase();
        self.cursor_ms = None;
    }

    pub fn reset_cursor(&mut self) {
        self.cursor_ms = None;
    }

    /// Puts the cursor back on the oldest point still buffered, after a page was thrown away.
    pub fn restore_cursor(&mut self, oldest_ms: Option<i64>) {
        self.cursor_ms = oldest_ms;
    }

    /// Fetches the next page older than everything returned so far.
    ///
    /// The returned points are ascending and strictly older than the previous cursor.
    /// An empty page leaves the cursor where it was. Errors are returned as-is (no retry).
    pub async fn fetch_older(&mut self, limit: usize) -> Result<Vec<CandlePoint>, HistoryError> {
        let request = KlineRequest {
            symbol: self.symbol.clone(),
            interval: self.interval,
            limit: clamp_limit(limit),
            end_time_ms: self.cursor_ms.map(|cursor| cursor - 1),
        };

        let mut batch = self.fetcher.fetch_klines(&request).await?;

        if let Some(cursor) = self.cursor_ms {
            batch.retain(|p| p.timestamp_ms < cursor);
        }
        batch.sort_by_key(|p| p.timestamp_ms);
        batch.dedup_by_key(|p| p.timestamp_ms);

        if let Some(oldest) = batch.first() {
            self.cursor_ms = Some(oldest.timestamp_ms);
        }

        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_history_fetches {
            log::info!(
                "{} {} via {}: {} points (end {}), cursor now {}",
                self.symbol,
                self.interval,
                self.fetcher.signature(),
                batch.len(),
                request.end_time_ms.map(epoch_ms_to_utc).unwrap_or_else(|| "latest".into()),
                self.cursor_ms.map(epoch_ms_to_utc).unwrap_or_default()
            );
        }

        Ok(batch)
    }

    /// One page at the configured page size.
    pub async fn fetch_page(&mut self) -> Result<Vec<CandlePoint>, HistoryError> {
        let limit = self.page_size;
        self.fetch_older(limit).await
    }
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(
        BINANCE.limits.klines_limit_min as usize,
        BINANCE.limits.klines_limit_max as usize,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_fetchers::ScriptedFetcher;
    use futures::executor::block_on;

    #[test]
    fn symbol_is_uppercased() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 10));
        let source = HistorySource::new(" btcusdt ", Interval::M1, fetcher);
        assert_eq!(source.symbol(), "BTCUSDT");
        assert_eq!(source.page_size(), 250);
    }

    #[test]
    fn cursor_tracks_the_oldest_point() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 100));
        let mut source = HistorySource::new("BTCUSDT", Interval::M1, fetcher.clone());

        let first = block_on(source.fetch_older(30)).unwrap();
        assert_eq!(first.len(), 30);
        assert_eq!(source.cursor_ms(), Some(first[0].timestamp_ms));
        assert!(first.windows(2).all(|w| w[0].timestamp_ms < w[1].timestamp_ms));

        let second = block_on(source.fetch_older(30)).unwrap();
        assert_eq!(second.len(), 30);
        assert!(second.last().unwrap().timestamp_ms < first[0].timestamp_ms);

        let requests = fetcher.requests();
        assert_eq!(requests[0].end_time_ms, None);
        assert_eq!(requests[1].end_time_ms, Some(first[0].timestamp_ms - 1));
    }

    #[test]
    fn empty_page_leaves_cursor_alone() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 5));
        let mut source = HistorySource::new("BTCUSDT", Interval::M1, fetcher);

        let all = block_on(source.fetch_older(50)).unwrap();
        assert_eq!(all.len(), 5);
        let cursor = source.cursor_ms();

        let nothing = block_on(source.fetch_older(50)).unwrap();
        assert!(nothing.is_empty());
        assert_eq!(source.cursor_ms(), cursor);
    }

    #[test]
    fn limit_is_clamped() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 5));
        let mut source = HistorySource::new("BTCUSDT", Interval::M1, fetcher.clone());
        block_on(source.fetch_older(0)).unwrap();
        source.reset_cursor();
        block_on(source.fetch_older(5000)).unwrap();

        let limits: Vec<usize> = fetcher.requests().iter().map(|r| r.limit).collect();
        assert_eq!(limits, vec![1, 1000]);
    }

    #[test]
    fn changing_interval_or_symbol_restarts_from_now() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 100));
        let mut source = HistorySource::new("BTCUSDT", Interval::M1, fetcher.clone());
        block_on(source.fetch_older(10)).unwrap();
        assert!(source.cursor_ms().is_some());

        source.set_interval(Interval::H1);
        assert_eq!(source.cursor_ms(), None);
        block_on(source.fetch_older(10)).unwrap();

        source.set_symbol("ethusdt");
        assert_eq!(source.cursor_ms(), None);
        assert_eq!(source.symbol(), "ETHUSDT");

        let requests = fetcher.requests();
        assert_eq!(requests[1].end_time_ms, None);
        assert_eq!(requests[1].interval, Interval::H1);
    }

    #[test]
    fn overlapping_upstream_points_are_dropped() {
        // Upstream ignores end_time and keeps returning the same newest page.
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 20).ignoring_end_time());
        let mut source = HistorySource::new("BTCUSDT", Interval::M1, fetcher);

        let first = block_on(source.fetch_older(10)).unwrap();
        assert_eq!(first.len(), 10);
        let second = block_on(source.fetch_older(10)).unwrap();
        assert!(second.is_empty());
        assert_eq!(source.cursor_ms(), Some(first[0].timestamp_ms));
    }

    #[test]
    fn errors_pass_through_without_moving_the_cursor() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 100));
        let mut source = HistorySource::new("BTCUSDT", Interval::M1, fetcher.clone());
        block_on(source.fetch_older(10)).unwrap();
        let cursor = source.cursor_ms();

        fetcher.fail_next(HistoryError::RateLimited);
        let err = block_on(source.fetch_older(10)).unwrap_err();
        assert_eq!(err, HistoryError::RateLimited);
        assert_eq!(source.cursor_ms(), cursor);
        assert_eq!(fetcher.requests().len(), 2);
    }
}
