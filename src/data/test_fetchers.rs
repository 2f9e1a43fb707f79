//! Deterministic fetchers for unit tests. Nothing here touches the network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::data::history_source::{HistoryError, KlineFetcher, KlineRequest};
use crate::domain::CandlePoint;

/// Serves pages out of a fixed ascending history and records every request.
pub struct ScriptedFetcher {
    history: Vec<CandlePoint>,
    honour_end_time: bool,
    failures: Mutex<VecDeque<HistoryError>>,
    requests: Mutex<Vec<KlineRequest>>,
}

impl ScriptedFetcher {
    /// `count` candles starting at `start_ms`, `step_ms` apart, closes climbing by one.
    pub fn ascending(start_ms: i64, step_ms: i64, count: usize) -> Self {
        let history = (0..count)
            .map(|i| {
                let base = 100.0 + i as f64;
                CandlePoint::new(
                    start_ms + i as i64 * step_ms,
                    base,
                    base + 2.0,
                    base - 2.0,
                    base + 1.0,
                    Some(10.0 + i as f64),
                )
            })
            .collect();
        Self::from_points(history)
    }

    pub fn from_points(mut history: Vec<CandlePoint>) -> Self {
        history.sort_by_key(|p| p.timestamp_ms);
        Self {
            history,
            honour_end_time: true,
            failures: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Mimics a broken upstream that always answers with the newest page.
    pub fn ignoring_end_time(mut self) -> Self {
        self.honour_end_time = false;
        self
    }

    pub fn fail_next(&self, error: HistoryError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn requests(&self) -> Vec<KlineRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn history(&self) -> &[CandlePoint] {
        &self.history
    }
}

#[async_trait]
impl KlineFetcher for ScriptedFetcher {
    async fn fetch_klines(&self, request: &KlineRequest) -> Result<Vec<CandlePoint>, HistoryError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let end = match (self.honour_end_time, request.end_time_ms) {
            (true, Some(end)) => end,
            _ => i64::MAX,
        };
        let eligible: Vec<CandlePoint> = self
            .history
            .iter()
            .filter(|p| p.timestamp_ms <= end)
            .copied()
            .collect();
        let skip = eligible.len().saturating_sub(request.limit);
        Ok(eligible[skip..].to_vec())
    }

    fn signature(&self) -> &'static str {
        "Scripted"
    }
}
