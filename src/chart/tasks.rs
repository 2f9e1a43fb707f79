//! Running history fetches off the UI thread and collecting their results.

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use poll_promise::Promise;
use tokio::runtime::Handle;

use crate::data::{HistoryError, HistorySource};
use crate::domain::CandlePoint;

/// How spawned work is driven.
#[derive(Clone, Debug)]
pub enum TaskRunner {
    /// On the app's tokio runtime, from a helper thread; the UI polls the promise.
    Runtime(Handle),
    /// To completion on the calling thread. Promises come back already resolved.
    Inline,
}

impl TaskRunner {
    pub fn spawn<T, F>(&self, name: &str, future: F) -> Promise<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        match self {
            TaskRunner::Runtime(handle) => {
                let handle = handle.clone();
                Promise::spawn_thread(name, move || handle.block_on(future))
            }
            TaskRunner::Inline => Promise::from_ready(futures::executor::block_on(future)),
        }
    }
}

/// A page fetched for one series, with the borrowed source handed back.
#[derive(Debug)]
pub struct SourceBatch {
    pub series_index: usize,
    pub source: HistorySource,
    pub result: Result<Vec<CandlePoint>, HistoryError>,
}

/// One page per source, all in flight together. Batches are listed in arrival order.
pub async fn fetch_one_page_each(jobs: Vec<(usize, HistorySource)>) -> Vec<SourceBatch> {
    let mut pending: FuturesUnordered<_> = jobs
        .into_iter()
        .map(|(series_index, source)| fetch_page(series_index, source))
        .collect();

    let mut batches = Vec::with_capacity(pending.len());
    while let Some(batch) = pending.next().await {
        batches.push(batch);
    }
    batches
}

/// One page per source, each fetch waiting for the previous one (a prefetch step).
pub async fn fetch_one_page_sequential(jobs: Vec<(usize, HistorySource)>) -> Vec<SourceBatch> {
    let mut batches = Vec::with_capacity(jobs.len());
    for (series_index, source) in jobs {
        batches.push(fetch_page(series_index, source).await);
    }
    batches
}

async fn fetch_page(series_index: usize, mut source: HistorySource) -> SourceBatch {
    let result = source.fetch_page().await;
    SourceBatch {
        series_index,
        source,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_fetchers::ScriptedFetcher;
    use crate::domain::Interval;
    use std::sync::Arc;

    #[test]
    fn inline_runner_resolves_immediately() {
        let promise = TaskRunner::Inline.spawn("answer", async { 42 });
        assert_eq!(promise.ready(), Some(&42));
    }

    #[test]
    fn every_source_gets_one_page_and_comes_back() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 1000));
        let jobs = vec![
            (0, HistorySource::new("BTCUSDT", Interval::M1, fetcher.clone()).with_page_size(10)),
            (2, HistorySource::new("ETHUSDT", Interval::M1, fetcher.clone()).with_page_size(20)),
        ];

        let batches = futures::executor::block_on(fetch_one_page_each(jobs));

        assert_eq!(batches.len(), 2);
        let mut indices: Vec<usize> = batches.iter().map(|b| b.series_index).collect();
        indices.sort();
        assert_eq!(indices, vec![0, 2]);
        for batch in &batches {
            let points = batch.result.as_ref().unwrap();
            assert_eq!(points.len(), batch.source.page_size());
            assert_eq!(batch.source.cursor_ms(), Some(points[0].timestamp_ms));
        }
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[test]
    fn sequential_step_keeps_job_order() {
        let fetcher = Arc::new(ScriptedFetcher::ascending(0, 60_000, 100));
        let jobs = vec![
            (1, HistorySource::new("ETHUSDT", Interval::M1, fetcher.clone()).with_page_size(5)),
            (0, HistorySource::new("BTCUSDT", Interval::M1, fetcher.clone()).with_page_size(5)),
        ];

        let batches = futures::executor::block_on(fetch_one_page_sequential(jobs));

        let order: Vec<usize> = batches.iter().map(|b| b.series_index).collect();
        assert_eq!(order, vec![1, 0]);
        let symbols: Vec<String> = fetcher.requests().into_iter().map(|r| r.symbol).collect();
        assert_eq!(symbols, vec!["ETHUSDT", "BTCUSDT"]);
    }
}
