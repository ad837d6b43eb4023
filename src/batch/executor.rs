//! Batch executor.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStrategy {
    /// One item at a time.
    #[default]
    Sequential,
    /// Every item at once.
    Parallel,
    /// At most `max_concurrency` items in flight.
    Concurrent { max_concurrency: usize },
}

impl BatchStrategy {
    fn width(&self, items: usize) -> usize {
        match *self {
            BatchStrategy::Sequential => 1,
            BatchStrategy::Parallel => items.max(1),
            BatchStrategy::Concurrent { max_concurrency } => max_concurrency.max(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchExecutorConfig {
    pub strategy: BatchStrategy,
}

impl BatchExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, s: BatchStrategy) -> Self {
        self.strategy = s;
        self
    }
}

/// Runs one async job per item. Output `i` always belongs to input `i`,
/// whatever the strategy and completion order.
#[derive(Debug, Clone, Default)]
pub struct BatchExecutor {
    config: BatchExecutorConfig,
}

impl BatchExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BatchExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchExecutorConfig {
        &self.config
    }

    pub async fn execute<T, R, F, Fut>(&self, items: Vec<T>, job: F) -> Vec<R>
    where
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = R>,
    {
        let start = Instant::now();
        let total = items.len();
        let width = self.config.strategy.width(total);

        let results: Vec<R> = stream::iter(items.into_iter().enumerate().map(|(i, item)| job(i, item)))
            .buffered(width)
            .collect()
            .await;

        debug!(
            items = total,
            width,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch finished"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_order_is_preserved_when_later_items_finish_first() {
        let exec = BatchExecutor::with_config(
            BatchExecutorConfig::new().with_strategy(BatchStrategy::Parallel),
        );
        let out = exec
            .execute(vec![30u64, 10, 20], |i, ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                (i, ms)
            })
            .await;
        assert_eq!(out, vec![(0, 30), (1, 10), (2, 20)]);
    }

    #[test]
    fn test_default_strategy_is_sequential() {
        assert_eq!(BatchStrategy::default(), BatchStrategy::Sequential);
        assert_eq!(BatchExecutorConfig::default().strategy, BatchStrategy::Sequential);
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let exec = BatchExecutor::with_config(
            BatchExecutorConfig::new().with_strategy(BatchStrategy::Concurrent { max_concurrency: 2 }),
        );
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let out = exec
            .execute((0..6).collect(), |_, n: u32| {
                let (current, peak) = (current.clone(), peak.clone());
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    n * 2
                }
            })
            .await;
        assert_eq!(out, vec![0, 2, 4, 6, 8, 10]);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let out: Vec<u8> = BatchExecutor::new().execute(Vec::<u8>::new(), |_, x| async move { x }).await;
        assert!(out.is_empty());
    }
}
