use crate::error_kind::ErrorKind;
use crate::routing::SelectionStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-submission knobs for [`Gateway::process`](super::Gateway::process).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessOptions {
    pub strategy: SelectionStrategy,
    /// Skip selection and start with this provider.
    pub provider: Option<String>,
    /// Serve from and write to the response cache.
    pub cache_results: bool,
    /// Retries already spent on this submission by the caller.
    pub retry_count: u32,
    /// Bound for each individual adapter call.
    pub timeout: Option<Duration>,
    /// Return a failure of this kind without contacting any provider.
    pub simulate_error: Option<ErrorKind>,
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_cache(mut self, cache_results: bool) -> Self {
        self.cache_results = cache_results;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn simulate_error(mut self, kind: ErrorKind) -> Self {
        self.simulate_error = Some(kind);
        self
    }

    /// Options that change which response is correct; part of the cache key.
    pub(crate) fn fingerprint(&self) -> Vec<(&'static str, String)> {
        let mut parts = vec![("strategy", self.strategy.as_str().to_string())];
        if let Some(ref provider) = self.provider {
            parts.push(("provider", provider.clone()));
        }
        parts
    }
}
