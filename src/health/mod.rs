//! 健康监控模块：按提供方维护滚动窗口的可靠性与延迟画像。
//!
//! # Provider Health Monitor
//!
//! The monitor is the single owner of every [`ProviderHealth`] record. Callers
//! only ever *record an outcome* or *take a snapshot*; each composite update
//! (rescale, increment, blend) happens under one lock acquisition so
//! concurrent requests never observe a half-applied sample.
//!
//! ## Window rules
//!
//! - Counters are bounded by a window of [`WINDOW_SIZE`] samples. When the
//!   next sample would overflow it, both counters are rescaled by
//!   `WINDOW_SIZE / total` (floored), which keeps their ratio.
//! - Rates are recomputed only once the window holds [`MIN_REQUESTS`] samples.
//! - Latency is blended on success only: `old * 0.7 + sample * 0.3`.
//! - A provider is unavailable while `recent_requests >= 5 && error_rate > 0.8`.
//!
//! ```rust
//! use ai_gateway::HealthMonitor;
//!
//! let monitor = HealthMonitor::new();
//! for _ in 0..5 {
//!     monitor.update("ollama", false, None, None);
//! }
//! assert!(!monitor.health("ollama").unwrap().available);
//! monitor.update("ollama", true, Some(120), None);
//! ```

use crate::error_kind::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tracing::{debug, info, warn};

pub const WINDOW_SIZE: u32 = 100;
pub const MIN_REQUESTS: u32 = 5;
pub const UNAVAILABLE_ERROR_RATE: f64 = 0.8;
const LATENCY_SAMPLE_WEIGHT: f64 = 0.3;

/// Cross-provider health record for one provider name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub name: String,
    pub available: bool,
    pub success_rate: f64,
    pub error_rate: f64,
    /// Blended latency in milliseconds; 0 until the first timed success.
    pub average_latency_ms: f64,
    pub recent_requests: u32,
    pub recent_errors: u32,
    pub last_used: Option<SystemTime>,
    pub last_error: Option<SystemTime>,
}

impl ProviderHealth {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            success_rate: 1.0,
            error_rate: 0.0,
            average_latency_ms: 0.0,
            recent_requests: 0,
            recent_errors: 0,
            last_used: None,
            last_error: None,
        }
    }

    /// Applies one outcome in place.
    pub fn apply(&mut self, success: bool, latency_ms: Option<u64>, now: SystemTime) {
        let total = self.recent_requests + 1;
        let errors = self.recent_errors + u32::from(!success);

        if total > WINDOW_SIZE {
            let scale = WINDOW_SIZE as f64 / total as f64;
            self.recent_requests = (total as f64 * scale).floor() as u32;
            self.recent_errors = (errors as f64 * scale).floor() as u32;
        } else {
            self.recent_requests = total;
            self.recent_errors = errors;
        }

        if self.recent_requests >= MIN_REQUESTS {
            let requests = self.recent_requests as f64;
            self.error_rate = self.recent_errors as f64 / requests;
            self.success_rate = (requests - self.recent_errors as f64) / requests;
        }

        if success {
            if let Some(sample) = latency_ms.filter(|l| *l > 0) {
                let sample = sample as f64;
                self.average_latency_ms = if self.average_latency_ms == 0.0 {
                    sample
                } else {
                    self.average_latency_ms * (1.0 - LATENCY_SAMPLE_WEIGHT)
                        + sample * LATENCY_SAMPLE_WEIGHT
                };
            }
            self.last_used = Some(now);
        } else {
            self.last_error = Some(now);
        }

        self.available =
            !(self.recent_requests >= MIN_REQUESTS && self.error_rate > UNAVAILABLE_ERROR_RATE);
    }
}

/// Owner of all [`ProviderHealth`] records.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    records: Mutex<BTreeMap<String, ProviderHealth>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ProviderHealth>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the all-healthy record for `name` if it does not exist yet.
    pub fn initialize(&self, name: &str) {
        let mut records = self.lock();
        if !records.contains_key(name) {
            records.insert(name.to_string(), ProviderHealth::new(name));
            debug!(provider = %name, "health record initialized");
        }
    }

    /// Records one outcome and returns the updated snapshot.
    pub fn update(
        &self,
        name: &str,
        success: bool,
        latency_ms: Option<u64>,
        error_kind: Option<ErrorKind>,
    ) -> ProviderHealth {
        let mut records = self.lock();
        let health = records
            .entry(name.to_string())
            .or_insert_with(|| ProviderHealth::new(name));
        let was_available = health.available;
        health.apply(success, latency_ms, SystemTime::now());

        if let Some(kind) = error_kind.filter(|_| !success) {
            warn!(provider = %name, error_kind = kind.as_str(), "provider call failed");
        }
        if was_available && !health.available {
            warn!(
                provider = %name,
                error_rate = health.error_rate,
                "provider marked unavailable due to high error rate"
            );
        } else if !was_available && health.available {
            info!(provider = %name, "provider available again");
        }
        health.clone()
    }

    pub fn health(&self, name: &str) -> Option<ProviderHealth> {
        self.lock().get(name).cloned()
    }

    /// Snapshot of every tracked provider, ordered by name.
    pub fn all(&self) -> Vec<ProviderHealth> {
        self.lock().values().cloned().collect()
    }

    /// Resets every tracked provider to the initial all-healthy state.
    pub fn reset(&self) {
        let mut records = self.lock();
        for (name, health) in records.iter_mut() {
            *health = ProviderHealth::new(name.clone());
        }
        info!(providers = records.len(), "health records reset");
    }

    /// Snapshot sorted by descending `score`; equal scores keep name order.
    pub fn rank_by_score<F>(&self, score: F) -> Vec<ProviderHealth>
    where
        F: Fn(&ProviderHealth) -> f64,
    {
        sort_by_score(self.all(), score)
    }

    /// Ranks the given candidates; names without a record rank as fresh
    /// all-healthy providers. Equal scores keep the order of `names`.
    pub fn rank<F>(&self, names: &[String], score: F) -> Vec<ProviderHealth>
    where
        F: Fn(&ProviderHealth) -> f64,
    {
        let snapshots = {
            let records = self.lock();
            names
                .iter()
                .map(|n| {
                    records
                        .get(n)
                        .cloned()
                        .unwrap_or_else(|| ProviderHealth::new(n.clone()))
                })
                .collect()
        };
        sort_by_score(snapshots, score)
    }
}

fn sort_by_score<F>(snapshots: Vec<ProviderHealth>, score: F) -> Vec<ProviderHealth>
where
    F: Fn(&ProviderHealth) -> f64,
{
    let mut scored: Vec<(f64, ProviderHealth)> =
        snapshots.into_iter().map(|h| (score(&h), h)).collect();
    // stable: ties keep input order
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, h)| h).collect()
}
