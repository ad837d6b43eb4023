//! Per-adapter service status and the shared bookkeeping helper.

use crate::classifier::{ProviderFailure, TransportFault};
use crate::error_kind::ErrorKind;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::warn;

/// Consecutive failures after which an adapter reports itself unavailable.
pub const UNAVAILABLE_AFTER_FAILURES: u32 = 5;
const LATENCY_SAMPLE_WEIGHT: f64 = 0.3;

/// Point-in-time status of one adapter, owned by that adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub available: bool,
    pub last_error: Option<String>,
    pub last_error_at: Option<SystemTime>,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Derived; `None` before the first request.
    pub success_rate: Option<f64>,
    pub average_latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_requests: Option<usize>,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            available: true,
            last_error: None,
            last_error_at: None,
            consecutive_failures: 0,
            total_requests: 0,
            successful_requests: 0,
            success_rate: None,
            average_latency_ms: None,
            queue_length: None,
            active_requests: None,
        }
    }
}

impl ServiceStatus {
    /// Time since the last recorded error, if any.
    pub fn last_error_age(&self) -> Option<Duration> {
        self.last_error_at
            .map(|at| at.elapsed().unwrap_or(Duration::ZERO))
    }
}

/// Status bookkeeping an adapter embeds instead of inheriting it.
///
/// All updates are single lock acquisitions, so overlapping calls on the same
/// adapter never interleave a read-modify-write.
#[derive(Debug, Default)]
pub struct StatusTracker {
    state: Mutex<ServiceStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServiceStatus> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_success(&self, latency_ms: Option<u64>) {
        let mut st = self.lock();
        st.total_requests += 1;
        st.successful_requests += 1;
        st.consecutive_failures = 0;
        st.available = true;
        st.last_error = None;
        st.last_error_at = None;
        if let Some(sample) = latency_ms.filter(|l| *l > 0) {
            let sample = sample as f64;
            st.average_latency_ms = Some(match st.average_latency_ms {
                Some(avg) if avg > 0.0 => {
                    avg * (1.0 - LATENCY_SAMPLE_WEIGHT) + sample * LATENCY_SAMPLE_WEIGHT
                }
                _ => sample,
            });
        }
    }

    /// Records a failed call; returns `true` if this failure flipped the
    /// adapter to unavailable.
    pub fn record_failure(&self, message: &str) -> bool {
        let mut st = self.lock();
        st.total_requests += 1;
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
        st.last_error = Some(message.to_string());
        st.last_error_at = Some(SystemTime::now());
        if st.available && st.consecutive_failures >= UNAVAILABLE_AFTER_FAILURES {
            st.available = false;
            return true;
        }
        false
    }

    /// Counts a call turned away while unavailable. The failure streak and
    /// last error are left as they were; the last error is returned.
    pub fn record_rejected(&self) -> Option<String> {
        let mut st = self.lock();
        st.total_requests += 1;
        st.last_error.clone()
    }

    /// Probe failure: marks unavailable without counting a request.
    pub fn mark_unavailable(&self, message: &str) {
        let mut st = self.lock();
        st.available = false;
        st.last_error = Some(message.to_string());
        st.last_error_at = Some(SystemTime::now());
    }

    /// Probe success.
    pub fn mark_available(&self) {
        let mut st = self.lock();
        st.available = true;
        st.consecutive_failures = 0;
    }

    pub fn is_available(&self) -> bool {
        self.lock().available
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> ServiceStatus {
        let mut st = self.lock().clone();
        if st.total_requests > 0 {
            st.success_rate = Some(st.successful_requests as f64 / st.total_requests as f64);
        }
        st
    }

    /// Operator action: back to the initial state.
    pub fn reset(&self) {
        *self.lock() = ServiceStatus::default();
    }

    /// Adapter-side identification of a failed call.
    ///
    /// Transport faults without a response come first, then the HTTP status,
    /// then model-related message text.
    pub fn identify_error(failure: &ProviderFailure) -> ErrorKind {
        let message = failure.message.to_lowercase();

        match (failure.status, failure.transport) {
            (None, Some(TransportFault::TimedOut)) => return ErrorKind::Timeout,
            (None, Some(TransportFault::Refused | TransportFault::Reset | TransportFault::HostNotFound)) => {
                return ErrorKind::NetworkError
            }
            (None, Some(TransportFault::Other)) => {
                return if message.contains("timeout") || message.contains("timed out") {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::ConnectionError
                };
            }
            (Some(status), _) => {
                let kind = match status {
                    500..=599 => Some(ErrorKind::ServerError),
                    404 => Some(ErrorKind::ModelNotFound),
                    401 | 403 => Some(ErrorKind::AuthenticationError),
                    429 => Some(ErrorKind::RateLimit),
                    400..=499 => Some(ErrorKind::InvalidRequest),
                    _ => None,
                };
                if let Some(kind) = kind {
                    return kind;
                }
            }
            (None, None) => {}
        }

        if message.contains("model")
            && (message.contains("not found") || message.contains("not available"))
        {
            ErrorKind::ModelNotFound
        } else if message.contains("memory") || message.contains("resources") {
            ErrorKind::ModelUnavailable
        } else if message.contains("timeout") || message.contains("timed out") {
            ErrorKind::Timeout
        } else {
            ErrorKind::Unknown
        }
    }
}

/// Logs the availability flip reported by [`StatusTracker::record_failure`].
pub(crate) fn warn_unavailable(provider: &str, consecutive_failures: u32) {
    warn!(
        provider,
        consecutive_failures, "service marked unavailable after consecutive failures"
    );
}
