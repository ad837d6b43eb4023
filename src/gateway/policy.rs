use crate::config::RetrySettings;
use crate::error_kind::ErrorKind;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Same provider again after `delay`.
    Retry { delay: Duration },
    /// Next-best provider.
    Fallback,
    Fail,
}

/// Retry/fallback decisions for the gateway's provider chain.
///
/// Kept synchronous and free of I/O so every branch is unit-testable.
#[derive(Debug, Clone)]
pub(crate) struct PolicyEngine {
    pub max_retries: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl PolicyEngine {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            min_delay_ms: settings.delay_ms,
            max_delay_ms: settings.max_delay_ms.max(settings.delay_ms),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.min_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// `attempt` counts retries already spent on the current provider
    /// (first failure => 0). Severe kinds skip the retry budget entirely.
    pub fn decide(&self, kind: ErrorKind, attempt: u32, has_fallback: bool) -> Decision {
        if kind.retryable() && !kind.severe() && attempt < self.max_retries {
            return Decision::Retry {
                delay: self.backoff_delay(attempt),
            };
        }
        if has_fallback {
            Decision::Fallback
        } else {
            Decision::Fail
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(max_retries: u32, delay_ms: u64, max_delay_ms: u64) -> PolicyEngine {
        PolicyEngine::new(&RetrySettings {
            max_retries,
            delay_ms,
            max_delay_ms,
        })
    }

    #[test]
    fn test_retryable_until_budget_spent() {
        let p = engine(2, 500, 500);
        assert_eq!(
            p.decide(ErrorKind::Timeout, 0, true),
            Decision::Retry { delay: Duration::from_millis(500) }
        );
        assert!(matches!(p.decide(ErrorKind::Timeout, 1, true), Decision::Retry { .. }));
        assert_eq!(p.decide(ErrorKind::Timeout, 2, true), Decision::Fallback);
        assert_eq!(p.decide(ErrorKind::Timeout, 2, false), Decision::Fail);
    }

    #[test]
    fn test_severe_and_plain_kinds_fall_back_immediately() {
        let p = engine(3, 500, 500);
        assert_eq!(p.decide(ErrorKind::AuthenticationError, 0, true), Decision::Fallback);
        assert_eq!(p.decide(ErrorKind::InvalidRequest, 0, true), Decision::Fallback);
        assert_eq!(p.decide(ErrorKind::ContentFilter, 0, false), Decision::Fail);
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let p = engine(5, 100, 350);
        let delays: Vec<Duration> = (0..4)
            .map(|a| match p.decide(ErrorKind::ServerError, a, false) {
                Decision::Retry { delay } => delay,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        let ms: Vec<u128> = delays.iter().map(Duration::as_millis).collect();
        assert_eq!(ms, vec![100, 200, 350, 350]);
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let p = engine(0, 500, 500);
        assert_eq!(p.decide(ErrorKind::NetworkError, 0, true), Decision::Fallback);
    }
}
