use crate::{Error, ErrorContext, Result};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterSnapshot {
    pub capacity: f64,
    pub refill_per_sec: f64,
    pub tokens: f64,
    /// Estimated wait until one token is available (ms), if currently empty.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Bucket size; also the initial fill.
    pub capacity: f64,
    /// Tokens added per second.
    pub refill_per_sec: f64,
}

impl RateLimiterConfig {
    pub fn new() -> Self {
        Self {
            capacity: 10.0,
            refill_per_sec: 10.0,
        }
    }

    /// One second worth of burst, at least one token. `None` for negative
    /// or non-finite rates.
    pub fn from_rps(rps: f64) -> Option<Self> {
        if !rps.is_finite() || rps < 0.0 {
            return None;
        }
        Some(Self {
            capacity: rps.max(1.0),
            refill_per_sec: rps,
        })
    }

    pub fn with_capacity(mut self, tokens: u32) -> Self {
        self.capacity = tokens as f64;
        self
    }

    pub fn with_refill_rate(mut self, rate: f64) -> Self {
        self.refill_per_sec = rate;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct State {
    tokens: f64,
    last: Instant,
}

/// Token bucket. A zero refill rate disables limiting.
#[derive(Debug)]
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        let state = Mutex::new(State {
            tokens: cfg.capacity,
            last: Instant::now(),
        });
        Self { cfg, state }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn unlimited(&self) -> bool {
        self.cfg.refill_per_sec <= 0.0
    }

    fn refill_locked(cfg: &RateLimiterConfig, st: &mut State) {
        let now = Instant::now();
        let elapsed = now.duration_since(st.last).as_secs_f64();
        if elapsed > 0.0 {
            st.tokens = (st.tokens + elapsed * cfg.refill_per_sec).min(cfg.capacity);
            st.last = now;
        }
    }

    fn wait_for(&self, st: &State, wanted: f64) -> Duration {
        let missing = (wanted - st.tokens).max(0.0);
        Duration::from_secs_f64(missing / self.cfg.refill_per_sec)
    }

    /// Takes `tokens` if available; never waits.
    pub async fn consume(&self, tokens: u32) -> bool {
        if self.unlimited() {
            return true;
        }
        let mut st = self.state.lock().await;
        Self::refill_locked(&self.cfg, &mut st);
        let wanted = tokens as f64;
        if st.tokens >= wanted {
            st.tokens -= wanted;
            true
        } else {
            false
        }
    }

    pub async fn try_acquire(&self) -> bool {
        self.consume(1).await
    }

    /// Waits for one token.
    pub async fn acquire(&self) -> Result<()> {
        self.acquire_many(1).await
    }

    /// Waits for `tokens`. Asking for more than the bucket can hold is an error.
    pub async fn acquire_many(&self, tokens: u32) -> Result<()> {
        if self.unlimited() {
            return Ok(());
        }
        let wanted = tokens as f64;
        if wanted > self.cfg.capacity {
            return Err(Error::validation_with_context(
                format!("requested {} tokens from a bucket of {}", tokens, self.cfg.capacity),
                ErrorContext::new().with_field_path("rate_limit.capacity"),
            ));
        }
        loop {
            let wait = {
                let mut st = self.state.lock().await;
                Self::refill_locked(&self.cfg, &mut st);
                if st.tokens >= wanted {
                    st.tokens -= wanted;
                    return Ok(());
                }
                self.wait_for(&st, wanted)
            };
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    pub async fn token_count(&self) -> f64 {
        let mut st = self.state.lock().await;
        Self::refill_locked(&self.cfg, &mut st);
        st.tokens
    }

    /// Refills the bucket to capacity.
    pub async fn reset(&self) {
        let mut st = self.state.lock().await;
        st.tokens = self.cfg.capacity;
        st.last = Instant::now();
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let mut st = self.state.lock().await;
        Self::refill_locked(&self.cfg, &mut st);
        let estimated_wait_ms = if !self.unlimited() && st.tokens < 1.0 {
            Some(self.wait_for(&st, 1.0).as_millis() as u64)
        } else {
            None
        };
        RateLimiterSnapshot {
            capacity: self.cfg.capacity,
            refill_per_sec: self.cfg.refill_per_sec,
            tokens: st.tokens,
            estimated_wait_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_rps() {
        let config = RateLimiterConfig::from_rps(0.5).unwrap();
        assert_eq!(config.refill_per_sec, 0.5);
        assert_eq!(config.capacity, 1.0);
        assert!(RateLimiterConfig::from_rps(-1.0).is_none());
        assert!(RateLimiterConfig::from_rps(f64::NAN).is_none());
    }

    #[tokio::test]
    async fn test_consume_until_empty() {
        let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(3).with_refill_rate(1.0));
        assert!(limiter.consume(2).await);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
        assert!(limiter.snapshot().await.estimated_wait_ms.is_some());

        limiter.reset().await;
        assert!(limiter.token_count().await >= 3.0);
    }

    #[tokio::test]
    async fn test_refill_over_time() {
        let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(5).with_refill_rate(100.0));
        assert!(limiter.consume(5).await);
        assert!(!limiter.try_acquire().await);
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(limiter.try_acquire().await);
        assert!(limiter.token_count().await <= 5.0);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_token() {
        let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(1).with_refill_rate(50.0));
        limiter.acquire().await.unwrap();
        let started = Instant::now();
        limiter.acquire().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_oversized_request_and_zero_rate() {
        let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(2));
        assert!(limiter.acquire_many(3).await.is_err());

        let open = RateLimiter::new(RateLimiterConfig::from_rps(0.0).unwrap());
        for _ in 0..100 {
            assert!(open.acquire().await.is_ok());
        }
    }
}
