//! 弹性模块：按提供方限流的令牌桶。
//!
//! # Rate Limiting
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | token bucket with non-blocking `consume` and async `acquire` |
//!
//! When a provider has `requests_per_second` configured, the gateway waits
//! on its bucket before every dispatch to that provider.
//!
//! ```rust
//! use ai_gateway::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//!
//! let limiter = RateLimiter::new(
//!     RateLimiterConfig::new().with_capacity(20).with_refill_rate(5.0),
//! );
//! assert_eq!(limiter.config().capacity, 20.0);
//! ```

pub mod rate_limiter;

pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimiterSnapshot};
