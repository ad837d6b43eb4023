//! 响应缓存模块：按请求指纹缓存成功的网关响应。
//!
//! # Response Caching
//!
//! Successful responses can be cached under a fingerprint of
//! (task type, normalized input, options). Entries expire after a TTL and
//! the memory backend evicts the least recently used entry once full.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | typed get/set with TTL defaults and statistics |
//! | [`CacheConfig`] | TTL, capacity and on/off switch |
//! | [`CacheBackend`] | trait for storage backends |
//! | [`MemoryCache`] | bounded LRU backend |
//! | [`NullCache`] | no-op backend used when caching is disabled |
//! | [`CacheKeyGenerator`] | sha256 fingerprints of submissions |
//!
//! ```rust
//! use ai_gateway::cache::{CacheConfig, CacheManager};
//! use std::time::Duration;
//!
//! let cache = CacheManager::from_config(
//!     CacheConfig::new().with_ttl(Duration::from_secs(600)).with_max_entries(500),
//! );
//! assert_eq!(cache.backend_name(), "memory");
//! ```

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use key::{CacheKey, CacheKeyGenerator};
pub use manager::{CacheConfig, CacheManager, CacheStats, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
