//! Cache manager.

use super::backend::{CacheBackend, MemoryCache, NullCache};
use super::key::CacheKey;
use crate::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub enabled: bool,
    pub max_entries: usize,
    /// Serialized values larger than this are not stored.
    pub max_entry_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            max_entry_size: 10 * 1024 * 1024,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn to_stats(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            entries,
        }
    }

    fn reset(&self) {
        for c in [&self.hits, &self.misses, &self.sets, &self.deletes, &self.errors] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

/// Typed front for a [`CacheBackend`]: JSON encoding, TTL defaults and
/// hit/miss accounting.
pub struct CacheManager {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    stats: AtomicStats,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: AtomicStats::default(),
        }
    }

    /// Memory backend sized from `config`, or a null backend when disabled.
    pub fn from_config(config: CacheConfig) -> Self {
        let backend: Box<dyn CacheBackend> = if config.enabled {
            Box::new(MemoryCache::new(config.max_entries))
        } else {
            Box::new(NullCache::new())
        };
        Self::new(config, backend)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        if !self.config.enabled {
            return Ok(None);
        }
        match self.backend.get(key).await {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(val) => {
                    AtomicStats::bump(&self.stats.hits);
                    debug!(key = %key, "cache hit");
                    Ok(Some(val))
                }
                Err(e) => {
                    AtomicStats::bump(&self.stats.errors);
                    warn!(key = %key, error = %e, "dropping undecodable cache entry");
                    if let Err(e) = self.backend.delete(key).await {
                        AtomicStats::bump(&self.stats.errors);
                        warn!(key = %key, error = %e, "failed to evict undecodable cache entry");
                    }
                    Ok(None)
                }
            },
            Ok(None) => {
                AtomicStats::bump(&self.stats.misses);
                Ok(None)
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                Err(e)
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.config.default_ttl).await
    }

    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let data = serde_json::to_vec(value)?;
        if data.len() > self.config.max_entry_size {
            debug!(key = %key, size = data.len(), "value too large to cache");
            return Ok(());
        }
        match self.backend.set(key, &data, ttl).await {
            Ok(()) => {
                AtomicStats::bump(&self.stats.sets);
                Ok(())
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                Err(e)
            }
        }
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        match self.backend.delete(key).await {
            Ok(deleted) => {
                if deleted {
                    AtomicStats::bump(&self.stats.deletes);
                }
                Ok(deleted)
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                Err(e)
            }
        }
    }

    /// Drops every entry and zeroes the counters.
    pub async fn clear(&self) -> Result<()> {
        self.backend.clear().await?;
        self.stats.reset();
        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.backend.len().await.unwrap_or(0);
        self.stats.to_stats(entries)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hit_and_miss_accounting() {
        let cache = CacheManager::from_config(CacheConfig::new().with_max_entries(4));
        let key = CacheKey::new("k");
        assert_eq!(cache.get::<String>(&key).await.unwrap(), None);
        cache.set(&key, &"value".to_string()).await.unwrap();
        assert_eq!(cache.get::<String>(&key).await.unwrap().as_deref(), Some("value"));

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.sets, stats.entries), (1, 1, 1, 1));
        assert!((stats.hit_ratio() - 0.5).abs() < 1e-9);

        cache.clear().await.unwrap();
        assert_eq!(cache.stats().await, CacheStats::default());
    }

    #[tokio::test]
    async fn test_disabled_cache_is_inert() {
        let cache = CacheManager::from_config(CacheConfig::new().with_enabled(false));
        let key = CacheKey::new("k");
        cache.set(&key, &1u32).await.unwrap();
        assert_eq!(cache.get::<u32>(&key).await.unwrap(), None);
        assert_eq!(cache.backend_name(), "null");
        assert_eq!(cache.stats().await.misses, 0);
    }

    #[tokio::test]
    async fn test_undecodable_entry_counts_as_error() {
        let cache = CacheManager::from_config(CacheConfig::new());
        let key = CacheKey::new("k");
        cache.set(&key, &"text").await.unwrap();
        assert_eq!(cache.get::<u32>(&key).await.unwrap(), None);
        assert_eq!(cache.stats().await.errors, 1);
        assert_eq!(cache.stats().await.entries, 0);
    }

    struct StuckBackend;

    #[async_trait::async_trait]
    impl CacheBackend for StuckBackend {
        async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>> {
            Ok(Some(b"not json".to_vec()))
        }
        async fn set(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _: &CacheKey) -> Result<bool> {
            Err(crate::Error::runtime_with_context(
                "store is read-only",
                crate::ErrorContext::new().with_source("stuck_backend"),
            ))
        }
        async fn exists(&self, _: &CacheKey) -> Result<bool> {
            Ok(true)
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
        async fn len(&self) -> Result<usize> {
            Ok(1)
        }
        fn name(&self) -> &'static str {
            "stuck"
        }
    }

    #[tokio::test]
    async fn test_failed_eviction_is_counted() {
        let cache = CacheManager::new(CacheConfig::new(), Box::new(StuckBackend));
        let key = CacheKey::new("k");
        assert_eq!(cache.get::<u32>(&key).await.unwrap(), None);
        let stats = cache.stats().await;
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.entries, 1);
    }
}
