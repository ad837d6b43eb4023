use super::core::Gateway;
use super::models::ModelTable;
use super::policy::PolicyEngine;
use crate::batch::{BatchExecutor, BatchExecutorConfig, BatchStrategy};
use crate::cache::{CacheBackend, CacheKeyGenerator, CacheManager};
use crate::config::{GatewayConfig, OLLAMA};
use crate::health::HealthMonitor;
use crate::provider::{OllamaConfig, OllamaProvider, Provider, ProviderRegistry};
use crate::resilience::{RateLimiter, RateLimiterConfig};
use crate::routing::{PriorityTable, ProviderSelector, SelectionStrategy};
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Explicit wiring for a [`Gateway`].
///
/// Nothing here reads the environment; pass a [`GatewayConfig`] built
/// however the caller likes.
pub struct GatewayBuilder {
    config: GatewayConfig,
    providers: Vec<Arc<dyn Provider>>,
    models: ModelTable,
    priorities: Option<PriorityTable>,
    strategy_tables: Vec<(SelectionStrategy, PriorityTable)>,
    rate_limits: HashMap<String, RateLimiterConfig>,
    cache_backend: Option<Box<dyn CacheBackend>>,
    batch: BatchExecutorConfig,
    health: Option<Arc<HealthMonitor>>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    /// Uses `config` as is; call [`GatewayConfig::validate`] first or go
    /// through [`GatewayBuilder::from_config`].
    pub fn with_config(config: GatewayConfig) -> Self {
        Self {
            config,
            providers: Vec::new(),
            models: ModelTable::builtin(),
            priorities: None,
            strategy_tables: Vec::new(),
            rate_limits: HashMap::new(),
            cache_backend: None,
            batch: BatchExecutorConfig::default(),
            health: None,
        }
    }

    /// Validates `config` and registers the adapters this crate ships for
    /// the enabled providers. Providers without a built-in adapter are
    /// reported and must be added with [`with_provider`](Self::with_provider).
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let enabled: Vec<(String, Option<String>)> = config
            .enabled_providers()
            .into_iter()
            .map(|(name, s)| (name.to_string(), s.endpoint.clone()))
            .collect();

        let mut builder = Self::with_config(config);
        for (name, endpoint) in enabled {
            if name == OLLAMA {
                let mut ollama = OllamaConfig::default()
                    .with_substitution(builder.config.substitution.clone());
                if let Some(endpoint) = endpoint {
                    ollama.endpoint = endpoint;
                }
                builder = builder.with_provider(Arc::new(OllamaProvider::new(ollama)?));
            } else {
                warn!(provider = %name, "no built-in adapter; register one with GatewayBuilder::with_provider");
            }
        }
        Ok(builder)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Registers an adapter. A later adapter with the same name replaces the
    /// earlier one.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.retain(|p| p.name() != provider.name());
        self.providers.push(provider);
        self
    }

    pub fn with_models(mut self, models: ModelTable) -> Self {
        self.models = models;
        self
    }

    /// Runs `model` on `provider` for every task type.
    pub fn with_provider_model(mut self, provider: &str, model: &str) -> Self {
        self.models.set_model_for_all(provider, model);
        self
    }

    pub fn with_priorities(mut self, table: PriorityTable) -> Self {
        self.priorities = Some(table);
        self
    }

    pub fn with_strategy_table(mut self, strategy: SelectionStrategy, table: PriorityTable) -> Self {
        self.strategy_tables.push((strategy, table));
        self
    }

    pub fn with_rate_limit(mut self, provider: impl Into<String>, config: RateLimiterConfig) -> Self {
        self.rate_limits.insert(provider.into(), config);
        self
    }

    pub fn with_cache_backend(mut self, backend: Box<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn with_batch_strategy(mut self, strategy: BatchStrategy) -> Self {
        self.batch = self.batch.with_strategy(strategy);
        self
    }

    /// Shares an existing monitor, e.g. with another gateway.
    pub fn with_health_monitor(mut self, health: Arc<HealthMonitor>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn build(self) -> Result<Gateway> {
        let config = self.config;

        // Configured priority (lower first) fixes registration order;
        // adapters the config does not mention keep insertion order, last.
        let mut providers = self.providers;
        providers.sort_by_key(|p| {
            config
                .providers
                .get(p.name())
                .map(|s| s.priority)
                .unwrap_or(i64::MAX)
        });

        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(provider);
        }

        let mut rate_limits = self.rate_limits;
        for (name, settings) in &config.providers {
            if let Some(rps) = settings.requests_per_second {
                let limiter = RateLimiterConfig::from_rps(rps).ok_or_else(|| {
                    Error::configuration_with_context(
                        format!("invalid requests_per_second {} for {}", rps, name),
                        ErrorContext::new()
                            .with_field_path(format!("providers.{}.requests_per_second", name))
                            .with_source("gateway_builder"),
                    )
                })?;
                rate_limits.entry(name.clone()).or_insert(limiter);
            }
        }
        for (name, limit) in &rate_limits {
            if limit.capacity.is_nan() || limit.capacity < 1.0 {
                return Err(Error::validation_with_context(
                    format!("rate limit for {} needs a capacity of at least 1, got {}", name, limit.capacity),
                    ErrorContext::new()
                        .with_field_path(format!("rate_limits.{}.capacity", name))
                        .with_source("gateway_builder"),
                ));
            }
        }
        let limiters: HashMap<String, RateLimiter> = rate_limits
            .into_iter()
            .filter(|(name, _)| registry.contains(name))
            .map(|(name, cfg)| (name, RateLimiter::new(cfg)))
            .collect();

        let health = self.health.unwrap_or_default();
        let priorities = self.priorities.unwrap_or_else(|| config.priority_table());
        let mut selector = ProviderSelector::new(registry.names().to_vec(), health.clone(), priorities);
        for (strategy, table) in self.strategy_tables {
            selector = selector.with_strategy_table(strategy, table);
        }

        let cache_config = config.cache.to_cache_config();
        let cache = match self.cache_backend {
            Some(backend) => CacheManager::new(cache_config, backend),
            None => CacheManager::from_config(cache_config),
        };

        for name in registry.names() {
            if self.models.models_of(name).is_empty() {
                warn!(provider = %name, "no model configured for any task type; provider will be skipped");
            }
        }

        info!(
            providers = ?registry.names(),
            rate_limited = limiters.len(),
            cache = cache.backend_name(),
            "gateway ready"
        );

        Ok(Gateway {
            policy: PolicyEngine::new(&config.retry),
            config,
            registry,
            health,
            selector,
            models: self.models,
            cache,
            keys: CacheKeyGenerator::new(),
            limiters,
            batch: BatchExecutor::with_config(self.batch),
        })
    }
}
