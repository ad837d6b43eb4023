use super::models::ModelTable;
use super::options::ProcessOptions;
use super::policy::{Decision, PolicyEngine};
use crate::batch::BatchExecutor;
use crate::cache::{CacheKey, CacheKeyGenerator, CacheManager, CacheStats};
use crate::config::GatewayConfig;
use crate::error_kind::ErrorKind;
use crate::health::{HealthMonitor, ProviderHealth};
use crate::provider::{Provider, ProviderRegistry, ServiceStatus};
use crate::resilience::RateLimiter;
use crate::routing::{diagnostic_score, ProviderSelector, SelectionStrategy};
use crate::types::NONE;
use crate::types::{AiResponse, CompletionRequest, CompletionResult};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Provider/model reported by simulated failures.
const SIMULATED: &str = "test";

/// Provider name with its live availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub available: bool,
}

/// Routes task submissions across registered providers with retry,
/// failover, optional caching and batching.
///
/// Built with [`GatewayBuilder`](super::GatewayBuilder) or
/// [`Gateway::from_config`].
pub struct Gateway {
    pub(super) config: GatewayConfig,
    pub(super) registry: ProviderRegistry,
    pub(super) health: Arc<HealthMonitor>,
    pub(super) selector: ProviderSelector,
    pub(super) models: ModelTable,
    pub(super) policy: PolicyEngine,
    pub(super) cache: CacheManager,
    pub(super) keys: CacheKeyGenerator,
    pub(super) limiters: HashMap<String, RateLimiter>,
    pub(super) batch: BatchExecutor,
}

impl Gateway {
    pub fn builder() -> super::GatewayBuilder {
        super::GatewayBuilder::new()
    }

    /// Validates `config` and wires the built-in adapters for it.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        super::GatewayBuilder::from_config(config)?.build()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn models(&self) -> &ModelTable {
        &self.models
    }

    /// Processes one submission. Never fails: every outcome, including an
    /// exhausted provider chain, is an [`AiResponse`].
    pub async fn process(&self, task_type: &str, input: &str, options: &ProcessOptions) -> AiResponse {
        let task_type = if task_type.trim().is_empty() {
            self.config.default_task_type.as_str()
        } else {
            task_type
        };
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!(
            "gateway.process",
            %request_id,
            task_type,
            strategy = options.strategy.as_str()
        );
        self.process_inner(task_type, input, options).instrument(span).await
    }

    async fn process_inner(&self, task_type: &str, input: &str, options: &ProcessOptions) -> AiResponse {
        if let Some(kind) = options.simulate_error {
            warn!(error_kind = kind.as_str(), "returning simulated error");
            return AiResponse::failure(kind, kind.user_message(), SIMULATED, SIMULATED);
        }

        let cache_key = (options.cache_results && self.cache.is_enabled())
            .then(|| self.cache_key(task_type, input, options));
        if let Some(ref key) = cache_key {
            match self.cache.get::<AiResponse>(key).await {
                Ok(Some(mut hit)) => {
                    info!(provider = %hit.provider, "serving cached response");
                    hit.from_cache = true;
                    return hit;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "cache lookup failed"),
            }
        }

        let first = match options.provider.as_deref() {
            Some(name) => {
                if !self.registry.contains(name) {
                    error!(provider = %name, "requested provider is not registered");
                    return AiResponse::failure(
                        ErrorKind::ProviderUnavailable,
                        format!("Provider {} is not registered", name),
                        NONE,
                        NONE,
                    );
                }
                if self.models.model_for(name, task_type).is_none() {
                    error!(provider = %name, "no model configured for requested provider");
                    return AiResponse::failure(
                        ErrorKind::ModelUnavailable,
                        format!("No model configured for provider {} and task type {}", name, task_type),
                        name,
                        NONE,
                    );
                }
                name.to_string()
            }
            None => match self
                .selector
                .select_best(task_type, options.strategy, options.retry_count, &[])
            {
                Some(name) => name,
                None => {
                    error!("no providers available");
                    return AiResponse::no_provider(task_type);
                }
            },
        };

        let response = self.run_chain(task_type, input, options, first).await;

        if response.success {
            if let Some(ref key) = cache_key {
                if let Err(e) = self.cache.set(key, &response).await {
                    warn!(error = %e, "failed to cache response");
                }
            }
        }
        response
    }

    /// Retry-then-failover loop. Only one provider is in flight at a time.
    async fn run_chain(
        &self,
        task_type: &str,
        input: &str,
        options: &ProcessOptions,
        first: String,
    ) -> AiResponse {
        let mut tried: Vec<String> = Vec::new();
        let mut current = first;

        'chain: loop {
            let model = self.models.model_for(&current, task_type).map(str::to_string);
            let (Some(model), Some(provider)) = (model, self.registry.get(&current).cloned()) else {
                warn!(provider = %current, "no model for task type, skipping provider");
                tried.push(current);
                match self.next_candidate(task_type, &tried) {
                    Some(next) => {
                        current = next;
                        continue 'chain;
                    }
                    None => break 'chain,
                }
            };

            let first_attempt = if tried.is_empty() { options.retry_count } else { 0 };
            let mut attempt = first_attempt;
            loop {
                let result = self.dispatch(&provider, input, &model, attempt, options).await;

                if result.success {
                    self.health.update(&current, true, result.latency_ms, None);
                    let failover = !tried.is_empty();
                    if failover {
                        info!(provider = %current, tried = ?tried, "failover succeeded");
                    }
                    let mut response = AiResponse::from_success(&result).with_failover(failover);
                    response.was_retry |= attempt > first_attempt;
                    return response;
                }

                let kind = result.kind().unwrap_or(ErrorKind::Unknown);
                self.health.update(&current, false, result.latency_ms, Some(kind));
                debug!(
                    provider = %current,
                    model = %model,
                    attempt,
                    error = result.error.as_deref().unwrap_or(""),
                    "attempt failed"
                );

                let mut excluded = tried.clone();
                excluded.push(current.clone());
                let next = self.next_candidate(task_type, &excluded);

                match self.policy.decide(kind, attempt, next.is_some()) {
                    Decision::Retry { delay } => {
                        debug!(
                            provider = %current,
                            error_kind = kind.as_str(),
                            delay_ms = delay.as_millis() as u64,
                            "retrying same provider"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Decision::Fallback => {
                        tried = excluded;
                        let Some(next) = next else { break 'chain };
                        info!(
                            from = %current,
                            to = %next,
                            error_kind = kind.as_str(),
                            "failing over"
                        );
                        current = next;
                        continue 'chain;
                    }
                    Decision::Fail => {
                        tried = excluded;
                        break 'chain;
                    }
                }
            }
        }

        error!(tried = ?tried, "all providers failed");
        AiResponse::exhausted(task_type)
    }

    /// Best untried provider under the fallback strategy.
    fn next_candidate(&self, task_type: &str, tried: &[String]) -> Option<String> {
        self.selector
            .alternatives(task_type, SelectionStrategy::Fallback, tried.len() as u32, tried)
            .into_iter()
            .next()
    }

    async fn dispatch(
        &self,
        provider: &Arc<dyn Provider>,
        input: &str,
        model: &str,
        attempt: u32,
        options: &ProcessOptions,
    ) -> CompletionResult {
        let name = provider.name();
        if let Some(limiter) = self.limiters.get(name) {
            if let Err(e) = limiter.acquire().await {
                warn!(provider = %name, error = %e, "rate limiter rejected request");
            }
        }

        let mut request = CompletionRequest::new(input, model).with_retry_count(attempt);
        if let Some(timeout) = options.timeout {
            request = request.with_timeout(timeout);
        }

        let started = Instant::now();
        let call = provider.generate_completion(request);
        let result = match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
                CompletionResult::failure(
                    name,
                    model,
                    ErrorKind::Timeout,
                    format!("no response within {} ms", timeout.as_millis()),
                )
            }),
            None => call.await,
        };
        result.with_latency_ms(started.elapsed().as_millis() as u64)
    }

    /// Processes every input with the same task type and options. Output
    /// order matches input order; a failed item never affects its siblings.
    pub async fn process_batch<S>(&self, task_type: &str, inputs: &[S], options: &ProcessOptions) -> Vec<AiResponse>
    where
        S: AsRef<str>,
    {
        info!(task_type, items = inputs.len(), "processing batch");
        self.batch
            .execute(inputs.iter().collect(), |_, input| async move {
                self.process(task_type, input.as_ref(), options).await
            })
            .await
    }

    fn cache_key(&self, task_type: &str, input: &str, options: &ProcessOptions) -> CacheKey {
        self.keys.generate(task_type, input, options.fingerprint())
    }

    /// Registered providers with a live availability probe each.
    pub async fn providers(&self) -> Vec<ProviderInfo> {
        let mut out = Vec::with_capacity(self.registry.len());
        for (name, provider) in self.registry.iter() {
            out.push(ProviderInfo {
                name: name.to_string(),
                available: provider.is_available().await,
            });
        }
        out
    }

    /// Health snapshot of every tracked provider.
    pub fn health(&self) -> Vec<ProviderHealth> {
        self.health.all()
    }

    /// Health snapshots ranked by the diagnostics score, best first.
    pub fn providers_by_score(&self) -> Vec<(ProviderHealth, f64)> {
        self.health
            .rank_by_score(diagnostic_score)
            .into_iter()
            .map(|h| {
                let score = diagnostic_score(&h);
                (h, score)
            })
            .collect()
    }

    /// Distinct model names per registered provider across task types.
    pub fn available_models(&self) -> BTreeMap<String, Vec<String>> {
        self.registry
            .names()
            .iter()
            .map(|name| (name.clone(), self.models.models_of(name)))
            .collect()
    }

    pub fn service_statuses(&self) -> BTreeMap<String, ServiceStatus> {
        self.registry
            .iter()
            .filter_map(|(name, p)| p.service_status().map(|s| (name.to_string(), s)))
            .collect()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear().await?;
        info!("response cache cleared");
        Ok(())
    }

    /// Resets all health records.
    pub fn reset_health(&self) {
        self.health.reset();
    }

    /// Operator action: restores one adapter's service status. Returns
    /// `false` for unknown providers.
    pub fn reset_provider_status(&self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(provider) => {
                provider.reset_status();
                info!(provider = %name, "service status reset");
                true
            }
            None => false,
        }
    }
}
