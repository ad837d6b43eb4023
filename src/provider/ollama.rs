//! Reference adapter for a local Ollama server.
//!
//! Dispatch is bounded by a [`DispatchQueue`]; failed calls are retried
//! inside the adapter with linear backoff, throttled when the adapter is
//! already busy so retries do not pile onto an overloaded backend.

use super::dispatch::{DispatchConfig, DispatchQueue};
use super::status::{warn_unavailable, ServiceStatus, StatusTracker};
use super::substitution::SubstitutionPolicy;
use super::Provider;
use crate::classifier::ProviderFailure;
use crate::error_kind::ErrorKind;
use crate::types::{CompletionRequest, CompletionResult};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const PROVIDER_NAME: &str = "ollama";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub normal_timeout: Duration,
    pub probe_timeout: Duration,
    /// Minimum age of the model list before it is fetched again.
    pub model_refresh: Duration,
    /// After a failure, availability probes are skipped for this long.
    pub failure_cooldown: Duration,
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `retry_delay * (n + 1)`.
    pub retry_delay: Duration,
    pub default_max_tokens: u32,
    pub default_temperature: f32,
    pub dispatch: DispatchConfig,
    pub substitution: SubstitutionPolicy,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            normal_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(3),
            model_refresh: Duration::from_secs(60),
            failure_cooldown: Duration::from_secs(30),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            default_max_tokens: 512,
            default_temperature: 0.7,
            dispatch: DispatchConfig::default(),
            substitution: SubstitutionPolicy::default(),
        }
    }
}

impl OllamaConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_retry(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = delay;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_substitution(mut self, policy: SubstitutionPolicy) -> Self {
        self.substitution = policy;
        self
    }

    pub fn with_normal_timeout(mut self, timeout: Duration) -> Self {
        self.normal_timeout = timeout;
        self
    }

    pub fn with_failure_cooldown(mut self, cooldown: Duration) -> Self {
        self.failure_cooldown = cooldown;
        self
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    num_predict: u32,
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: String,
}

#[derive(Debug, Default)]
struct ModelCache {
    names: Vec<String>,
    checked_at: Option<Instant>,
}

pub struct OllamaProvider {
    config: OllamaConfig,
    client: reqwest::Client,
    status: StatusTracker,
    queue: DispatchQueue,
    models: Mutex<ModelCache>,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.normal_timeout)
            .build()?;
        let queue = DispatchQueue::new(config.dispatch.clone());
        Ok(Self {
            config,
            client,
            status: StatusTracker::new(),
            queue,
            models: Mutex::new(ModelCache::default()),
        })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn models(&self) -> MutexGuard<'_, ModelCache> {
        self.models.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// Whether the backend has `model`. An empty (never fetched) model list
    /// counts every model as present; tags match with or without a `:tag` suffix.
    pub fn is_model_available(&self, model: &str) -> bool {
        let cache = self.models();
        model_listed(&cache.names, model)
    }

    /// Model names from the last successful probe.
    pub fn known_models(&self) -> Vec<String> {
        self.models().names.clone()
    }

    /// Adapter-internal retry gate. Near the concurrency cap only network
    /// errors are retried, and only while the failure streak is short.
    fn should_retry(&self, kind: ErrorKind) -> bool {
        let active = self.queue.snapshot().active;
        if active > self.config.dispatch.max_in_flight / 2 {
            return kind == ErrorKind::NetworkError && self.status.consecutive_failures() < 3;
        }
        kind.retryable() && kind != ErrorKind::ProviderUnavailable
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> std::result::Result<GenerateReply, ProviderFailure> {
        let body = GenerateBody {
            model,
            prompt: &request.prompt,
            system: request.system_prompt.as_deref().unwrap_or(""),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature.unwrap_or(self.config.default_temperature),
                num_predict: max_tokens,
                stop: &request.stop_sequences,
            },
        };

        let response = self
            .client
            .post(self.url("/api/generate"))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderFailure::from(&e).with_provider(PROVIDER_NAME))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorReply>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(ProviderFailure::new(message)
                .with_provider(PROVIDER_NAME)
                .with_status(status.as_u16()));
        }

        response
            .json::<GenerateReply>()
            .await
            .map_err(|e| ProviderFailure::from(&e).with_provider(PROVIDER_NAME))
    }

    async fn process(&self, request: CompletionRequest) -> CompletionResult {
        if !request.ignore_availability && !self.status.is_available() {
            let last = self.status.record_rejected().unwrap_or_default();
            return CompletionResult::failure(
                PROVIDER_NAME,
                &request.model,
                ErrorKind::ProviderUnavailable,
                format!("Ollama service is currently unavailable. Last error: {}", last),
            );
        }

        let plan = self.config.substitution.plan(
            &request,
            self.config.default_max_tokens,
            request.timeout.unwrap_or(self.config.normal_timeout),
            |m| self.is_model_available(m),
        );
        if plan.model != request.model {
            info!(
                requested = %request.model,
                model = %plan.model,
                "load test detected, substituting faster model"
            );
        }

        let mut attempt = request.retry_count;
        loop {
            debug!(
                provider = PROVIDER_NAME,
                model = %plan.model,
                attempt,
                active = self.queue.snapshot().active,
                "generating completion"
            );
            let started = Instant::now();
            let outcome = self.send(&request, &plan.model, plan.max_tokens, plan.timeout).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let failure = match outcome {
                Ok(reply) => match reply.response.filter(|t| !t.is_empty()) {
                    Some(text) => {
                        self.status.record_success(Some(latency_ms));
                        return CompletionResult::success(PROVIDER_NAME, &plan.model, text)
                            .with_tokens(reply.eval_count.unwrap_or(0))
                            .with_finish_reason(if reply.done { "stop" } else { "length" })
                            .with_latency_ms(latency_ms)
                            .with_retry(attempt > request.retry_count);
                    }
                    None => ProviderFailure::new("Ollama API returned an unexpected response format")
                        .with_provider(PROVIDER_NAME),
                },
                Err(failure) => failure,
            };

            let kind = StatusTracker::identify_error(&failure);
            if self.status.record_failure(&failure.message) {
                warn_unavailable(PROVIDER_NAME, self.status.consecutive_failures());
            }
            warn!(
                provider = PROVIDER_NAME,
                model = %plan.model,
                error_kind = kind.as_str(),
                attempt,
                "completion failed: {}",
                failure
            );

            let retries_used = attempt - request.retry_count;
            if retries_used < self.config.max_retries && self.should_retry(kind) {
                let delay = self.config.retry_delay * (retries_used + 1);
                debug!(provider = PROVIDER_NAME, delay_ms = delay.as_millis() as u64, "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return CompletionResult::failure(PROVIDER_NAME, &plan.model, kind, failure.message)
                .with_latency_ms(latency_ms)
                .with_retry(attempt > request.retry_count);
        }
    }

    async fn probe(&self) -> bool {
        debug!(endpoint = %self.config.endpoint, "probing ollama availability");
        let outcome = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.config.probe_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let reply = match outcome {
            Ok(response) => response.json::<TagsReply>().await,
            Err(e) => Err(e),
        };

        match reply {
            Ok(tags) if !tags.models.is_empty() => {
                let names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
                info!(models = names.len(), "ollama available");
                {
                    let mut cache = self.models();
                    cache.names = names;
                    cache.checked_at = Some(Instant::now());
                }
                self.status.mark_available();
                true
            }
            Ok(_) => {
                warn!("ollama responded but reported no models");
                false
            }
            Err(e) => {
                let failure = ProviderFailure::from(&e);
                warn!(
                    error_kind = StatusTracker::identify_error(&failure).as_str(),
                    "ollama not available: {}",
                    failure
                );
                self.status.mark_unavailable(&failure.message);
                false
            }
        }
    }
}

fn model_listed(names: &[String], model: &str) -> bool {
    names.is_empty()
        || names.iter().any(|name| {
            name == model
                || name.starts_with(&format!("{}:", model))
                || model.starts_with(&format!("{}:", name))
        })
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn generate_completion(&self, request: CompletionRequest) -> CompletionResult {
        let snapshot = self.queue.snapshot();
        if snapshot.active >= snapshot.max_in_flight {
            debug!(queue_len = snapshot.queued, "queuing ollama request");
        }
        let _permit = self.queue.acquire().await;
        self.process(request).await
    }

    async fn is_available(&self) -> bool {
        let status = self.status.snapshot();
        if !status.available {
            if let Some(age) = status.last_error_age() {
                if age < self.config.failure_cooldown {
                    debug!(since_ms = age.as_millis() as u64, "skipping ollama probe during cooldown");
                    return false;
                }
            }
        }

        let fresh = {
            let cache = self.models();
            !cache.names.is_empty()
                && cache
                    .checked_at
                    .is_some_and(|at| at.elapsed() <= self.config.model_refresh)
        };
        if fresh && status.available {
            return true;
        }
        self.probe().await
    }

    fn service_status(&self) -> Option<ServiceStatus> {
        let mut status = self.status.snapshot();
        let queue = self.queue.snapshot();
        status.queue_length = Some(queue.queued);
        status.active_requests = Some(queue.active);
        Some(status)
    }

    fn reset_status(&self) {
        self.status.reset();
    }
}
