//! Gateway configuration: defaults, YAML file, environment overrides.
//!
//! Later sources override earlier ones: [`GatewayConfig::default`], then
//! [`GatewayConfig::from_yaml_file`], then [`GatewayConfig::apply_env`].
//! [`GatewayConfig::validate`] runs once at gateway construction.

use crate::cache::{CacheConfig, DEFAULT_MAX_ENTRIES};
use crate::provider::SubstitutionPolicy;
use crate::routing::{Priorities, PriorityTable};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const OPENAI: &str = "openai";
pub const ANTHROPIC: &str = "anthropic";
pub const OLLAMA: &str = "ollama";
pub const LMSTUDIO: &str = "lmstudio";
pub const LOCAL: &str = "local";

/// Providers that run on the operator's own hardware and need no API key.
pub const LOCAL_PROVIDERS: [&str; 3] = [OLLAMA, LMSTUDIO, LOCAL];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub enabled: bool,
    /// Lower is preferred; orders registration.
    pub priority: i64,
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub local: bool,
    /// Token-bucket refill rate; `None` disables limiting.
    pub requests_per_second: Option<f64>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 100,
            endpoint: None,
            api_key: None,
            local: false,
            requests_per_second: None,
        }
    }
}

impl ProviderSettings {
    fn local(priority: i64, endpoint: &str) -> Self {
        Self {
            priority,
            endpoint: Some(endpoint.to_string()),
            local: true,
            ..Default::default()
        }
    }

    fn remote(priority: i64) -> Self {
        Self {
            enabled: true,
            priority,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Same-provider retries before failing over.
    pub max_retries: u32,
    pub delay_ms: u64,
    /// Upper bound for the doubling backoff; equal to `delay_ms` means a fixed delay.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 500,
            max_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_enabled(self.enabled)
            .with_ttl(Duration::from_secs(self.ttl_secs))
            .with_max_entries(self.max_entries)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub providers: BTreeMap<String, ProviderSettings>,
    /// Task type used when a submission names none.
    pub default_task_type: String,
    pub fallback_threshold: f64,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    /// Replaces the built-in per-task priority tables when set.
    pub task_priorities: Option<BTreeMap<String, Priorities>>,
    pub substitution: SubstitutionPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let providers = BTreeMap::from([
            (LMSTUDIO.to_string(), ProviderSettings::local(1, "http://localhost:1234")),
            (OLLAMA.to_string(), ProviderSettings::local(2, crate::provider::ollama::DEFAULT_ENDPOINT)),
            (LOCAL.to_string(), ProviderSettings::local(3, "http://localhost:3001")),
            (OPENAI.to_string(), ProviderSettings::remote(4)),
            (ANTHROPIC.to_string(), ProviderSettings::remote(5)),
        ]);
        Self {
            providers,
            default_task_type: crate::types::task::TEXT_GENERATION.to_string(),
            fallback_threshold: 0.7,
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            task_priorities: None,
            substitution: SubstitutionPolicy::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text).map_err(|e| {
            Error::configuration_with_context(
                format!("failed to parse {}: {}", path.display(), e),
                ErrorContext::new().with_source(path.display().to_string()),
            )
        })?;
        info!(path = %path.display(), "loaded gateway config");
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; split out so tests need not touch
    /// the process environment.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let toggles = [
            ("USE_OLLAMA", OLLAMA),
            ("USE_LM_STUDIO", LMSTUDIO),
            ("USE_LOCAL_MODELS", LOCAL),
        ];
        for (var, name) in toggles {
            if let Some(v) = lookup(var) {
                self.provider_mut(name).enabled = v == "true";
            }
        }
        // Remote providers stay on unless explicitly disabled.
        for (var, name) in [("USE_OPENAI", OPENAI), ("USE_ANTHROPIC", ANTHROPIC)] {
            if let Some(v) = lookup(var) {
                self.provider_mut(name).enabled = v != "false";
            }
        }

        let priorities = [
            ("LMSTUDIO_PRIORITY", LMSTUDIO),
            ("OLLAMA_PRIORITY", OLLAMA),
            ("LOCAL_PRIORITY", LOCAL),
            ("OPENAI_PRIORITY", OPENAI),
            ("ANTHROPIC_PRIORITY", ANTHROPIC),
        ];
        for (var, name) in priorities {
            if let Some(v) = lookup(var) {
                self.provider_mut(name).priority = parse_var(var, &v)?;
            }
        }

        let endpoints = [
            ("OLLAMA_API_ENDPOINT", OLLAMA),
            ("LMSTUDIO_API_ENDPOINT", LMSTUDIO),
            ("LOCAL_API_ENDPOINT", LOCAL),
        ];
        for (var, name) in endpoints {
            if let Some(v) = lookup(var) {
                self.provider_mut(name).endpoint = Some(v);
            }
        }

        for (var, name) in [("OPENAI_API_KEY", OPENAI), ("ANTHROPIC_API_KEY", ANTHROPIC)] {
            if let Some(v) = lookup(var).filter(|v| !v.is_empty()) {
                self.provider_mut(name).api_key = Some(v);
            }
        }

        if let Some(v) = lookup("DEFAULT_MODEL_TYPE") {
            self.default_task_type = v;
        }
        if let Some(v) = lookup("FALLBACK_THRESHOLD") {
            self.fallback_threshold = parse_var("FALLBACK_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("AI_GATEWAY_MAX_RETRIES") {
            self.retry.max_retries = parse_var("AI_GATEWAY_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("AI_GATEWAY_RETRY_DELAY_MS") {
            let delay: u64 = parse_var("AI_GATEWAY_RETRY_DELAY_MS", &v)?;
            self.retry.max_delay_ms = self.retry.max_delay_ms.max(delay);
            self.retry.delay_ms = delay;
        }
        if let Some(v) = lookup("AI_GATEWAY_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_var("AI_GATEWAY_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("AI_GATEWAY_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = parse_var("AI_GATEWAY_CACHE_MAX_ENTRIES", &v)?;
        }
        Ok(())
    }

    fn provider_mut(&mut self, name: &str) -> &mut ProviderSettings {
        self.providers.entry(name.to_string()).or_insert_with(|| ProviderSettings {
            local: LOCAL_PROVIDERS.contains(&name),
            ..Default::default()
        })
    }

    /// Enabled providers, most preferred first; ties keep name order.
    pub fn enabled_providers(&self) -> Vec<(&str, &ProviderSettings)> {
        let mut enabled: Vec<_> = self
            .providers
            .iter()
            .filter(|(_, s)| s.enabled)
            .map(|(n, s)| (n.as_str(), s))
            .collect();
        enabled.sort_by_key(|(_, s)| s.priority);
        enabled
    }

    pub fn uses_local_providers(&self) -> bool {
        self.providers.values().any(|s| s.enabled && s.local)
    }

    pub fn priority_table(&self) -> PriorityTable {
        match &self.task_priorities {
            Some(tables) => PriorityTable::from(tables.clone()),
            None => PriorityTable::builtin(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fallback_threshold) {
            return Err(Error::configuration_with_context(
                format!("fallback threshold {} is outside 0.0..=1.0", self.fallback_threshold),
                ErrorContext::new().with_field_path("fallback_threshold"),
            ));
        }

        for (name, settings) in &self.providers {
            if let Some(endpoint) = &settings.endpoint {
                url::Url::parse(endpoint).map_err(|e| {
                    Error::configuration_with_context(
                        format!("invalid endpoint '{}' for provider {}: {}", endpoint, name, e),
                        ErrorContext::new().with_field_path(format!("providers.{}.endpoint", name)),
                    )
                })?;
            }
            if let Some(rps) = settings.requests_per_second {
                if !rps.is_finite() || rps < 0.0 {
                    return Err(Error::configuration_with_context(
                        format!("requests_per_second for {} must be a non-negative number", name),
                        ErrorContext::new()
                            .with_field_path(format!("providers.{}.requests_per_second", name)),
                    ));
                }
            }
        }

        if !self.uses_local_providers() {
            for name in [OPENAI, ANTHROPIC] {
                let Some(settings) = self.providers.get(name) else {
                    continue;
                };
                let has_key = settings.api_key.as_deref().is_some_and(|k| !k.is_empty());
                if settings.enabled && !has_key {
                    return Err(Error::configuration_with_context(
                        format!(
                            "{}_API_KEY is required when {} is enabled and no local provider is",
                            name.to_uppercase(),
                            name
                        ),
                        ErrorContext::new()
                            .with_field_path(format!("providers.{}.api_key", name))
                            .with_details("enable a local provider or supply the key"),
                    ));
                }
            }
        }

        if self.enabled_providers().is_empty() {
            warn!("no providers enabled; every request will fail with provider_unavailable");
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::configuration_with_context(
            format!("cannot parse {}='{}'", var, value),
            ErrorContext::new().with_source("environment").with_field_path(var),
        )
    })
}
