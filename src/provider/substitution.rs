//! Cheap-path policy for load-test traffic.

use crate::types::CompletionRequest;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Decides when a request counts as a load-test sample and how it is
/// rewritten: shorter timeout, smaller output cap, faster model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstitutionPolicy {
    /// Master switch for the cheap path.
    pub enabled: bool,
    /// Also classify requests by prompt shape, not only by the explicit flag.
    pub heuristics: bool,
    pub marker: String,
    pub max_prompt_chars: usize,
    pub max_output_tokens: u32,
    /// Tried in order; the first one the backend reports as present wins.
    pub preferred_models: Vec<String>,
    /// Used when no preferred model is present and the requested one looks heavy.
    pub fallback_model: String,
    pub heavy_model_markers: Vec<String>,
    pub load_test_timeout_ms: u64,
    pub load_test_max_tokens: u32,
}

impl Default for SubstitutionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            heuristics: true,
            marker: "TEST_LOAD".to_string(),
            max_prompt_chars: 100,
            max_output_tokens: 50,
            preferred_models: ["mistral", "tinyllama", "gemma:2b", "phi"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback_model: "mistral".to_string(),
            heavy_model_markers: ["llama", "13b", "70b"].iter().map(|s| s.to_string()).collect(),
            load_test_timeout_ms: 15_000,
            load_test_max_tokens: 30,
        }
    }
}

/// Effective dispatch parameters after applying the policy.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub load_test: bool,
}

impl SubstitutionPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn is_load_test(&self, request: &CompletionRequest) -> bool {
        if !self.enabled {
            return false;
        }
        if request.load_test {
            return true;
        }
        self.heuristics
            && (request.prompt.chars().count() < self.max_prompt_chars
                || request.prompt.contains(&self.marker)
                || request.max_tokens.is_some_and(|m| m <= self.max_output_tokens))
    }

    /// Resolves model, output cap and timeout for `request`.
    ///
    /// `model_present` answers whether the backend currently has a model.
    pub fn plan<F>(
        &self,
        request: &CompletionRequest,
        default_max_tokens: u32,
        default_timeout: Duration,
        model_present: F,
    ) -> DispatchPlan
    where
        F: Fn(&str) -> bool,
    {
        if !self.is_load_test(request) {
            return DispatchPlan {
                model: request.model.clone(),
                max_tokens: request.max_tokens.unwrap_or(default_max_tokens),
                timeout: request.timeout.unwrap_or(default_timeout),
                load_test: false,
            };
        }

        let model = self
            .preferred_models
            .iter()
            .find(|m| model_present(m))
            .cloned()
            .unwrap_or_else(|| {
                let heavy = self
                    .heavy_model_markers
                    .iter()
                    .any(|marker| request.model.contains(marker.as_str()));
                if heavy {
                    self.fallback_model.clone()
                } else {
                    request.model.clone()
                }
            });

        DispatchPlan {
            model,
            max_tokens: self.load_test_max_tokens,
            timeout: Duration::from_millis(self.load_test_timeout_ms),
            load_test: true,
        }
    }
}
