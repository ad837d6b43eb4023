use super::result::CompletionResult;
use crate::error_kind::ErrorKind;
use serde::{Deserialize, Serialize};

/// Provider/model sentinel used when no provider produced the response.
pub(crate) const NONE: &str = "none";

/// Caller-facing response for one task submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub was_failover: bool,
    #[serde(default)]
    pub was_retry: bool,
    #[serde(default)]
    pub from_cache: bool,
}

impl AiResponse {
    pub(crate) fn from_success(result: &CompletionResult) -> Self {
        Self {
            success: true,
            result: Some(result.text.clone()),
            error: None,
            error_type: None,
            provider: result.provider.clone(),
            model: result.model.clone(),
            latency: result.latency_ms,
            quality_score: result.quality_score,
            was_failover: false,
            was_retry: result.was_retry,
            from_cache: false,
        }
    }

    pub(crate) fn failure(
        kind: ErrorKind,
        error: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            error_type: Some(kind),
            provider: provider.into(),
            model: model.into(),
            latency: None,
            quality_score: None,
            was_failover: false,
            was_retry: false,
            from_cache: false,
        }
    }

    /// Terminal response after every candidate provider failed.
    pub(crate) fn exhausted(task_type: &str) -> Self {
        let mut resp = Self::failure(
            ErrorKind::AllProvidersFailed,
            format!("All AI services failed for task type {}", task_type),
            NONE,
            NONE,
        );
        resp.was_failover = true;
        resp
    }

    pub(crate) fn no_provider(task_type: &str) -> Self {
        Self::failure(
            ErrorKind::ProviderUnavailable,
            format!("No AI providers available for task type {}", task_type),
            NONE,
            NONE,
        )
    }

    pub fn with_failover(mut self, was_failover: bool) -> Self {
        self.was_failover = was_failover;
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.result.as_deref()
    }
}
