use crate::error_kind::ErrorKind;
use serde::{Deserialize, Serialize};

/// Outcome of one adapter call.
///
/// Provider-side failures are values of this type with `success == false`;
/// adapters never surface them as `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub was_retry: bool,
}

impl CompletionResult {
    /// Successful result; the quality score is derived from `text`.
    pub fn success(
        provider: impl Into<String>,
        model: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let quality = quality_score(&text);
        Self {
            text,
            provider: provider.into(),
            model: model.into(),
            success: true,
            total_tokens: None,
            finish_reason: None,
            quality_score: Some(quality),
            error: None,
            error_kind: None,
            latency_ms: None,
            was_retry: false,
        }
    }

    pub fn failure(
        provider: impl Into<String>,
        model: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            text: String::new(),
            provider: provider.into(),
            model: model.into(),
            success: false,
            total_tokens: None,
            finish_reason: None,
            quality_score: Some(0.0),
            error: Some(message.into()),
            error_kind: Some(kind),
            latency_ms: None,
            was_retry: false,
        }
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.total_tokens = Some(tokens);
        self
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_retry(mut self, was_retry: bool) -> Self {
        self.was_retry = was_retry;
        self
    }

    /// Failure kind, `Unknown` for failures that carry none.
    pub fn kind(&self) -> Option<ErrorKind> {
        if self.success {
            None
        } else {
            Some(self.error_kind.unwrap_or(ErrorKind::Unknown))
        }
    }
}

/// Heuristic richness of an output: length (capped at 0.5), line structure
/// (capped at 1.0) and +1.0 when a fenced code block is present.
pub fn quality_score(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let length = (text.chars().count() as f64 / 1000.0).min(0.5);
    let structure = (text.split('\n').count() as f64 / 10.0).min(1.0);
    let code = if text.contains("```") { 1.0 } else { 0.0 };
    length + structure + code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_score_components() {
        assert_eq!(quality_score(""), 0.0);
        // 1 line, 5 chars
        let s = quality_score("hello");
        assert!((s - (0.005 + 0.1)).abs() < 1e-9);
        // length cap
        let long = "a".repeat(5000);
        assert!((quality_score(&long) - (0.5 + 0.1)).abs() < 1e-9);
        // structure cap and code block
        let code = format!("```\n{}```", "x\n".repeat(20));
        let score = quality_score(&code);
        assert!(score > 2.0 && score <= 2.5);
    }

    #[test]
    fn test_failure_carries_kind() {
        let r = CompletionResult::failure("ollama", "llama3", ErrorKind::Timeout, "timed out");
        assert!(!r.success);
        assert_eq!(r.kind(), Some(ErrorKind::Timeout));
        assert_eq!(r.error.as_deref(), Some("timed out"));

        let ok = CompletionResult::success("ollama", "llama3", "hi").with_latency_ms(12);
        assert_eq!(ok.kind(), None);
        assert_eq!(ok.latency_ms, Some(12));
    }

    #[test]
    fn test_failure_without_kind_reads_as_unknown() {
        let mut r = CompletionResult::failure("x", "y", ErrorKind::Timeout, "e");
        r.error_kind = None;
        assert_eq!(r.kind(), Some(ErrorKind::Unknown));
    }
}
