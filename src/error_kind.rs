//! 错误类型分类：封闭的错误种类集合及其重试/严重性语义。
//!
//! Closed taxonomy of provider failure kinds.
//!
//! Every failed provider call is reduced to exactly one [`ErrorKind`]. Two
//! derived properties drive the gateway's retry/fallback policy:
//!
//! | Property | Kinds | Meaning |
//! |----------|-------|---------|
//! | retryable | network, connection, timeout, server, rate limit, provider unavailable | the same provider may succeed on a later attempt |
//! | severe | authentication, model not found, model unavailable, content filter, context length | never retry against the same provider |
//!
//! ## Example
//!
//! ```rust
//! use ai_gateway::ErrorKind;
//!
//! let kind = ErrorKind::from_name("rate_limit");
//! assert!(kind.retryable());
//! assert!(!kind.severe());
//! assert_eq!(kind.as_str(), "rate_limit");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkError,
    ConnectionError,
    Timeout,
    ServerError,
    RateLimit,
    AuthenticationError,
    InvalidRequest,
    ModelNotFound,
    ModelUnavailable,
    ContentFilter,
    #[serde(rename = "context_length")]
    ContextLengthExceeded,
    ProviderUnavailable,
    AllProvidersFailed,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 14] = [
        Self::NetworkError,
        Self::ConnectionError,
        Self::Timeout,
        Self::ServerError,
        Self::RateLimit,
        Self::AuthenticationError,
        Self::InvalidRequest,
        Self::ModelNotFound,
        Self::ModelUnavailable,
        Self::ContentFilter,
        Self::ContextLengthExceeded,
        Self::ProviderUnavailable,
        Self::AllProvidersFailed,
        Self::Unknown,
    ];

    /// Returns the wire name (e.g., `"network_error"`).
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::ConnectionError => "connection_error",
            Self::Timeout => "timeout",
            Self::ServerError => "server_error",
            Self::RateLimit => "rate_limit",
            Self::AuthenticationError => "authentication_error",
            Self::InvalidRequest => "invalid_request",
            Self::ModelNotFound => "model_not_found",
            Self::ModelUnavailable => "model_unavailable",
            Self::ContentFilter => "content_filter",
            Self::ContextLengthExceeded => "context_length",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::AllProvidersFailed => "all_providers_failed",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the same provider may succeed if the call is repeated.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError
                | Self::ConnectionError
                | Self::Timeout
                | Self::ServerError
                | Self::RateLimit
                | Self::ProviderUnavailable
        )
    }

    /// Whether the failure rules out this provider for the current request.
    #[inline]
    pub fn severe(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationError
                | Self::ModelNotFound
                | Self::ModelUnavailable
                | Self::ContentFilter
                | Self::ContextLengthExceeded
        )
    }

    /// One-sentence message safe to show to end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NetworkError => "A network error occurred, please check your connection.",
            Self::ConnectionError => "Could not connect to the AI service.",
            Self::Timeout => "The AI service did not respond in time.",
            Self::ServerError => "The AI service encountered an error, please try again later.",
            Self::RateLimit => "Too many requests, please try again later.",
            Self::AuthenticationError => "The AI service rejected the credentials.",
            Self::InvalidRequest => "The request was invalid, please check the input.",
            Self::ModelNotFound => "The requested model was not found.",
            Self::ModelUnavailable => "The requested model is currently unavailable.",
            Self::ContentFilter => "The request was blocked by a content filter.",
            Self::ContextLengthExceeded => "The input is too long for the selected model.",
            Self::ProviderUnavailable => "The AI service is currently unavailable.",
            Self::AllProvidersFailed => "All AI services failed to process the request.",
            Self::Unknown => "An unknown error occurred.",
        }
    }

    /// Parses a wire name; unrecognized names map to [`ErrorKind::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "network_error" => Self::NetworkError,
            "connection_error" => Self::ConnectionError,
            "timeout" => Self::Timeout,
            "server_error" => Self::ServerError,
            "rate_limit" => Self::RateLimit,
            "authentication_error" => Self::AuthenticationError,
            "invalid_request" => Self::InvalidRequest,
            "model_not_found" => Self::ModelNotFound,
            "model_unavailable" => Self::ModelUnavailable,
            "content_filter" => Self::ContentFilter,
            "context_length" | "context_length_exceeded" => Self::ContextLengthExceeded,
            "provider_unavailable" | "service_unavailable" => Self::ProviderUnavailable,
            "all_providers_failed" => Self::AllProvidersFailed,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_set() {
        let retryable: Vec<_> = ErrorKind::ALL.iter().filter(|k| k.retryable()).collect();
        assert_eq!(
            retryable,
            vec![
                &ErrorKind::NetworkError,
                &ErrorKind::ConnectionError,
                &ErrorKind::Timeout,
                &ErrorKind::ServerError,
                &ErrorKind::RateLimit,
                &ErrorKind::ProviderUnavailable,
            ]
        );
    }

    #[test]
    fn test_severe_set() {
        let severe: Vec<_> = ErrorKind::ALL.iter().filter(|k| k.severe()).collect();
        assert_eq!(
            severe,
            vec![
                &ErrorKind::AuthenticationError,
                &ErrorKind::ModelNotFound,
                &ErrorKind::ModelUnavailable,
                &ErrorKind::ContentFilter,
                &ErrorKind::ContextLengthExceeded,
            ]
        );
    }

    #[test]
    fn test_retryable_and_severe_are_disjoint() {
        for kind in ErrorKind::ALL {
            assert!(!(kind.retryable() && kind.severe()), "{kind} is both");
        }
    }

    #[test]
    fn test_names_parse_back() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_name(kind.as_str()), kind);
        }
        assert_eq!(ErrorKind::from_name("bogus"), ErrorKind::Unknown);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ErrorKind::AllProvidersFailed).unwrap();
        assert_eq!(json, "\"all_providers_failed\"");
        let json = serde_json::to_string(&ErrorKind::ContextLengthExceeded).unwrap();
        assert_eq!(json, "\"context_length\"");
    }

    #[test]
    fn test_user_messages_do_not_leak_detail() {
        for kind in ErrorKind::ALL {
            let msg = kind.user_message();
            assert!(msg.ends_with('.'));
            assert!(!msg.contains('_'));
        }
    }
}
