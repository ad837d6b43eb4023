//! Error classification: reduces heterogeneous provider failures to an [`ErrorKind`].
//!
//! Vendor error payloads are unstructured text, so provider-tagged failures are
//! matched against that provider's vocabulary first. HTTP status codes come
//! next, then transport faults and transport-ish message text.

use crate::error_kind::ErrorKind;
use std::fmt;

/// Transport-level fault observed before any HTTP response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    TimedOut,
    Refused,
    Reset,
    HostNotFound,
    Other,
}

/// One failed provider call, in whatever shape the adapter observed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider that produced the failure (e.g., "openai"); selects a vocabulary.
    pub provider: Option<String>,
    pub status: Option<u16>,
    pub transport: Option<TransportFault>,
    /// Vendor error code or type field (e.g., "rate_limit_error").
    pub code: Option<String>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_transport(mut self, fault: TransportFault) -> Self {
        self.transport = Some(fault);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// True when the call never received an HTTP response.
    pub fn is_transport(&self) -> bool {
        self.status.is_none() && self.transport.is_some()
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<&reqwest::Error> for ProviderFailure {
    fn from(err: &reqwest::Error) -> Self {
        let mut failure = ProviderFailure::new(err.to_string());
        if let Some(status) = err.status() {
            failure = failure.with_status(status.as_u16());
        } else if err.is_timeout() {
            failure = failure.with_transport(TransportFault::TimedOut);
        } else if err.is_connect() {
            failure = failure.with_transport(TransportFault::Refused);
        } else if err.is_request() || err.is_body() {
            failure = failure.with_transport(TransportFault::Reset);
        } else if !err.is_decode() {
            failure = failure.with_transport(TransportFault::Other);
        }
        failure
    }
}

/// Stateless classifier over [`ProviderFailure`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn classify(failure: &ProviderFailure) -> ErrorKind {
        let message = failure.message.to_lowercase();
        let code = failure.code.as_deref().map(str::to_lowercase);

        if let Some(provider) = failure.provider.as_deref() {
            if let Some(kind) = classify_vendor(provider, code.as_deref(), &message) {
                return kind;
            }
        }

        if let Some(status) = failure.status {
            return classify_status(status);
        }

        classify_transport(failure.transport, &message)
    }

    #[inline]
    pub fn is_retryable(kind: ErrorKind) -> bool {
        kind.retryable()
    }

    #[inline]
    pub fn is_severe(kind: ErrorKind) -> bool {
        kind.severe()
    }

    pub fn user_message(kind: ErrorKind) -> &'static str {
        kind.user_message()
    }
}

fn classify_vendor(provider: &str, code: Option<&str>, message: &str) -> Option<ErrorKind> {
    let has = |needle: &str| message.contains(needle);
    let code_is = |c: &str| code == Some(c);

    match provider.to_lowercase().as_str() {
        // LM Studio speaks the OpenAI error dialect.
        "openai" | "lmstudio" => {
            if code_is("rate_limit_error") || has("rate limit") {
                Some(ErrorKind::RateLimit)
            } else if code_is("authentication_error") || has("api key") {
                Some(ErrorKind::AuthenticationError)
            } else if code_is("invalid_request_error") {
                Some(if has("context length") || has("token") {
                    ErrorKind::ContextLengthExceeded
                } else if has("content filter") || has("safety") {
                    ErrorKind::ContentFilter
                } else if has("model") {
                    ErrorKind::ModelNotFound
                } else {
                    ErrorKind::InvalidRequest
                })
            } else if code_is("server_error") {
                Some(ErrorKind::ServerError)
            } else if has("content filter") || has("safety") {
                Some(ErrorKind::ContentFilter)
            } else {
                None
            }
        }
        "anthropic" => {
            if has("rate limit") || has("quota") {
                Some(ErrorKind::RateLimit)
            } else if has("api key") || has("auth") {
                Some(ErrorKind::AuthenticationError)
            } else if has("context") || has("token") {
                Some(ErrorKind::ContextLengthExceeded)
            } else if has("content") || has("policy") || has("safety") {
                Some(ErrorKind::ContentFilter)
            } else if has("model") {
                Some(ErrorKind::ModelNotFound)
            } else {
                None
            }
        }
        "ollama" => {
            if has("not found") || has("no model") {
                Some(ErrorKind::ModelNotFound)
            } else if has("server") || has("internal") {
                Some(ErrorKind::ServerError)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::AuthenticationError,
        404 => ErrorKind::ModelNotFound,
        429 => ErrorKind::RateLimit,
        400..=499 => ErrorKind::InvalidRequest,
        s if s >= 500 => ErrorKind::ServerError,
        _ => ErrorKind::Unknown,
    }
}

fn classify_transport(fault: Option<TransportFault>, message: &str) -> ErrorKind {
    match fault {
        Some(TransportFault::TimedOut) => return ErrorKind::Timeout,
        Some(TransportFault::Refused | TransportFault::Reset | TransportFault::HostNotFound) => {
            return ErrorKind::ConnectionError
        }
        _ => {}
    }

    if message.contains("timeout") || message.contains("timed out") {
        ErrorKind::Timeout
    } else if message.contains("connection") || message.contains("network") {
        ErrorKind::ConnectionError
    } else if fault == Some(TransportFault::Other) || message.contains("internet") {
        ErrorKind::NetworkError
    } else {
        ErrorKind::Unknown
    }
}
