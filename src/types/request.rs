use std::time::Duration;

/// A single completion attempt against one provider.
///
/// Adapters may rewrite `model`, `max_tokens` and `timeout` before dispatch
/// (see `SubstitutionPolicy`), but never the prompt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop_sequences: Vec<String>,
    pub system_prompt: Option<String>,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
    /// Dispatch even if the adapter has marked itself unavailable.
    pub ignore_availability: bool,
    pub retry_count: u32,
    /// Explicit load-test marker; adapters may also detect load tests heuristically.
    pub load_test: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.stop_sequences = stop;
        self
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn ignoring_availability(mut self) -> Self {
        self.ignore_availability = true;
        self
    }

    pub fn as_load_test(mut self) -> Self {
        self.load_test = true;
        self
    }
}
