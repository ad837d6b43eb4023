//! Deterministic adapter that plays back a fixed script.

use super::status::{warn_unavailable, ServiceStatus, StatusTracker};
use super::Provider;
use crate::error_kind::ErrorKind;
use crate::types::{CompletionRequest, CompletionResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Succeed(String),
    Fail(ErrorKind, String),
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<ScriptStep>,
    requests: Vec<CompletionRequest>,
}

/// Answers each call with the next queued [`ScriptStep`]; once the queue is
/// empty every call gets the `then` step (success by default).
#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    script: Mutex<Script>,
    then: ScriptStep,
    latency: Duration,
    available: AtomicBool,
    status: StatusTracker,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let then = ScriptStep::Succeed(format!("response from {}", name));
        Self {
            name,
            script: Mutex::new(Script::default()),
            then,
            latency: Duration::ZERO,
            available: AtomicBool::new(true),
            status: StatusTracker::new(),
        }
    }

    pub fn then_succeed(self, text: impl Into<String>) -> Self {
        self.push(ScriptStep::Succeed(text.into()))
    }

    pub fn then_fail(self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.push(ScriptStep::Fail(kind, message.into()))
    }

    pub fn always_succeed(mut self, text: impl Into<String>) -> Self {
        self.then = ScriptStep::Succeed(text.into());
        self
    }

    pub fn always_fail(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.then = ScriptStep::Fail(kind, message.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Starts with the liveness probe reporting `false`.
    pub fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn push(self, step: ScriptStep) -> Self {
        self.lock().steps.push_back(step);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `generate_completion` calls so far.
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    /// Requests received, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_completion(&self, request: CompletionRequest) -> CompletionResult {
        let model = request.model.clone();
        let step = {
            let mut script = self.lock();
            script.requests.push(request);
            script.steps.pop_front().unwrap_or_else(|| self.then.clone())
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let latency_ms = self.latency.as_millis() as u64;

        match step {
            ScriptStep::Succeed(text) => {
                self.status.record_success(Some(latency_ms));
                CompletionResult::success(&self.name, model, text).with_latency_ms(latency_ms)
            }
            ScriptStep::Fail(kind, message) => {
                if self.status.record_failure(&message) {
                    warn_unavailable(&self.name, self.status.consecutive_failures());
                }
                CompletionResult::failure(&self.name, model, kind, message).with_latency_ms(latency_ms)
            }
        }
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn service_status(&self) -> Option<ServiceStatus> {
        Some(self.status.snapshot())
    }

    fn reset_status(&self) {
        self.status.reset();
    }
}
