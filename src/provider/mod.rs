//! 提供方适配层 — 统一的补全契约与各后端适配器
//!
//! # Provider Adapters
//!
//! Every backend sits behind the object-safe [`Provider`] trait and is held
//! as `Arc<dyn Provider>`. Adapters never return transport errors to the
//! gateway: failures come back as a [`CompletionResult`] with
//! `success == false` and an [`ErrorKind`](crate::ErrorKind).
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Provider`] | completion contract: name, generate, availability, status |
//! | [`ProviderRegistry`] | ordered name → adapter map; registration order breaks ties |
//! | [`StatusTracker`] | per-adapter success/failure bookkeeping |
//! | [`DispatchQueue`] | bounded in-flight admission with FIFO waiters |
//! | [`SubstitutionPolicy`] | cheap path for load-test traffic |
//! | [`OllamaProvider`] | reference adapter for a local Ollama server |
//! | [`ScriptedProvider`] | deterministic adapter for tests and dry runs |

pub mod dispatch;
pub mod ollama;
pub mod scripted;
pub mod status;
pub mod substitution;

use crate::types::{CompletionRequest, CompletionResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use dispatch::{DispatchConfig, DispatchPermit, DispatchQueue, DispatchSnapshot};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use scripted::{ScriptStep, ScriptedProvider};
pub use status::{ServiceStatus, StatusTracker, UNAVAILABLE_AFTER_FAILURES};
pub use substitution::{DispatchPlan, SubstitutionPolicy};

/// Completion contract shared by all backends.
///
/// `generate_completion` must not panic or return early with an error type:
/// every outcome, including "service unavailable", is a [`CompletionResult`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry key, e.g. `"ollama"`.
    fn name(&self) -> &str;

    async fn generate_completion(&self, request: CompletionRequest) -> CompletionResult;

    /// Liveness probe. May hit the network; implementations cache the answer.
    async fn is_available(&self) -> bool;

    fn service_status(&self) -> Option<ServiceStatus> {
        None
    }

    fn reset_status(&self) {}
}

/// Registered adapters in registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    order: Vec<String>,
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `provider` under its own name. Re-registering a name replaces the
    /// adapter but keeps its original position.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        if self.providers.insert(name.clone(), provider).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Provider>)> {
        self.order
            .iter()
            .filter_map(|name| self.providers.get(name).map(|p| (name.as_str(), p)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.order)
            .finish()
    }
}
