//! # ai-gateway
//!
//! 多提供方 AI 路由网关：按健康度与优先级选择后端，统一重试、降级与缓存。
//!
//! Provider routing gateway for LLM backends. One call surface in front of
//! several completion services, local and remote, that picks a backend per
//! request from live health data and a task-type priority table.
//!
//! ## Overview
//!
//! A request names a task type and an input. The gateway asks the
//! [`routing::ProviderSelector`] for the best candidate, calls it through its
//! [`provider::Provider`] adapter, classifies any failure into an
//! [`ErrorKind`], then retries the same backend or fails over to the next one
//! according to that kind. Every attempt feeds the sliding-window
//! [`HealthMonitor`], which in turn drives the next selection.
//!
//! ## Key Features
//!
//! - **Health-aware selection**: round robin, fastest, most reliable or
//!   priority-plus-health scoring over a 100-request window
//! - **Classified failover**: retryable kinds retry in place, severe kinds
//!   move on immediately, and an exhausted chain returns a stable message
//! - **Adapters**: a reference Ollama adapter with bounded dispatch, model
//!   substitution and a consecutive-failure gate
//! - **Caching**: response cache keyed on the trimmed input
//! - **Batching**: sequential or bounded-concurrency batch processing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_gateway::{GatewayBuilder, ProcessOptions};
//! use ai_gateway::provider::ScriptedProvider;
//! use std::sync::Arc;
//!
//! # async fn run() -> ai_gateway::Result<()> {
//! let gateway = GatewayBuilder::new()
//!     .with_provider(Arc::new(ScriptedProvider::new("openai")))
//!     .build()?;
//!
//! let resp = gateway
//!     .process("text-generation", "Say hello", &ProcessOptions::new())
//!     .await;
//! println!("{} via {}", resp.text().unwrap_or(""), resp.provider);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`gateway`] | Orchestrator: selection, retry, failover, batch |
//! | [`routing`] | Candidate scoring and strategy-based selection |
//! | [`health`] | Sliding-window health statistics per provider |
//! | [`provider`] | Adapter contract, registry and bundled adapters |
//! | [`classifier`] | Maps raw provider failures to [`ErrorKind`] |
//! | [`config`] | YAML and environment configuration |
//! | [`cache`] | Response caching with pluggable backends |
//! | [`batch`] | Batch execution strategies |
//! | [`resilience`] | Token-bucket rate limiting |
//! | [`types`] | Request, result and response types |

pub mod batch;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error_kind;
pub mod gateway;
pub mod health;
pub mod provider;
pub mod resilience;
pub mod routing;
pub mod types;

pub use classifier::{ErrorClassifier, ProviderFailure, TransportFault};
pub use config::GatewayConfig;
pub use error_kind::ErrorKind;
pub use gateway::{Gateway, GatewayBuilder, ModelTable, ProcessOptions, ProviderInfo};
pub use health::{HealthMonitor, ProviderHealth};
pub use provider::Provider;
pub use routing::SelectionStrategy;
pub use types::{AiResponse, CompletionRequest, CompletionResult};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
