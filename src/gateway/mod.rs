//! 网关编排模块：选择提供方、重试、故障转移、缓存与批处理。
//!
//! # Gateway Orchestrator
//!
//! Per submission the gateway walks a small state machine:
//!
//! 1. serve from the response cache when `cache_results` is set and an
//!    equivalent submission succeeded before;
//! 2. resolve the first provider (the requested one, or the selector's best);
//! 3. dispatch to the model the [`ModelTable`] lists for that provider;
//! 4. on success record health and return, flagged as a failover if an
//!    earlier provider failed;
//! 5. on failure let the policy decide: retry the same provider after a
//!    delay, fall over to the next-best untried provider, or give up with
//!    `all_providers_failed`.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Gateway`] | entry point: `process`, `process_batch`, diagnostics |
//! | [`GatewayBuilder`] | explicit wiring of adapters, tables, cache, limits |
//! | [`ProcessOptions`] | per-submission strategy, provider, cache, timeout |
//! | [`ModelTable`] | model name per (task type, provider) |
//!
//! ```rust,no_run
//! use ai_gateway::{Gateway, GatewayConfig, ProcessOptions};
//!
//! # async fn run() -> ai_gateway::Result<()> {
//! let gateway = Gateway::from_config(GatewayConfig::from_env()?)?;
//! let response = gateway
//!     .process("code-generation", "Write a binary search in Rust", &ProcessOptions::new())
//!     .await;
//! if let Some(text) = response.text() {
//!     println!("{} via {}", text, response.provider);
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod core;
mod models;
mod options;
mod policy;

pub use builder::GatewayBuilder;
pub use core::{Gateway, ProviderInfo};
pub use models::ModelTable;
pub use options::ProcessOptions;
