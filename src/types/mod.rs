//! 类型系统模块：定义网关在适配器与调用方之间传递的核心数据类型。
//!
//! # Types Module
//!
//! Value types that flow through the gateway.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CompletionRequest`] | One attempt against one provider |
//! | [`CompletionResult`] | Adapter outcome, success or classified failure |
//! | [`AiResponse`] | Caller-facing response returned by the gateway |
//!
//! Task types are plain strings; the well-known ones live in [`task`].
//!
//! ```rust
//! use ai_gateway::types::{quality_score, CompletionRequest};
//!
//! let req = CompletionRequest::new("Explain borrowing", "llama3").with_max_tokens(256);
//! assert_eq!(req.max_tokens, Some(256));
//! assert!(quality_score("```rust\nfn main() {}\n```") > 1.0);
//! ```

mod request;
mod response;
mod result;

pub use request::CompletionRequest;
pub use response::AiResponse;
pub(crate) use response::NONE;
pub use result::{quality_score, CompletionResult};

/// Well-known task type names.
pub mod task {
    pub const TEXT_GENERATION: &str = "text-generation";
    pub const CODE_GENERATION: &str = "code-generation";
    pub const DECISION_MAKING: &str = "decision-making";
    /// Row used for any task type without its own table entry.
    pub const DEFAULT: &str = "default";
}
