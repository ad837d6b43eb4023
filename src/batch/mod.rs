//! 批处理模块：对一组输入逐项执行并按输入顺序返回结果。
//!
//! # Batch Execution
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`BatchExecutor`] | runs one job per item, output order = input order |
//! | [`BatchExecutorConfig`] | execution strategy |
//! | [`BatchStrategy`] | `Sequential` (default), `Parallel`, `Concurrent { max_concurrency }` |
//!
//! A failing item never aborts its siblings: jobs return values, not errors.

mod executor;

pub use executor::{BatchExecutor, BatchExecutorConfig, BatchStrategy};
