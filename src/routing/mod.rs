//! 路由模块：根据任务类型与策略为请求挑选提供方。
//!
//! # Provider Selection
//!
//! Pure selection logic: no network calls happen here. Health snapshots from
//! the [`HealthMonitor`](crate::health::HealthMonitor) and a per-task
//! [`PriorityTable`] feed [`selection_score`]; the chosen
//! [`SelectionStrategy`] decides how scores turn into an ordering.
//!
//! | Strategy | Ordering |
//! |----------|----------|
//! | `Priority` | descending score from the task's priority row |
//! | `CostOptimized`, `Performance`, `Fallback` | same mechanics; each may be fed its own table |
//! | `LoadBalanced` | score order, then ascending recent request count |
//! | `RoundRobin` | ignores scores; rotates through the candidate list |
//!
//! ```rust
//! use ai_gateway::routing::{PriorityTable, ProviderSelector, SelectionStrategy};
//! use ai_gateway::HealthMonitor;
//! use std::sync::Arc;
//!
//! let selector = ProviderSelector::new(
//!     vec!["openai".into(), "ollama".into()],
//!     Arc::new(HealthMonitor::new()),
//!     PriorityTable::builtin(),
//! );
//! let best = selector.select_best("code-generation", SelectionStrategy::Priority, 0, &[]);
//! assert_eq!(best.as_deref(), Some("openai"));
//! ```

mod priority;
mod score;
mod selector;

pub use priority::{Priorities, PriorityTable};
pub use score::{diagnostic_score, selection_score};
pub use selector::ProviderSelector;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionStrategy {
    #[default]
    Priority,
    CostOptimized,
    Performance,
    LoadBalanced,
    RoundRobin,
    Fallback,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Priority => "PRIORITY",
            Self::CostOptimized => "COST_OPTIMIZED",
            Self::Performance => "PERFORMANCE",
            Self::LoadBalanced => "LOAD_BALANCED",
            Self::RoundRobin => "ROUND_ROBIN",
            Self::Fallback => "FALLBACK",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = crate::Error;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PRIORITY" => Ok(Self::Priority),
            "COST_OPTIMIZED" | "COST" => Ok(Self::CostOptimized),
            "PERFORMANCE" => Ok(Self::Performance),
            "LOAD_BALANCED" => Ok(Self::LoadBalanced),
            "ROUND_ROBIN" => Ok(Self::RoundRobin),
            "FALLBACK" => Ok(Self::Fallback),
            other => Err(crate::Error::validation_with_context(
                format!("unknown selection strategy '{}'", other),
                crate::ErrorContext::new()
                    .with_field_path("strategy")
                    .with_details("expected one of PRIORITY, COST_OPTIMIZED, PERFORMANCE, LOAD_BALANCED, ROUND_ROBIN, FALLBACK"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("round-robin".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::RoundRobin);
        assert_eq!("LOAD_BALANCED".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::LoadBalanced);
        assert_eq!("cost".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::CostOptimized);
        assert!("fastest".parse::<SelectionStrategy>().is_err());
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&SelectionStrategy::CostOptimized).unwrap();
        assert_eq!(json, "\"COST_OPTIMIZED\"");
        assert_eq!(SelectionStrategy::default(), SelectionStrategy::Priority);
    }
}
