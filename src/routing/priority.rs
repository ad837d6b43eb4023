//! Per-task priority tables.

use crate::types::task;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Priority per provider for one task type; higher is preferred.
pub type Priorities = BTreeMap<String, i64>;

/// Task type -> provider priorities, with a mandatory `default` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityTable {
    tables: BTreeMap<String, Priorities>,
}

fn row(entries: &[(&str, i64)]) -> Priorities {
    entries.iter().map(|(p, v)| (p.to_string(), *v)).collect()
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PriorityTable {
    /// Empty table whose default row is empty (every provider scores priority 0).
    pub fn empty() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(task::DEFAULT.to_string(), Priorities::new());
        Self { tables }
    }

    pub fn builtin() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(
            task::TEXT_GENERATION.to_string(),
            row(&[("anthropic", 90), ("openai", 80), ("ollama", 70), ("lmstudio", 60), ("local", 50)]),
        );
        tables.insert(
            task::CODE_GENERATION.to_string(),
            row(&[("openai", 90), ("anthropic", 80), ("ollama", 70), ("lmstudio", 60), ("local", 50)]),
        );
        tables.insert(
            task::DECISION_MAKING.to_string(),
            row(&[("openai", 90), ("anthropic", 85), ("ollama", 70), ("lmstudio", 60), ("local", 50)]),
        );
        tables.insert(
            task::DEFAULT.to_string(),
            row(&[("openai", 80), ("anthropic", 80), ("ollama", 70), ("lmstudio", 60), ("local", 50)]),
        );
        Self { tables }
    }

    /// Replaces (or adds) the row for `task_type`.
    pub fn with_task(mut self, task_type: impl Into<String>, priorities: Priorities) -> Self {
        self.tables.insert(task_type.into(), priorities);
        self
    }

    pub fn set_priority(&mut self, task_type: &str, provider: &str, priority: i64) {
        self.tables
            .entry(task_type.to_string())
            .or_default()
            .insert(provider.to_string(), priority);
    }

    /// Row for `task_type`, or the default row for unknown task types.
    pub fn priorities(&self, task_type: &str) -> &Priorities {
        match self.tables.get(task_type) {
            Some(row) => row,
            None => self
                .tables
                .get(task::DEFAULT)
                .unwrap_or_else(|| empty_row()),
        }
    }

    /// Priority of `provider` for `task_type`; providers missing from the row score 0.
    pub fn priority(&self, task_type: &str, provider: &str) -> i64 {
        self.priorities(task_type).get(provider).copied().unwrap_or(0)
    }

    pub fn task_types(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

fn empty_row() -> &'static Priorities {
    static EMPTY: once_cell::sync::Lazy<Priorities> = once_cell::sync::Lazy::new(Priorities::new);
    &EMPTY
}

impl From<BTreeMap<String, Priorities>> for PriorityTable {
    fn from(tables: BTreeMap<String, Priorities>) -> Self {
        let mut table = Self { tables };
        table.tables.entry(task::DEFAULT.to_string()).or_default();
        table
    }
}
