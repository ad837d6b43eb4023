//! Model names per (task type, provider).

use crate::config::{ANTHROPIC, LMSTUDIO, LOCAL, OLLAMA, OPENAI};
use crate::types::task;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type ModelRow = BTreeMap<String, String>;

/// Which model a provider runs for a task type. Unknown task types use the
/// `default` row; a provider missing from the chosen row has no model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTable {
    rows: BTreeMap<String, ModelRow>,
}

fn row(entries: &[(&str, &str)]) -> ModelRow {
    entries
        .iter()
        .map(|(p, m)| (p.to_string(), m.to_string()))
        .collect()
}

impl Default for ModelTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelTable {
    pub fn empty() -> Self {
        Self {
            rows: BTreeMap::from([(task::DEFAULT.to_string(), ModelRow::new())]),
        }
    }

    pub fn builtin() -> Self {
        let large = |local_code: &str| {
            row(&[
                (OPENAI, "gpt-4"),
                (ANTHROPIC, "claude-3-opus-20240229"),
                (OLLAMA, local_code),
                (LMSTUDIO, "openchat"),
                (LOCAL, "gpt4all"),
            ])
        };
        let rows = BTreeMap::from([
            (task::TEXT_GENERATION.to_string(), large("llama3")),
            (task::CODE_GENERATION.to_string(), large("codellama")),
            (task::DECISION_MAKING.to_string(), large("llama3")),
            (
                task::DEFAULT.to_string(),
                row(&[
                    (OPENAI, "gpt-3.5-turbo"),
                    (ANTHROPIC, "claude-3-haiku-20240307"),
                    (OLLAMA, "llama3"),
                    (LMSTUDIO, "openchat"),
                    (LOCAL, "gpt4all"),
                ]),
            ),
        ]);
        Self { rows }
    }

    pub fn with_model(
        mut self,
        task_type: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.set_model(task_type, provider, model);
        self
    }

    pub fn set_model(
        &mut self,
        task_type: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) {
        self.rows
            .entry(task_type.into())
            .or_default()
            .insert(provider.into(), model.into());
    }

    /// Uses `model` for `provider` in every row, including the default.
    pub fn set_model_for_all(&mut self, provider: &str, model: &str) {
        for row in self.rows.values_mut() {
            row.insert(provider.to_string(), model.to_string());
        }
    }

    pub fn model_for(&self, provider: &str, task_type: &str) -> Option<&str> {
        self.rows
            .get(task_type)
            .or_else(|| self.rows.get(task::DEFAULT))
            .and_then(|row| row.get(provider))
            .map(String::as_str)
    }

    /// Distinct models `provider` runs across all task types, first seen first.
    pub fn models_of(&self, provider: &str) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for row in self.rows.values() {
            if let Some(model) = row.get(provider) {
                if !models.contains(model) {
                    models.push(model.clone());
                }
            }
        }
        models
    }
}
