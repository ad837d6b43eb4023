//! Cache key generation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    pub task_type: Option<String>,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            task_type: None,
        }
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Fingerprints a submission as (task type, normalized input, options).
///
/// Surrounding whitespace is trimmed from the input; case is kept, so
/// `"Hello "` and `"Hello"` share an entry but `"hello"` does not.
/// Options are hashed in key order; unset options are left out.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn generate<'a, I>(&self, task_type: &str, input: &str, options: I) -> CacheKey
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        let mut parts: BTreeMap<&str, String> = options.into_iter().collect();
        parts.insert("task_type", task_type.to_string());
        parts.insert("input", normalize_input(input));
        if let Some(ref s) = self.salt {
            parts.insert("salt", s.clone());
        }
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey::new(hash).with_task_type(task_type)
    }
}

fn normalize_input(input: &str) -> String {
    input.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none() -> Vec<(&'static str, String)> {
        Vec::new()
    }

    #[test]
    fn test_input_is_trimmed() {
        let gen = CacheKeyGenerator::new();
        let a = gen.generate("text-generation", "  Hello World ", none());
        let b = gen.generate("text-generation", "Hello World", none());
        assert_eq!(a, b);
        assert_eq!(a.hash.len(), 64);
    }

    #[test]
    fn test_case_changes_key() {
        let gen = CacheKeyGenerator::new();
        let upper = gen.generate("code-generation", "declare Foo", none());
        let lower = gen.generate("code-generation", "declare foo", none());
        assert_ne!(upper, lower);
    }

    #[test]
    fn test_task_and_options_change_key() {
        let gen = CacheKeyGenerator::new();
        let base = gen.generate("text-generation", "hi", none());
        assert_ne!(base, gen.generate("code-generation", "hi", none()));
        assert_ne!(
            base,
            gen.generate("text-generation", "hi", [("strategy", "ROUND_ROBIN".to_string())])
        );
        assert_ne!(base, CacheKeyGenerator::new().with_salt("v2").generate("text-generation", "hi", none()));
    }
}
