//! Strategy-driven provider selection.

use super::priority::PriorityTable;
use super::score::selection_score;
use super::SelectionStrategy;
use crate::error_kind::ErrorKind;
use crate::health::HealthMonitor;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ranks registered providers for a task type under a [`SelectionStrategy`].
///
/// Candidates are the registered providers minus any excluded names. Providers
/// the health monitor currently marks unavailable are skipped while at least
/// one healthy candidate remains.
pub struct ProviderSelector {
    providers: Vec<String>,
    health: Arc<HealthMonitor>,
    table: PriorityTable,
    strategy_tables: HashMap<SelectionStrategy, PriorityTable>,
    round_robin: AtomicUsize,
}

impl ProviderSelector {
    /// `providers` is the registration order; it breaks score ties and fixes
    /// the round-robin rotation.
    pub fn new(providers: Vec<String>, health: Arc<HealthMonitor>, table: PriorityTable) -> Self {
        for name in &providers {
            health.initialize(name);
        }
        Self {
            providers,
            health,
            table,
            strategy_tables: HashMap::new(),
            round_robin: AtomicUsize::new(0),
        }
    }

    /// Feeds `strategy` from its own table instead of the shared one
    /// (e.g., a cost table for [`SelectionStrategy::CostOptimized`]).
    pub fn with_strategy_table(mut self, strategy: SelectionStrategy, table: PriorityTable) -> Self {
        self.strategy_tables.insert(strategy, table);
        self
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    pub fn priority_table(&self) -> &PriorityTable {
        &self.table
    }

    fn table_for(&self, strategy: SelectionStrategy) -> &PriorityTable {
        self.strategy_tables.get(&strategy).unwrap_or(&self.table)
    }

    fn candidates(&self, exclude: &[String]) -> Vec<String> {
        let remaining: Vec<String> = self
            .providers
            .iter()
            .filter(|p| !exclude.contains(p))
            .cloned()
            .collect();

        let healthy: Vec<String> = remaining
            .iter()
            .filter(|p| self.health.health(p).map_or(true, |h| h.available))
            .cloned()
            .collect();

        if healthy.is_empty() && !remaining.is_empty() {
            warn!(
                candidates = remaining.len(),
                "no healthy providers left, considering degraded ones"
            );
            remaining
        } else {
            healthy
        }
    }

    /// Full candidate ordering for `strategy`, best first.
    ///
    /// For round robin this is the rotation starting at the provider the next
    /// [`select_best`](Self::select_best) call would return; it does not
    /// advance the rotation.
    pub fn alternatives(
        &self,
        task_type: &str,
        strategy: SelectionStrategy,
        retry_count: u32,
        exclude: &[String],
    ) -> Vec<String> {
        let candidates = self.candidates(exclude);
        if candidates.is_empty() {
            return Vec::new();
        }

        if strategy == SelectionStrategy::RoundRobin {
            let start = self.round_robin.load(Ordering::Relaxed) % candidates.len();
            return candidates[start..]
                .iter()
                .chain(candidates[..start].iter())
                .cloned()
                .collect();
        }

        self.rank(task_type, strategy, retry_count, &candidates)
    }

    fn rank(
        &self,
        task_type: &str,
        strategy: SelectionStrategy,
        retry_count: u32,
        candidates: &[String],
    ) -> Vec<String> {
        let priorities = self.table_for(strategy).priorities(task_type);
        let mut ranked = self.health.rank(candidates, |h| {
            let priority = priorities.get(&h.name).copied().unwrap_or(0);
            selection_score(h, priority, retry_count)
        });

        if strategy == SelectionStrategy::LoadBalanced {
            ranked.sort_by_key(|h| h.recent_requests);
        }
        ranked.into_iter().map(|h| h.name).collect()
    }

    /// Best provider for the task, or `None` when nothing remains after exclusion.
    pub fn select_best(
        &self,
        task_type: &str,
        strategy: SelectionStrategy,
        retry_count: u32,
        exclude: &[String],
    ) -> Option<String> {
        let candidates = self.candidates(exclude);
        if candidates.is_empty() {
            warn!(task_type, strategy = strategy.as_str(), "no providers available");
            return None;
        }

        let chosen = if strategy == SelectionStrategy::RoundRobin {
            let idx = self.round_robin.fetch_add(1, Ordering::Relaxed) % candidates.len();
            candidates.get(idx).cloned()
        } else {
            self.rank(task_type, strategy, retry_count, &candidates)
                .into_iter()
                .next()
        };

        if let Some(ref name) = chosen {
            debug!(provider = %name, task_type, strategy = strategy.as_str(), "provider selected");
        }
        chosen
    }

    /// Fallback-chain primitive: best provider other than `current`.
    pub fn select_next(
        &self,
        task_type: &str,
        current: &str,
        error_kind: ErrorKind,
        retry_count: u32,
    ) -> Option<String> {
        info!(
            failed = %current,
            error_kind = error_kind.as_str(),
            task_type,
            "selecting fallback provider"
        );
        self.select_best(
            task_type,
            SelectionStrategy::Fallback,
            retry_count,
            &[current.to_string()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::priority::Priorities;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn selector(providers: &[&str]) -> ProviderSelector {
        ProviderSelector::new(names(providers), Arc::new(HealthMonitor::new()), PriorityTable::builtin())
    }

    #[test]
    fn test_priority_picks_table_leader() {
        let s = selector(&["openai", "anthropic", "ollama"]);
        assert_eq!(
            s.select_best("text-generation", SelectionStrategy::Priority, 0, &[]).as_deref(),
            Some("anthropic")
        );
        assert_eq!(
            s.select_best("code-generation", SelectionStrategy::Priority, 0, &[]).as_deref(),
            Some("openai")
        );
    }

    #[test]
    fn test_exclusion_and_empty() {
        let s = selector(&["openai"]);
        assert_eq!(s.select_best("default", SelectionStrategy::Priority, 0, &names(&["openai"])), None);
        assert_eq!(s.select_next("default", "openai", ErrorKind::Timeout, 0), None);
    }

    #[test]
    fn test_select_next_excludes_current() {
        let s = selector(&["openai", "anthropic", "ollama"]);
        assert_eq!(
            s.select_next("code-generation", "openai", ErrorKind::ServerError, 1).as_deref(),
            Some("anthropic")
        );
    }

    #[test]
    fn test_unhealthy_provider_skipped() {
        let health = Arc::new(HealthMonitor::new());
        for _ in 0..5 {
            health.update("anthropic", false, None, None);
        }
        let s = ProviderSelector::new(names(&["anthropic", "openai"]), health, PriorityTable::builtin());
        assert_eq!(
            s.select_best("text-generation", SelectionStrategy::Priority, 0, &[]).as_deref(),
            Some("openai")
        );
        // only the unhealthy one left: degraded selection still returns it
        assert_eq!(
            s.select_best("text-generation", SelectionStrategy::Priority, 0, &names(&["openai"]))
                .as_deref(),
            Some("anthropic")
        );
    }

    #[test]
    fn test_round_robin_rotation() {
        let s = selector(&["a", "b", "c"]);
        let picks: Vec<_> = (0..6)
            .filter_map(|_| s.select_best("default", SelectionStrategy::RoundRobin, 0, &[]))
            .collect();
        assert_eq!(picks, names(&["a", "b", "c", "a", "b", "c"]));
    }

    #[test]
    fn test_round_robin_alternatives_do_not_advance() {
        let s = selector(&["a", "b", "c"]);
        s.select_best("default", SelectionStrategy::RoundRobin, 0, &[]);
        let alts = s.alternatives("default", SelectionStrategy::RoundRobin, 0, &[]);
        assert_eq!(alts, names(&["b", "c", "a"]));
        assert_eq!(
            s.select_best("default", SelectionStrategy::RoundRobin, 0, &[]).as_deref(),
            Some("b")
        );
    }

    #[test]
    fn test_load_balanced_prefers_least_used() {
        let health = Arc::new(HealthMonitor::new());
        for _ in 0..10 {
            health.update("openai", true, None, None);
        }
        health.update("ollama", true, None, None);
        let s = ProviderSelector::new(names(&["openai", "ollama", "local"]), health, PriorityTable::builtin());
        let alts = s.alternatives("default", SelectionStrategy::LoadBalanced, 0, &[]);
        assert_eq!(alts, names(&["local", "ollama", "openai"]));
    }

    #[test]
    fn test_strategy_table_override() {
        let mut cheap = Priorities::new();
        cheap.insert("local".to_string(), 100);
        let s = selector(&["openai", "local"]).with_strategy_table(
            SelectionStrategy::CostOptimized,
            PriorityTable::empty().with_task("default", cheap),
        );
        assert_eq!(
            s.select_best("default", SelectionStrategy::CostOptimized, 0, &[]).as_deref(),
            Some("local")
        );
        assert_eq!(
            s.select_best("default", SelectionStrategy::Priority, 0, &[]).as_deref(),
            Some("openai")
        );
    }
}
