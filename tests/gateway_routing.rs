//! End-to-end routing behaviour through scripted adapters.

use ai_gateway::config::RetrySettings;
use ai_gateway::provider::ScriptedProvider;
use ai_gateway::resilience::RateLimiterConfig;
use ai_gateway::routing::{Priorities, PriorityTable};
use ai_gateway::{
    ErrorKind, Gateway, GatewayBuilder, GatewayConfig, HealthMonitor, ProcessOptions, Provider,
    SelectionStrategy,
};
use std::sync::Arc;

fn config(max_retries: u32) -> GatewayConfig {
    GatewayConfig {
        retry: RetrySettings {
            max_retries,
            delay_ms: 1,
            max_delay_ms: 1,
        },
        ..Default::default()
    }
}

fn table(task_type: &str, rows: &[(&str, i64)]) -> PriorityTable {
    let row: Priorities = rows.iter().map(|(p, v)| (p.to_string(), *v)).collect();
    PriorityTable::empty().with_task(task_type, row)
}

fn gateway(
    cfg: GatewayConfig,
    priorities: PriorityTable,
    providers: &[Arc<ScriptedProvider>],
) -> Gateway {
    let mut builder = GatewayBuilder::with_config(cfg).with_priorities(priorities);
    for p in providers {
        let name = p.name().to_string();
        builder = builder
            .with_provider(p.clone())
            .with_provider_model(&name, "test-model");
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn test_priority_table_decides_between_equal_health() {
    let openai = Arc::new(ScriptedProvider::new("openai"));
    let anthropic = Arc::new(ScriptedProvider::new("anthropic"));
    let gw = gateway(
        config(0),
        table("text-generation", &[("openai", 90), ("anthropic", 80)]),
        &[anthropic.clone(), openai.clone()],
    );

    let r = gw
        .process("text-generation", "hello there", &ProcessOptions::new())
        .await;
    assert!(r.success);
    assert_eq!(r.provider, "openai");
    assert_eq!(openai.calls(), 1);
    assert_eq!(anthropic.calls(), 0);
}

#[tokio::test]
async fn test_retryable_error_retries_same_provider_first() {
    let primary = Arc::new(
        ScriptedProvider::new("primary")
            .then_fail(ErrorKind::ServerError, "500")
            .then_fail(ErrorKind::Timeout, "slow"),
    );
    let secondary = Arc::new(ScriptedProvider::new("secondary"));
    let gw = gateway(
        config(3),
        table("text-generation", &[("primary", 90), ("secondary", 10)]),
        &[primary.clone(), secondary.clone()],
    );

    let r = gw.process("text-generation", "hi", &ProcessOptions::new()).await;
    assert!(r.success);
    assert_eq!(r.provider, "primary");
    assert!(r.was_retry);
    assert!(!r.was_failover);
    assert_eq!(primary.calls(), 3);
    assert_eq!(secondary.calls(), 0);

    let retries: Vec<u32> = primary.requests().iter().map(|r| r.retry_count).collect();
    assert_eq!(retries, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_severe_error_falls_back_despite_retry_budget() {
    let primary = Arc::new(
        ScriptedProvider::new("primary").then_fail(ErrorKind::ContextLengthExceeded, "too long"),
    );
    let secondary = Arc::new(ScriptedProvider::new("secondary").always_succeed("from secondary"));
    let gw = gateway(
        config(5),
        table("text-generation", &[("primary", 90), ("secondary", 10)]),
        &[primary.clone(), secondary.clone()],
    );

    let r = gw.process("text-generation", "hi", &ProcessOptions::new()).await;
    assert!(r.success);
    assert!(r.was_failover);
    assert_eq!(r.provider, "secondary");
    assert_eq!(r.text(), Some("from secondary"));
    assert_eq!(primary.calls(), 1);
}

#[tokio::test]
async fn test_exhausted_chain_returns_sentinel() {
    let a = Arc::new(ScriptedProvider::new("a").always_fail(ErrorKind::RateLimit, "429"));
    let b = Arc::new(ScriptedProvider::new("b").always_fail(ErrorKind::NetworkError, "reset"));
    let gw = gateway(config(1), PriorityTable::empty(), &[a.clone(), b.clone()]);

    let r = gw.process("text-generation", "hi", &ProcessOptions::new()).await;
    assert!(!r.success);
    assert_eq!(r.error_type, Some(ErrorKind::AllProvidersFailed));
    assert_eq!(r.provider, "none");
    assert_eq!(
        r.error.as_deref(),
        Some("All AI services failed for task type text-generation")
    );
    assert_eq!(a.calls(), 2);
    assert_eq!(b.calls(), 2);
}

#[tokio::test]
async fn test_batch_keeps_order_and_flags_only_failover_item() {
    let primary = Arc::new(
        ScriptedProvider::new("primary")
            .then_succeed("one")
            .then_fail(ErrorKind::ModelUnavailable, "out of memory")
            .then_succeed("three"),
    );
    let secondary = Arc::new(ScriptedProvider::new("secondary").always_succeed("two"));
    let gw = gateway(
        config(2),
        table("text-generation", &[("primary", 90), ("secondary", 10)]),
        &[primary.clone(), secondary.clone()],
    );

    let results = gw
        .process_batch("text-generation", &["a", "b", "c"], &ProcessOptions::new())
        .await;
    assert_eq!(results.len(), 3);
    let texts: Vec<Option<&str>> = results.iter().map(|r| r.text()).collect();
    assert_eq!(texts, vec![Some("one"), Some("two"), Some("three")]);
    let failovers: Vec<bool> = results.iter().map(|r| r.was_failover).collect();
    assert_eq!(failovers, vec![false, true, false]);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn test_cached_response_skips_providers() {
    let p = Arc::new(ScriptedProvider::new("p"));
    let gw = gateway(config(0), PriorityTable::empty(), &[p.clone()]);
    let opts = ProcessOptions::new().with_cache(true);

    let first = gw.process("text-generation", "What is Rust?", &opts).await;
    assert!(first.success);
    assert!(!first.from_cache);
    assert_eq!(p.calls(), 1);

    // surrounding whitespace hits the same entry
    let second = gw.process("text-generation", "  What is Rust?  ", &opts).await;
    assert!(second.success);
    assert!(second.from_cache);
    assert_eq!(second.text(), first.text());
    assert_eq!(p.calls(), 1);

    let stats = gw.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.sets, 1);
}

#[tokio::test]
async fn test_cache_keeps_prompts_differing_in_case_apart() {
    let p = Arc::new(ScriptedProvider::new("p"));
    let gw = gateway(config(0), PriorityTable::empty(), &[p.clone()]);
    let opts = ProcessOptions::new().with_cache(true);

    let upper = gw.process("code-generation", "declare Foo", &opts).await;
    let lower = gw.process("code-generation", "declare foo", &opts).await;
    assert!(upper.success && lower.success);
    assert!(!upper.from_cache && !lower.from_cache);
    assert_eq!(p.calls(), 2);
    let inputs: Vec<String> = p.requests().into_iter().map(|r| r.prompt).collect();
    assert_eq!(inputs, vec!["declare Foo", "declare foo"]);

    let stats = gw.cache_stats().await;
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.sets, 2);
}

#[tokio::test]
async fn test_identical_requests_without_cache_dispatch_twice() {
    let p = Arc::new(ScriptedProvider::new("p"));
    let gw = gateway(config(0), PriorityTable::empty(), &[p.clone()]);
    let opts = ProcessOptions::new();

    let a = gw.process("text-generation", "same", &opts).await;
    let b = gw.process("text-generation", "same", &opts).await;
    assert!(a.success && b.success);
    assert!(!a.from_cache && !b.from_cache);
    assert_eq!(p.calls(), 2);
    assert_eq!(
        gw.health_monitor().health("p").map(|h| h.recent_requests),
        Some(2)
    );
}

#[tokio::test]
async fn test_round_robin_rotates_through_all_candidates() {
    let providers: Vec<Arc<ScriptedProvider>> = ["a", "b", "c"]
        .iter()
        .map(|n| Arc::new(ScriptedProvider::new(*n)))
        .collect();
    let gw = gateway(config(0), PriorityTable::empty(), &providers);
    let opts = ProcessOptions::new().with_strategy(SelectionStrategy::RoundRobin);

    let mut picked = Vec::new();
    for _ in 0..6 {
        picked.push(gw.process("text-generation", "x", &opts).await.provider);
    }
    assert_eq!(picked, vec!["a", "b", "c", "a", "b", "c"]);
}

#[tokio::test]
async fn test_unhealthy_provider_is_avoided_then_recovers() {
    let flaky = Arc::new(ScriptedProvider::new("flaky"));
    let steady = Arc::new(ScriptedProvider::new("steady"));
    let gw = gateway(
        config(0),
        table("text-generation", &[("flaky", 90), ("steady", 10)]),
        &[flaky.clone(), steady.clone()],
    );

    let health = gw.health_monitor();
    for _ in 0..5 {
        health.update("flaky", false, None, Some(ErrorKind::ServerError));
    }
    assert!(!health.health("flaky").unwrap().available);

    let r = gw.process("text-generation", "x", &ProcessOptions::new()).await;
    assert_eq!(r.provider, "steady");
    assert_eq!(flaky.calls(), 0);

    gw.reset_health();
    let r = gw.process("text-generation", "x", &ProcessOptions::new()).await;
    assert_eq!(r.provider, "flaky");
}

#[test]
fn test_health_window_invariants() {
    let monitor = HealthMonitor::new();
    for i in 0..350u32 {
        let h = monitor.update("p", i % 3 != 0, Some(u64::from(i % 40)), None);
        assert!(h.recent_errors <= h.recent_requests);
        assert!(h.recent_requests <= 100);
        if h.recent_requests >= 5 {
            assert!((h.success_rate + h.error_rate - 1.0).abs() < 1e-9);
        }
        let expect_down = h.recent_requests >= 5 && h.error_rate > 0.8;
        assert_eq!(h.available, !expect_down);
    }
}

#[tokio::test]
async fn test_explicit_provider_is_honoured() {
    let a = Arc::new(ScriptedProvider::new("a"));
    let b = Arc::new(ScriptedProvider::new("b"));
    let gw = gateway(
        config(0),
        table("text-generation", &[("a", 90), ("b", 10)]),
        &[a.clone(), b.clone()],
    );

    let r = gw
        .process("text-generation", "x", &ProcessOptions::new().with_provider("b"))
        .await;
    assert_eq!(r.provider, "b");
    assert_eq!(a.calls(), 0);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn test_empty_task_type_uses_configured_default() {
    let p = Arc::new(ScriptedProvider::new("p"));
    let gw = gateway(config(0), PriorityTable::empty(), &[p.clone()]);

    let r = gw.process("", "x", &ProcessOptions::new()).await;
    assert!(r.success);
    assert_eq!(gw.config().default_task_type, "text-generation");
}

#[tokio::test]
async fn test_provider_listing_probes_each_adapter() {
    let up = Arc::new(ScriptedProvider::new("up"));
    let down = Arc::new(ScriptedProvider::new("down").unavailable());
    let gw = gateway(config(0), PriorityTable::empty(), &[up, down.clone()]);

    let infos = gw.providers().await;
    let states: Vec<(&str, bool)> = infos
        .iter()
        .map(|i| (i.name.as_str(), i.available))
        .collect();
    assert_eq!(states, vec![("up", true), ("down", false)]);
    assert!(!down.is_available().await);
}

#[test]
fn test_empty_rate_limit_bucket_is_rejected_at_build() {
    let err = GatewayBuilder::with_config(config(0))
        .with_provider(Arc::new(ScriptedProvider::new("p")))
        .with_rate_limit("p", RateLimiterConfig::new().with_capacity(0))
        .build()
        .err()
        .expect("capacity 0 must not build");
    assert!(matches!(err, ai_gateway::Error::Validation { .. }));
    assert!(err.to_string().contains("capacity"));

    assert!(GatewayBuilder::with_config(config(0))
        .with_provider(Arc::new(ScriptedProvider::new("p")))
        .with_rate_limit("p", RateLimiterConfig::new().with_capacity(1))
        .build()
        .is_ok());
}
