//! Ollama adapter against a mock HTTP server.

mod integration;

use ai_gateway::config::RetrySettings;
use ai_gateway::provider::{ScriptedProvider, SubstitutionPolicy};
use ai_gateway::routing::{Priorities, PriorityTable};
use ai_gateway::{CompletionRequest, ErrorKind, GatewayBuilder, GatewayConfig, ProcessOptions, Provider};
use integration::mock_server::MockServerFixture;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_generate_success() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture.mock_generate("Hello from llama", 1).await;
    let provider = fixture.provider(fixture.config());

    let result = provider
        .generate_completion(CompletionRequest::new("Say hello to the user, politely", "llama3"))
        .await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(result.text, "Hello from llama");
    assert_eq!(result.provider, "ollama");
    assert_eq!(result.total_tokens, Some(12));
    assert_eq!(result.finish_reason.as_deref(), Some("stop"));
    assert!(!result.was_retry);

    let status = provider.service_status().unwrap();
    assert_eq!(status.total_requests, 1);
    assert_eq!(status.successful_requests, 1);
    assert_eq!(status.active_requests, Some(0));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_model_is_not_retried() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_generate_error(404, "model 'ghost' not found, try pulling it first", 1)
        .await;
    let provider = fixture.provider(fixture.config());

    let result = provider
        .generate_completion(CompletionRequest::new("anything", "ghost"))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::ModelNotFound));
    assert!(result.error.unwrap_or_default().contains("not found"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_retried_inside_adapter() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture.mock_generate_error(500, "internal error", 3).await;
    let provider = fixture.provider(fixture.config());

    let result = provider
        .generate_completion(CompletionRequest::new("anything", "llama3"))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::ServerError));
    assert!(result.was_retry);
    assert_eq!(provider.service_status().unwrap().consecutive_failures, 3);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_consecutive_failures_mark_service_unavailable() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture.mock_generate_error(500, "internal error", 5).await;
    let provider = fixture.provider(fixture.config().with_retry(0, Duration::from_millis(1)));

    for _ in 0..5 {
        let r = provider
            .generate_completion(CompletionRequest::new("anything", "llama3"))
            .await;
        assert_eq!(r.error_kind, Some(ErrorKind::ServerError));
    }

    // sixth call never reaches the server
    let r = provider
        .generate_completion(CompletionRequest::new("anything", "llama3"))
        .await;
    assert_eq!(r.error_kind, Some(ErrorKind::ProviderUnavailable));
    assert!(r.error.unwrap_or_default().contains("internal error"));
    mock.assert_async().await;

    let status = provider.service_status().unwrap();
    assert_eq!(status.total_requests, 6);
    assert_eq!(status.successful_requests, 0);
    assert_eq!(status.consecutive_failures, 5);

    provider.reset_status();
    assert!(provider.service_status().unwrap().available);
}

#[tokio::test]
async fn test_probe_lists_models() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture.mock_tags(&["llama3:latest", "mistral:7b"]).await;
    let provider = fixture.provider(fixture.config());

    assert!(provider.is_model_available("anything"));
    assert!(provider.is_available().await);
    assert_eq!(provider.known_models(), vec!["llama3:latest", "mistral:7b"]);
    assert!(provider.is_model_available("llama3"));
    assert!(provider.is_model_available("mistral"));
    assert!(!provider.is_model_available("phi"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_probe_without_models_reports_unavailable() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture.mock_tags(&[]).await;
    let provider = fixture.provider(fixture.config());

    assert!(!provider.is_available().await);
}

#[tokio::test]
async fn test_load_test_request_uses_faster_model() {
    let fixture = MockServerFixture::new().await;
    let _tags = fixture.mock_tags(&["llama3:latest", "phi:latest"]).await;
    let generate = fixture
        .mock_generate_matching(
            serde_json::json!({ "model": "phi", "options": { "num_predict": 30 } }),
            "pong",
        )
        .await;
    let provider = fixture.provider(fixture.config().with_substitution(SubstitutionPolicy::default()));

    assert!(provider.is_available().await);
    let result = provider
        .generate_completion(CompletionRequest::new("TEST_LOAD ping", "llama3"))
        .await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(result.model, "phi");
    assert_eq!(result.text, "pong");
    generate.assert_async().await;
}

#[tokio::test]
async fn test_gateway_fails_over_from_rejected_ollama() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture.mock_generate_error(401, "unauthorized", 1).await;
    let ollama = Arc::new(fixture.provider(fixture.config()));
    let openai = Arc::new(ScriptedProvider::new("openai").always_succeed("remote answer"));

    let row: Priorities = [("ollama".to_string(), 90), ("openai".to_string(), 10)]
        .into_iter()
        .collect();
    let config = GatewayConfig {
        retry: RetrySettings {
            max_retries: 2,
            delay_ms: 1,
            max_delay_ms: 1,
        },
        ..Default::default()
    };
    let gateway = GatewayBuilder::with_config(config)
        .with_priorities(PriorityTable::empty().with_task("text-generation", row))
        .with_provider(ollama)
        .with_provider(openai.clone())
        .build()
        .unwrap();

    let r = gateway
        .process("text-generation", "Explain ownership in one paragraph", &ProcessOptions::new())
        .await;

    assert!(r.success);
    assert!(r.was_failover);
    assert_eq!(r.provider, "openai");
    assert_eq!(r.text(), Some("remote answer"));
    assert_eq!(openai.calls(), 1);
    assert_eq!(openai.requests()[0].model, "gpt-4");
    mock.assert_async().await;
}
