//! Mock Ollama server setup for integration tests

use ai_gateway::provider::{OllamaConfig, OllamaProvider, SubstitutionPolicy};
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    /// Adapter config pointed at the mock server: fast retries, no
    /// load-test substitution.
    pub fn config(&self) -> OllamaConfig {
        OllamaConfig::new(&self.base_url)
            .with_retry(2, Duration::from_millis(1))
            .with_substitution(SubstitutionPolicy::disabled())
    }

    pub fn provider(&self, config: OllamaConfig) -> OllamaProvider {
        OllamaProvider::new(config).expect("client builds")
    }

    /// Successful non-streaming `/api/generate` reply.
    pub async fn mock_generate(&self, response: &str, expected_calls: usize) -> Mock {
        let body = serde_json::json!({
            "model": "llama3",
            "response": response,
            "done": true,
            "eval_count": 12
        });
        let mut server = self.server.lock().await;
        server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(expected_calls)
            .create_async()
            .await
    }

    /// `/api/generate` reply whose body must contain `partial`.
    pub async fn mock_generate_matching(&self, partial: serde_json::Value, response: &str) -> Mock {
        let body = serde_json::json!({ "response": response, "done": true });
        let mut server = self.server.lock().await;
        server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(partial))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// Error reply in Ollama's `{"error": "..."}` shape.
    pub async fn mock_generate_error(&self, status: usize, error: &str, expected_calls: usize) -> Mock {
        let body = serde_json::json!({ "error": error });
        let mut server = self.server.lock().await;
        server
            .mock("POST", "/api/generate")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(expected_calls)
            .create_async()
            .await
    }

    /// `/api/tags` listing the given model names.
    pub async fn mock_tags(&self, models: &[&str]) -> Mock {
        let entries: Vec<serde_json::Value> = models
            .iter()
            .map(|name| serde_json::json!({ "name": name }))
            .collect();
        let body = serde_json::json!({ "models": entries });
        let mut server = self.server.lock().await;
        server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }
}
