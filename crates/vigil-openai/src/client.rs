// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenAI Chat Completions API.
//!
//! Provides [`OpenAiClient`], which handles authentication, a single retry
//! on transient errors, and extraction of the first choice's content.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};
use vigil_config::OpenAiConfig;
use vigil_core::VigilError;

use crate::types::{ApiErrorResponse, ChatRequest, ChatResponse};

/// Environment variable consulted when `openai.api_key` is unset.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// HTTP client for chat completions.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

impl OpenAiClient {
    /// Creates a client for `{base_url}/chat/completions`.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, VigilError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| VigilError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| VigilError::Inference {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            max_retries: 1,
        })
    }

    /// Creates a client from the `[openai]` section, falling back to
    /// `OPENAI_API_KEY` for the key.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self, VigilError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                VigilError::Config(format!("openai.api_key is required (or set {API_KEY_ENV})"))
            })?;
        Self::new(
            api_key.trim(),
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }

    /// Sends a completion request and returns the first choice's text.
    ///
    /// On transient errors (429, 500, 503), retries once after a 1-second delay.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, VigilError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, model = %request.model, "retrying completion request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(request)
                .send()
                .await
                .map_err(|e| VigilError::Inference {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, model = %request.model, "completion response received");

            if status.is_success() {
                let body: ChatResponse =
                    response
                        .json()
                        .await
                        .map_err(|e| VigilError::MalformedResponse {
                            message: format!("failed to parse completion response: {e}"),
                        })?;
                return body
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or_else(|| VigilError::MalformedResponse {
                        message: "completion response had no content".into(),
                    });
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(VigilError::inference(format!("API returned {status}: {body}")));
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "OpenAI API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or("unknown"),
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(VigilError::inference(message));
        }

        Err(last_error
            .unwrap_or_else(|| VigilError::inference("completion request failed after retries")))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new("sk-test", base_url, Duration::from_secs(5)).unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest::new("gpt-test", "be brief", "hello".into(), 0.0)
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hi")))
            .mount(&server)
            .await;

        let text = test_client(&server.uri()).complete(&request()).await.unwrap();
        assert_eq!(text, "hi");
    }

    #[tokio::test]
    async fn complete_retries_once_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("after retry")))
            .mount(&server)
            .await;

        let text = test_client(&server.uri()).complete(&request()).await.unwrap();
        assert_eq!(text, "after retry");
    }

    #[tokio::test]
    async fn complete_gives_up_after_second_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"type": "server_error", "message": "overloaded"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .complete(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, VigilError::Inference { .. }));
        assert!(err.to_string().contains("overloaded"), "got: {err}");
    }

    #[tokio::test]
    async fn complete_does_not_retry_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "bad model"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .complete(&request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .complete(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, VigilError::MalformedResponse { .. }));
    }

    #[test]
    fn config_key_is_required_when_env_is_unset() {
        let config = OpenAiConfig {
            api_key: Some("  ".into()),
            ..OpenAiConfig::default()
        };
        // A blank configured key never falls through to the environment.
        let result = OpenAiClient::from_config(&config);
        assert!(matches!(result, Err(VigilError::Config(_))));
    }
}
