//! Gemini `generateContent` provider implementing [`CompletionProvider`].
//!
//! Non-streaming REST call with the API key as a query parameter. When a
//! response schema is supplied the request asks for `application/json`
//! output; otherwise plain text. One attempt per call, no retries.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::provider::{CompletionProvider, CompletionRequest, ProviderError, ProviderResult};

/// Default Gemini API root.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent as the `key` query parameter.
    pub api_key: String,
    /// Model identifier, e.g. `gemini-1.5-flash`.
    pub model: String,
    /// API root override, used by tests to point at a local double.
    pub base_url: Option<String>,
}

/// Gemini REST provider.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a provider with a fresh HTTP client.
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: GeminiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Build the `generateContent` endpoint URL (key included).
    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!(
            "{base}/v1beta/models/{model}:generateContent?key={key}",
            model = self.config.model,
            key = self.config.api_key,
        )
    }

    /// Build the request body from a [`CompletionRequest`].
    fn build_body(request: &CompletionRequest) -> Value {
        let mut generation_config = json!({
            "temperature": request.temperature,
            "topP": request.top_p,
        });
        if let Some(schema) = &request.response_schema {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = schema.clone();
        } else {
            generation_config["responseMimeType"] = json!("text/plain");
        }
        json!({
            "contents": [{"parts": [{"text": request.prompt}]}],
            "generationConfig": generation_config,
        })
    }

    /// Pull the first candidate's text out of a 2xx response body.
    ///
    /// The API nests text under `candidates[0].content.parts[*].text`;
    /// multiple parts are concatenated.
    fn extract_text(body: &Value) -> Option<String> {
        let parts = body
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Pull a human-readable message out of an error response body.
    fn extract_error_message(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")?
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| body.chars().take(200).collect())
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        let body = Self::build_body(request);
        debug!(
            prompt_chars = request.prompt.len(),
            structured = request.response_schema.is_some(),
            "sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = Self::extract_error_message(&text);
            warn!(status = status.as_u16(), %message, "provider error response");
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited { message });
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: Value = response.json().await.map_err(ProviderError::Http)?;
        Self::extract_text(&parsed).ok_or(ProviderError::EmptyResponse)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new(GeminiConfig {
            api_key: "test-key".into(),
            model: "gemini-1.5-flash".into(),
            base_url: Some(server.uri()),
        })
    }

    fn candidate_body(text: &str) -> Value {
        json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        })
    }

    // ── Request building ────────────────────────────────────────────────

    #[test]
    fn body_with_schema_asks_for_json() {
        let req = CompletionRequest::classification("classify", json!({"type": "object"}));
        let body = GeminiProvider::build_body(&req);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "object");
    }

    #[test]
    fn body_without_schema_asks_for_plain_text() {
        let req = CompletionRequest {
            prompt: "hi".into(),
            response_schema: None,
            temperature: 0.1,
            top_p: 0.2,
        };
        let body = GeminiProvider::build_body(&req);
        assert_eq!(body["generationConfig"]["responseMimeType"], "text/plain");
        assert!(body["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn endpoint_includes_model_and_key() {
        let provider = GeminiProvider::new(GeminiConfig {
            api_key: "k".into(),
            model: "m".into(),
            base_url: Some("http://localhost:1".into()),
        });
        assert_eq!(
            provider.endpoint(),
            "http://localhost:1/v1beta/models/m:generateContent?key=k"
        );
    }

    // ── Response parsing ────────────────────────────────────────────────

    #[test]
    fn extract_text_joins_parts() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]
        });
        assert_eq!(GeminiProvider::extract_text(&body).unwrap(), "ab");
    }

    #[test]
    fn extract_text_none_for_empty_candidates() {
        assert!(GeminiProvider::extract_text(&json!({"candidates": []})).is_none());
    }

    #[test]
    fn extract_error_message_prefers_api_shape() {
        let msg = GeminiProvider::extract_error_message(
            r#"{"error": {"code": 429, "message": "Resource exhausted"}}"#,
        );
        assert_eq!(msg, "Resource exhausted");
    }

    // ── Round trips ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn successful_completion_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("{\"intent\":\"food\"}")))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let out = provider
            .complete(&CompletionRequest::classification("q", json!({})))
            .await
            .unwrap();
        assert_eq!(out, "{\"intent\":\"food\"}");
    }

    #[tokio::test]
    async fn http_429_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": 429, "message": "quota exceeded"}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .complete(&CompletionRequest::classification("q", json!({})))
            .await
            .unwrap_err();
        assert_matches!(err, ProviderError::RateLimited { .. });
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn http_500_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .complete(&CompletionRequest::classification("q", json!({})))
            .await
            .unwrap_err();
        assert_matches!(err, ProviderError::Api { status: 500, .. });
        assert!(!err.is_quota());
    }

    #[tokio::test]
    async fn empty_candidates_map_to_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .complete(&CompletionRequest::classification("q", json!({})))
            .await
            .unwrap_err();
        assert_matches!(err, ProviderError::EmptyResponse);
    }
}
