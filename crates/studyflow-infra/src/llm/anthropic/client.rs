//! AnthropicProvider -- concrete [`LlmProvider`] implementation for Anthropic Claude.
//!
//! Sends non-streaming requests to the Messages API (`/v1/messages`).
//! Structured calls forward `output_config` so the response is constrained
//! to the step's JSON schema.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use studyflow_core::llm::provider::LlmProvider;
use studyflow_types::llm::{CompletionRequest, CompletionResponse, LlmError, StopReason, Usage};

use super::types::{
    AnthropicContentBlock, AnthropicMessage, AnthropicNonStreamResponse, AnthropicRequest,
    ErrorPayload,
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic Claude model provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl AnthropicProvider {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(api_key: SecretString) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Override the base URL (proxies, local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn to_anthropic_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            messages,
            system: request.system.clone(),
            stream: false,
            temperature: request.temperature,
            stop_sequences: request.stop_sequences.clone(),
            output_config: request.output_config.clone(),
        }
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorPayload>(body)
        .map(|p| format!("{}: {}", p.error.error_type, p.error.message))
        .unwrap_or_else(|_| body.to_string())
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs * 1000)
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.to_anthropic_request(request);
        let url = self.url("/v1/messages");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = parse_retry_after(response.headers());
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                400 => LlmError::InvalidRequest(error_message(&error_body)),
                401 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited { retry_after_ms },
                529 => LlmError::Overloaded(error_message(&error_body)),
                _ => LlmError::Provider {
                    message: format!("HTTP {status}: {}", error_message(&error_body)),
                },
            });
        }

        let anthropic_resp: AnthropicNonStreamResponse = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        let content = anthropic_resp
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let stop_reason = anthropic_resp
            .stop_reason
            .as_deref()
            .and_then(|s| s.parse::<StopReason>().ok())
            .unwrap_or(StopReason::EndTurn);

        tracing::debug!(
            gen_ai.response.id = %anthropic_resp.id,
            gen_ai.usage.input_tokens = anthropic_resp.usage.input_tokens,
            gen_ai.usage.output_tokens = anthropic_resp.usage.output_tokens,
            "anthropic completion received"
        );

        Ok(CompletionResponse {
            id: anthropic_resp.id,
            content,
            model: anthropic_resp.model,
            stop_reason,
            usage: Usage {
                input_tokens: anthropic_resp.usage.input_tokens,
                output_tokens: anthropic_resp.usage.output_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use studyflow_types::llm::Message;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            messages: vec![Message::user("Hello")],
            system: Some("Be brief".to_string()),
            max_tokens: 64,
            temperature: Some(0.2),
            stop_sequences: None,
            output_config: None,
        }
    }

    /// Serve a single fixed response on `/v1/messages` and return the base URL.
    async fn serve(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route(
            "/v1/messages",
            post(move |headers: HeaderMap| async move {
                if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
                    return (StatusCode::UNAUTHORIZED, "{}");
                }
                (status, body)
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn provider(base_url: &str) -> AnthropicProvider {
        AnthropicProvider::new(SecretString::from("test-key"))
            .unwrap()
            .with_base_url(base_url)
    }

    #[test]
    fn request_conversion_keeps_output_config() {
        let mut req = request();
        req.output_config = Some(studyflow_types::llm::OutputConfig {
            format: studyflow_types::llm::OutputFormat {
                type_field: "json_schema".to_string(),
                json_schema: studyflow_types::llm::OutputJsonSchema {
                    name: "Quiz".to_string(),
                    schema: serde_json::json!({"type": "object"}),
                    strict: Some(true),
                },
            },
        });
        let body = provider(DEFAULT_BASE_URL).to_anthropic_request(&req);
        assert!(!body.stream);
        assert_eq!(body.messages[0].role, "user");
        assert_eq!(body.output_config, req.output_config);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let p = provider("http://localhost:8080/");
        assert_eq!(p.url("/v1/messages"), "http://localhost:8080/v1/messages");
    }

    #[tokio::test]
    async fn completes_text_response() {
        let base = serve(
            StatusCode::OK,
            r#"{"id":"msg_1","model":"claude-sonnet-4-20250514","content":[{"type":"text","text":"Hi "},{"type":"text","text":"there"}],"stop_reason":"max_tokens","usage":{"input_tokens":5,"output_tokens":2}}"#,
        )
        .await;

        let resp = provider(&base).complete(&request()).await.unwrap();
        assert_eq!(resp.content, "Hi there");
        assert_eq!(resp.stop_reason, StopReason::MaxTokens);
        assert_eq!(resp.usage.input_tokens, 5);
    }

    #[tokio::test]
    async fn maps_error_statuses() {
        let base = serve(StatusCode::OK, "{}").await;
        let wrong_key = AnthropicProvider::new(SecretString::from("nope"))
            .unwrap()
            .with_base_url(&base);
        assert!(matches!(
            wrong_key.complete(&request()).await.unwrap_err(),
            LlmError::AuthenticationFailed
        ));

        let base = serve(StatusCode::TOO_MANY_REQUESTS, "{}").await;
        assert!(matches!(
            provider(&base).complete(&request()).await.unwrap_err(),
            LlmError::RateLimited { .. }
        ));

        let base = serve(
            StatusCode::from_u16(529).unwrap(),
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .await;
        match provider(&base).complete(&request()).await.unwrap_err() {
            LlmError::Overloaded(msg) => assert!(msg.contains("overloaded_error")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_deserialization_error() {
        let base = serve(StatusCode::OK, "not json").await;
        assert!(matches!(
            provider(&base).complete(&request()).await.unwrap_err(),
            LlmError::Deserialization(_)
        ));
    }
}
