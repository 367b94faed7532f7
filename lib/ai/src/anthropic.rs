//! Anthropic Messages API backend.

use crate::backend::{
    LlmBackend, LlmBackendConfig, LlmMessage, LlmRequest, LlmResponse, MessageRole, TokenUsage,
    ToolCall,
};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// Pinned API version header value.
pub const API_VERSION: &str = "2023-06-01";

const PROVIDER: &str = "anthropic";
const FALLBACK_MAX_TOKENS: u32 = 1024;

/// Backend for Anthropic's `/v1/messages` endpoint.
#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl AnthropicBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidConfig`] if the API key is missing or the
    /// HTTP client cannot be built.
    pub fn new(config: &LlmBackendConfig) -> Result<Self, Report<LlmError>> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidConfig {
                reason: "an API key is required".to_string(),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = WireRequest::from_request(&self.model, request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "anthropic request rejected");
            return Err(status_error(status, retry_after_secs, &text));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParseFailed {
                reason: e.to_string(),
            })?;
        let parsed = wire.into_response();
        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            tool_calls = parsed.tool_calls.len(),
            "anthropic response received"
        );
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::ProviderUnavailable {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        }
    }
}

fn status_error(status: StatusCode, retry_after_secs: Option<u64>, body: &str) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimited { retry_after_secs };
    }
    let detail = serde_json::from_str::<WireErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string());
    LlmError::RequestFailed {
        reason: format!("HTTP {}: {detail}", status.as_u16()),
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Vec<WireBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock<'a> {
    Text {
        text: &'a str,
    },
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: &'a JsonValue,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a str,
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a JsonValue,
}

impl<'a> WireRequest<'a> {
    fn from_request(model: &'a str, request: &'a LlmRequest) -> Self {
        Self {
            model,
            max_tokens: request.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS),
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: request.messages.iter().map(WireMessage::from_message).collect(),
            tools: request
                .tools
                .iter()
                .map(|t| WireTool {
                    name: &t.name,
                    description: &t.description,
                    input_schema: &t.input_schema,
                })
                .collect(),
        }
    }
}

impl<'a> WireMessage<'a> {
    fn from_message(message: &'a LlmMessage) -> Self {
        let mut content = Vec::new();
        for output in &message.tool_outputs {
            content.push(WireBlock::ToolResult {
                tool_use_id: &output.tool_call_id,
                content: &output.content,
                is_error: output.is_error,
            });
        }
        if !message.content.is_empty() {
            content.push(WireBlock::Text {
                text: &message.content,
            });
        }
        for call in &message.tool_calls {
            content.push(WireBlock::ToolUse {
                id: &call.id,
                name: &call.name,
                input: &call.input,
            });
        }
        if content.is_empty() {
            content.push(WireBlock::Text {
                text: &message.content,
            });
        }
        Self {
            role: match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            },
            content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<ResponseBlock>,
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: JsonValue,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl WireResponse {
    fn into_response(self) -> LlmResponse {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in self.content {
            match block {
                ResponseBlock::Text { text: t } => text.push_str(&t),
                ResponseBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, input));
                }
                ResponseBlock::Other => {}
            }
        }
        LlmResponse {
            content: text,
            tool_calls,
            usage: TokenUsage {
                input_tokens: self.usage.input_tokens,
                output_tokens: self.usage.output_tokens,
            },
            model: self.model,
            stop_reason: self.stop_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ToolOutput;
    use crate::tool::ToolDefinition;
    use mockito::Matcher;
    use serde_json::json;

    const MODEL: &str = "claude-3-5-sonnet-20241022";

    fn backend(url: &str) -> AnthropicBackend {
        let config = LlmBackendConfig::anthropic("test-key", MODEL).with_base_url(url);
        AnthropicBackend::new(&config).expect("build backend")
    }

    #[test]
    fn missing_key_is_invalid_config() {
        let mut config = LlmBackendConfig::anthropic("", MODEL);
        assert!(AnthropicBackend::new(&config).is_err());
        config.api_key = None;
        let err = AnthropicBackend::new(&config).expect_err("no key");
        assert!(matches!(
            err.current_context(),
            LlmError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn wire_request_shape() {
        let mut request = LlmRequest::new("Human: hi\nAssistant:")
            .with_tools(vec![ToolDefinition::new("dummy", "echo")])
            .with_temperature(0.7)
            .with_max_tokens(1000);
        request.push(
            LlmMessage::assistant("").with_tool_calls(vec![ToolCall::new(
                "toolu_1",
                "dummy",
                json!({"query": "x"}),
            )]),
        );
        request.push(LlmMessage::tool_outputs(vec![ToolOutput::success(
            "toolu_1", "x",
        )]));

        let value = serde_json::to_value(WireRequest::from_request(MODEL, &request))
            .expect("serialize");
        assert_eq!(value["model"], MODEL);
        assert_eq!(value["max_tokens"], 1000);
        assert!(value.get("system").is_none());
        assert_eq!(value["tools"][0]["name"], "dummy");
        assert_eq!(
            value["messages"][0],
            json!({"role": "user", "content": [{"type": "text", "text": "Human: hi\nAssistant:"}]})
        );
        assert_eq!(value["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(value["messages"][2]["role"], "user");
        assert_eq!(
            value["messages"][2]["content"][0],
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "x", "is_error": false})
        );
    }

    #[tokio::test]
    async fn text_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", API_VERSION)
            .match_body(Matcher::PartialJson(json!({"model": MODEL})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "model": "claude-3-5-sonnet-20241022",
                "content": [
                    {"type": "text", "text": "Hello"},
                    {"type": "text", "text": " there"}
                ],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 12, "output_tokens": 3}
            }"#,
            )
            .create_async()
            .await;

        let response = backend(&server.url())
            .generate(&LlmRequest::new("hi"))
            .await
            .expect("generate");

        mock.assert_async().await;
        assert_eq!(response.content, "Hello there");
        assert!(!response.wants_tools());
        assert_eq!(response.usage.total(), 15);
        assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn tool_use_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "model": "claude-3-5-sonnet-20241022",
                "content": [
                    {"type": "thinking", "thinking": "..."},
                    {"type": "tool_use", "id": "toolu_9", "name": "dummy", "input": {"query": "ping"}}
                ],
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 20, "output_tokens": 8}
            }"#,
            )
            .create_async()
            .await;

        let response = backend(&server.url())
            .generate(&LlmRequest::new("hi"))
            .await
            .expect("generate");

        assert!(response.content.is_empty());
        assert_eq!(
            response.tool_calls,
            vec![ToolCall::new("toolu_9", "dummy", json!({"query": "ping"}))]
        );
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(429)
            .with_header("retry-after", "17")
            .with_body(r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#)
            .create_async()
            .await;

        let err = backend(&server.url())
            .generate(&LlmRequest::new("hi"))
            .await
            .expect_err("rate limited");
        assert_eq!(
            err,
            LlmError::RateLimited {
                retry_after_secs: Some(17)
            }
        );
    }

    #[tokio::test]
    async fn server_error_carries_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .create_async()
            .await;

        let err = backend(&server.url())
            .generate(&LlmRequest::new("hi"))
            .await
            .expect_err("overloaded");
        assert_eq!(
            err,
            LlmError::RequestFailed {
                reason: "HTTP 529: Overloaded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn malformed_body_is_parse_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("not json")
            .create_async()
            .await;

        let err = backend(&server.url())
            .generate(&LlmRequest::new("hi"))
            .await
            .expect_err("bad body");
        assert!(matches!(err, LlmError::ResponseParseFailed { .. }));
    }

    #[tokio::test]
    async fn unreachable_provider() {
        let err = backend("http://127.0.0.1:1")
            .generate(&LlmRequest::new("hi"))
            .await
            .expect_err("no server");
        assert!(matches!(err, LlmError::ProviderUnavailable { .. }));
    }
}
