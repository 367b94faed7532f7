//! HTTP routes.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use chatline_ai::{ParsedResponse, format_for_display, parse_response};
use chatline_conversation::Message;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::session::ActiveSession;
use crate::state::{AppState, LlmSettings};

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .route("/clear", post(clear))
        .route("/status", get(status))
        .with_state(state)
}

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Reply to `POST /chat`.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Agent output as produced.
    pub raw: String,
    /// Classified output.
    pub parsed: ParsedResponse,
    /// Display rendering of `parsed`.
    pub display: String,
}

/// Reply to `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub llm_model: String,
    pub memory_type: &'static str,
    pub session_id: String,
    pub system_prompt: String,
    pub llm_settings: LlmSettings,
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Chat agent API is running" }))
}

/// Runs one chat turn.
///
/// The human message is stored before the agent runs, so it stays in the
/// history even when the agent fails.
#[instrument(skip_all, fields(session_id = %session_id))]
async fn chat(
    State(state): State<Arc<AppState>>,
    ActiveSession(session_id): ActiveSession,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::invalid_body(e.body_text()))?;
    let message = request.message.unwrap_or_default();
    if message.is_empty() {
        return Err(ApiError::empty_message());
    }

    let count = state.tokens.count(&message);
    let limit = state.token_limit();
    if count > limit {
        return Err(ApiError::TokenLimit { count, limit });
    }

    let history = state.store.session(session_id);
    let rendered = history.render_history().await?;
    history.append(Message::human(&message)).await?;

    let output = state.agent.run(&rendered, &message).await?;
    history.append(Message::assistant(&output.text)).await?;

    let parsed = parse_response(&output.text);
    let display = format_for_display(&parsed);
    info!(
        tokens = count,
        iterations = output.iterations,
        kind = parsed.kind(),
        "chat turn complete"
    );

    Ok(Json(ChatResponse {
        raw: output.text,
        parsed,
        display,
    }))
}

#[instrument(skip_all, fields(session_id = %session_id))]
async fn clear(
    State(state): State<Arc<AppState>>,
    ActiveSession(session_id): ActiveSession,
) -> Result<Json<Value>, ApiError> {
    state.store.session(session_id).clear().await?;
    info!("conversation cleared");
    Ok(Json(json!({ "message": "Conversation cleared successfully" })))
}

async fn status(
    State(state): State<Arc<AppState>>,
    ActiveSession(session_id): ActiveSession,
) -> Json<StatusResponse> {
    let llm_settings = state.llm_settings();
    Json(StatusResponse {
        status: "running",
        timestamp: Utc::now().to_rfc3339(),
        llm_model: llm_settings.model.clone(),
        memory_type: state.store.backend_kind(),
        session_id: session_id.to_string(),
        system_prompt: state.agent.prompt().text().to_string(),
        llm_settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chatline_ai::{
        Agent, AgentConfig, IdentityTool, LlmBackend, LlmError, LlmRequest, LlmResponse,
        TokenCounter, ToolRegistry,
    };
    use chatline_conversation::{ConversationStore, MemoryBackend, MessageRole};
    use chatline_core::SessionId;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<LlmResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            self.prompts
                .lock()
                .expect("lock")
                .push(request.messages[0].content.clone());
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(LlmResponse::text("ok", "mock-model")))
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }

    fn reply(text: &str) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse::text(text, "mock-model"))
    }

    fn state_with(backend: Arc<ScriptedBackend>, config: AgentConfig) -> Arc<AppState> {
        let store = ConversationStore::new(Arc::new(MemoryBackend::new()));
        let agent = Agent::new(backend)
            .with_tools(ToolRegistry::new().with_tool(IdentityTool))
            .with_config(config);
        let tokens = TokenCounter::new().expect("tokenizer");
        let default_session: SessionId = "default-session".parse().expect("session id");
        Arc::new(AppState::new(store, agent, tokens, default_session))
    }

    fn state(backend: Arc<ScriptedBackend>) -> Arc<AppState> {
        state_with(backend, AgentConfig::default())
    }

    fn chat_request(body: Value, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/chat").header("content-type", "application/json");
        if let Some(session) = session {
            builder = builder.header("x-session-id", session);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("build request")
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state.clone())
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn root_reports_running() {
        let state = state(ScriptedBackend::new(vec![]));
        let (status, body) = send(
            &state,
            Request::get("/").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Chat agent API is running"}));
    }

    #[tokio::test]
    async fn chat_returns_raw_parsed_display() {
        let state = state(ScriptedBackend::new(vec![reply("Hello! How can I help?")]));
        let (status, body) = send(&state, chat_request(json!({"message": "hi"}), None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["raw"], "Hello! How can I help?");
        assert_eq!(body["parsed"]["type"], "text");
        assert_eq!(body["parsed"]["content"], "Hello! How can I help?");
        assert_eq!(body["display"], "Hello! How can I help?");

        let history = state
            .store
            .session(state.default_session.clone())
            .load()
            .await
            .expect("load");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::Human);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn structured_reply_is_classified() {
        let raw = r#"{"actions":[{"name":"dummy","parameters":{"query":"x"}}]}"#;
        let state = state(ScriptedBackend::new(vec![reply(raw)]));
        let (status, body) = send(&state, chat_request(json!({"message": "act"}), None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["raw"], raw);
        assert_eq!(body["parsed"]["type"], "action");
        assert_eq!(body["display"], "💡 Actions:\n- dummy: {\"query\":\"x\"}");
    }

    #[tokio::test]
    async fn history_feeds_next_prompt() {
        let backend = ScriptedBackend::new(vec![reply("first answer"), reply("second answer")]);
        let state = state(backend.clone());
        send(&state, chat_request(json!({"message": "first"}), None)).await;
        send(&state, chat_request(json!({"message": "second"}), None)).await;

        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Human: first\nAI: first answer\n"));
        assert!(prompts[1].ends_with("Human: second\nAssistant:"));
    }

    #[tokio::test]
    async fn empty_or_missing_message_is_rejected() {
        let backend = ScriptedBackend::new(vec![]);
        let state = state(backend.clone());
        for body in [json!({"message": ""}), json!({}), json!({"message": null})] {
            let (status, response) = send(&state, chat_request(body, None)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(response["detail"]["type"], "input_error");
            assert_eq!(response["detail"]["error"], "Input message cannot be empty.");
        }
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_input_error() {
        let state = state(ScriptedBackend::new(vec![]));
        let request = Request::post("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"]["type"], "input_error");
    }

    #[tokio::test]
    async fn long_message_hits_token_limit() {
        let backend = ScriptedBackend::new(vec![]);
        let config = AgentConfig {
            max_tokens: 5,
            ..AgentConfig::default()
        };
        let state = state_with(backend.clone(), config);
        let message = "one two three four five six seven eight";
        let count = state.tokens.count(message);
        assert!(count > 5);

        let (status, body) = send(&state, chat_request(json!({"message": message}), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"]["type"], "token_limit_error");
        assert_eq!(
            body["detail"]["message"],
            format!("The message contains {count} tokens, but the maximum allowed is 5.")
        );
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn agent_failure_keeps_human_message() {
        let state = state(ScriptedBackend::new(vec![Err(LlmError::Timeout)]));
        let (status, body) = send(&state, chat_request(json!({"message": "hi"}), None)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"]["type"], "agent_error");
        assert_eq!(body["detail"]["message"], "Failed to process request");
        assert!(
            body["detail"]["error"]
                .as_str()
                .is_some_and(|e| e.contains("timed out"))
        );

        let history = state
            .store
            .session(state.default_session.clone())
            .load()
            .await
            .expect("load");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::Human);
    }

    #[tokio::test]
    async fn clear_empties_session() {
        let state = state(ScriptedBackend::new(vec![]));
        send(&state, chat_request(json!({"message": "hi"}), None)).await;

        let (status, body) = send(
            &state,
            Request::post("/clear").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Conversation cleared successfully"}));

        let history = state
            .store
            .session(state.default_session.clone())
            .load()
            .await
            .expect("load");
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn session_header_isolates_history() {
        let state = state(ScriptedBackend::new(vec![]));
        send(&state, chat_request(json!({"message": "for a"}), Some("user-a"))).await;
        send(&state, chat_request(json!({"message": "for b"}), Some("user-b"))).await;

        let a: SessionId = "user-a".parse().expect("id");
        let loaded = state.store.session(a).load().await.expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "for a");

        let default = state
            .store
            .session(state.default_session.clone())
            .load()
            .await
            .expect("load");
        assert!(default.is_empty());
    }

    #[tokio::test]
    async fn invalid_session_header_is_rejected() {
        let state = state(ScriptedBackend::new(vec![]));
        let (status, body) = send(&state, chat_request(json!({"message": "hi"}), Some("has space"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"]["error"], "Invalid session id.");
    }

    #[tokio::test]
    async fn status_reports_configuration() {
        let state = state(ScriptedBackend::new(vec![]));
        let request = Request::get("/status")
            .header("x-session-id", "user-a")
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(&state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert!(body["timestamp"].is_string());
        assert_eq!(body["llm_model"], "mock-model");
        assert_eq!(body["memory_type"], "memory");
        assert_eq!(body["session_id"], "user-a");
        assert_eq!(body["system_prompt"], chatline_ai::DEFAULT_TEMPLATE);
        assert_eq!(body["llm_settings"]["model"], "mock-model");
        assert_eq!(body["llm_settings"]["max_tokens"], 1000);
        assert!(body["llm_settings"]["temperature"].is_number());
    }

    #[tokio::test]
    async fn status_defaults_to_process_session() {
        let state = state(ScriptedBackend::new(vec![]));
        let (_, body) = send(
            &state,
            Request::get("/status").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(body["session_id"], "default-session");
    }
}
