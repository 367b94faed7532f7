//! API error type.
//!
//! Every handler returns `Result<T, ApiError>`. Errors render as
//! `{"detail": {"error", "type", "message"}}` with a status per kind.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatline_ai::AgentError;
use chatline_conversation::StoreError;
use rootcause::prelude::Report;
use serde_json::json;
use std::fmt;
use tracing::{error, warn};

/// Errors surfaced to API clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request is unusable as sent.
    Input { error: String, message: String },
    /// The message has more tokens than allowed.
    TokenLimit { count: usize, limit: usize },
    /// The history store cannot be reached.
    StoreUnavailable { reason: String },
    /// The agent or the upstream model failed.
    Agent { reason: String },
    /// A server-side fault unrelated to the request or an upstream.
    Internal { reason: String },
}

impl ApiError {
    /// The chat message was missing or empty.
    #[must_use]
    pub fn empty_message() -> Self {
        Self::Input {
            error: "Input message cannot be empty.".to_string(),
            message: "The message cannot be empty.".to_string(),
        }
    }

    /// The request body could not be decoded.
    #[must_use]
    pub fn invalid_body(reason: impl Into<String>) -> Self {
        Self::Input {
            error: "Invalid request body.".to_string(),
            message: reason.into(),
        }
    }

    /// The session header was not a usable identifier.
    #[must_use]
    pub fn invalid_session(reason: impl Into<String>) -> Self {
        Self::Input {
            error: "Invalid session id.".to_string(),
            message: reason.into(),
        }
    }

    /// Returns the `type` field of the response body.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input_error",
            Self::TokenLimit { .. } => "token_limit_error",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Agent { .. } => "agent_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Returns the HTTP status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Input { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TokenLimit { .. } => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Agent { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_and_message(&self) -> (String, String) {
        match self {
            Self::Input { error, message } => (error.clone(), message.clone()),
            Self::TokenLimit { count, limit } => (
                "Input message exceeds the maximum token limit.".to_string(),
                format!(
                    "The message contains {count} tokens, but the maximum allowed is {limit}."
                ),
            ),
            Self::StoreUnavailable { .. } => (
                "Conversation store is unavailable.".to_string(),
                "Failed to access conversation history".to_string(),
            ),
            Self::Agent { reason } => (reason.clone(), "Failed to process request".to_string()),
            Self::Internal { .. } => (
                "Internal server error.".to_string(),
                "Failed to process request".to_string(),
            ),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input { message, .. } => write!(f, "invalid input: {message}"),
            Self::TokenLimit { count, limit } => {
                write!(f, "message has {count} tokens, limit is {limit}")
            }
            Self::StoreUnavailable { reason } => write!(f, "store unavailable: {reason}"),
            Self::Agent { reason } => write!(f, "agent failed: {reason}"),
            Self::Internal { reason } => write!(f, "internal error: {reason}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<Report<StoreError>> for ApiError {
    fn from(report: Report<StoreError>) -> Self {
        let context = report.current_context();
        let reason = context.to_string();
        match context {
            StoreError::Unavailable { .. } => Self::StoreUnavailable { reason },
            StoreError::EncodeFailed { .. } => Self::Internal { reason },
        }
    }
}

impl From<Report<AgentError>> for ApiError {
    fn from(report: Report<AgentError>) -> Self {
        Self::Agent {
            reason: report.current_context().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::StoreUnavailable { reason } => error!(reason = %reason, "history store error"),
            Self::Agent { reason } => error!(reason = %reason, "agent error"),
            Self::Internal { reason } => error!(reason = %reason, "internal error"),
            Self::Input { .. } | Self::TokenLimit { .. } => warn!(error = %self, "rejected request"),
        }
        let (error, message) = self.error_and_message();
        let body = json!({
            "detail": {
                "error": error,
                "type": self.kind(),
                "message": message,
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn empty_message_body() {
        let (status, body) = render(ApiError::empty_message()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body,
            json!({"detail": {
                "error": "Input message cannot be empty.",
                "type": "input_error",
                "message": "The message cannot be empty."
            }})
        );
    }

    #[tokio::test]
    async fn token_limit_body() {
        let (status, body) = render(ApiError::TokenLimit {
            count: 1200,
            limit: 1000,
        })
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"]["type"], "token_limit_error");
        assert_eq!(
            body["detail"]["message"],
            "The message contains 1200 tokens, but the maximum allowed is 1000."
        );
    }

    #[tokio::test]
    async fn agent_error_embeds_reason() {
        let report: Report<AgentError> = AgentError::MaxIterationsExceeded { max: 5 }.into();
        let (status, body) = render(ApiError::from(report)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"]["type"], "agent_error");
        assert_eq!(
            body["detail"]["error"],
            "agent exceeded 5 tool rounds without an answer"
        );
        assert_eq!(body["detail"]["message"], "Failed to process request");
    }

    #[tokio::test]
    async fn store_error_hides_reason() {
        let report: Report<StoreError> = StoreError::Unavailable {
            reason: "Connection refused (os error 111)".to_string(),
        }
        .into();
        let (status, body) = render(ApiError::from(report)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"]["type"], "store_unavailable");
        assert!(!body.to_string().contains("os error"));
    }

    #[tokio::test]
    async fn encode_failure_is_internal_not_unavailable() {
        let report: Report<StoreError> = StoreError::EncodeFailed {
            reason: "key must be a string".to_string(),
        }
        .into();
        let (status, body) = render(ApiError::from(report)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"]["type"], "internal_error");
        assert!(!body.to_string().contains("key must be"));
    }
}
