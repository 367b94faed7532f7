//! Session selection for requests.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chatline_core::SessionId;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// Header naming the conversation a request belongs to.
pub const SESSION_HEADER: &str = "x-session-id";

/// Extractor for the session a request acts on.
///
/// Uses the `X-Session-Id` header when present, otherwise the process
/// default session.
#[derive(Debug, Clone)]
pub struct ActiveSession(pub SessionId);

impl<S> FromRequestParts<S> for ActiveSession
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(SESSION_HEADER) else {
            let app_state = Arc::<AppState>::from_ref(state);
            return Ok(Self(app_state.default_session.clone()));
        };

        let raw = value
            .to_str()
            .map_err(|_| ApiError::invalid_session("session id must be visible ASCII"))?;
        let id = raw
            .parse::<SessionId>()
            .map_err(|e| ApiError::invalid_session(e.to_string()))?;
        Ok(Self(id))
    }
}
