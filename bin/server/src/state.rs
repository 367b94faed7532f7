//! Shared application state.

use chatline_ai::{Agent, TokenCounter};
use chatline_conversation::ConversationStore;
use chatline_core::SessionId;
use serde::Serialize;

/// Model settings reported by `/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// State shared by all handlers.
#[derive(Debug)]
pub struct AppState {
    /// Conversation history.
    pub store: ConversationStore,
    /// Chat agent.
    pub agent: Agent,
    /// Token counter for inbound messages.
    pub tokens: TokenCounter,
    /// Session used when a request names none.
    pub default_session: SessionId,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        store: ConversationStore,
        agent: Agent,
        tokens: TokenCounter,
        default_session: SessionId,
    ) -> Self {
        Self {
            store,
            agent,
            tokens,
            default_session,
        }
    }

    /// Largest accepted inbound message, in tokens.
    #[must_use]
    pub fn token_limit(&self) -> usize {
        self.agent.config().max_tokens as usize
    }

    /// Current model settings.
    #[must_use]
    pub fn llm_settings(&self) -> LlmSettings {
        let config = self.agent.config();
        LlmSettings {
            model: self.agent.model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}
