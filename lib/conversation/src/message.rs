//! Message types for conversations.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// User/human message.
    #[serde(rename = "human")]
    Human,
    /// Assistant/AI message.
    #[serde(rename = "ai", alias = "assistant")]
    Assistant,
}

impl MessageRole {
    /// Speaker label used when rendering history into a prompt.
    #[must_use]
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Self::Human => "Human",
            Self::Assistant => "AI",
        }
    }
}

/// A message in a conversation.
///
/// Messages are immutable once stored; `created_at` is kept at microsecond
/// precision so that the stored value and its sort key agree exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message role.
    pub role: MessageRole,
    /// Message content.
    pub content: String,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a new message stamped with the current time.
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self::at(role, content, Utc::now())
    }

    /// Creates a message with an explicit creation time.
    #[must_use]
    pub fn at(role: MessageRole, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: created_at.trunc_subsecs(6),
        }
    }

    /// Creates a human message.
    #[must_use]
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Renders this message as one prompt history line, newline included.
    #[must_use]
    pub fn history_line(&self) -> String {
        format!("{}: {}\n", self.role.prompt_label(), self.content)
    }
}
