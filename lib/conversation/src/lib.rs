//! Conversation history for the chatline service.
//!
//! This crate provides:
//!
//! - **Messages**: Immutable human/assistant turns with creation timestamps
//! - **History Backends**: Hash-group storage (Redis, or in-process memory)
//! - **Conversation Store**: Bounded, timestamp-ordered history per session

pub mod backend;
pub mod error;
pub mod message;
pub mod redis_backend;
pub mod store;

pub use backend::{HistoryBackend, MemoryBackend};
pub use error::StoreError;
pub use message::{Message, MessageRole};
pub use redis_backend::{RedisBackend, RedisConfig};
pub use store::{ConversationStore, DEFAULT_HISTORY_LIMIT, SessionHistory};
