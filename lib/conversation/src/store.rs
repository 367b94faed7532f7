//! Bounded conversation store.
//!
//! Each session's history is one backend group named
//! `chat_history:{session_id}`. Every message is written under a field key
//! built from its creation time, a per-store sequence number and the
//! store's instance id, so lexicographic field order is chronological
//! order with a stable tie-break. Stores sharing one backend never
//! produce the same key. After each append the group is trimmed back to the limit,
//! evicting the oldest keys first.
//!
//! The append-then-evict sequence is not atomic at the backend level, so
//! every operation on a session runs under that session's mutex.

use crate::backend::HistoryBackend;
use crate::error::StoreError;
use crate::message::Message;
use chatline_core::{Result, SessionId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use ulid::Ulid;

/// Number of messages kept per session unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Prefix of the backend group holding a session's history.
const GROUP_PREFIX: &str = "chat_history";

type SessionLocks = std::sync::Mutex<HashMap<SessionId, Weak<Mutex<()>>>>;

/// Builds the sortable field key for a message.
fn entry_key(created_at: &DateTime<Utc>, seq: u64, instance: &str) -> String {
    format!(
        "{}-{seq:012}-{instance}",
        created_at.format("%Y-%m-%dT%H:%M:%S%.6fZ")
    )
}

/// Shared store from which session-scoped handles are taken.
#[derive(Clone)]
pub struct ConversationStore {
    backend: Arc<dyn HistoryBackend>,
    limit: usize,
    instance: Arc<str>,
    sequence: Arc<AtomicU64>,
    locks: Arc<SessionLocks>,
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("backend", &self.backend.kind())
            .field("limit", &self.limit)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

impl ConversationStore {
    /// Creates a store keeping [`DEFAULT_HISTORY_LIMIT`] messages per session.
    #[must_use]
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        Self::with_limit(backend, DEFAULT_HISTORY_LIMIT)
    }

    /// Creates a store keeping at most `limit` messages per session.
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn with_limit(backend: Arc<dyn HistoryBackend>, limit: usize) -> Self {
        Self {
            backend,
            limit: limit.max(1),
            instance: Arc::from(Ulid::new().to_string()),
            sequence: Arc::new(AtomicU64::new(0)),
            locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Returns the per-session message bound.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the backend's short name.
    #[must_use]
    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// Returns a handle on one session's history.
    ///
    /// Handles for the same session share a lock, so they may be taken
    /// freely per request.
    #[must_use]
    pub fn session(&self, id: SessionId) -> SessionHistory {
        let lock = self.lock_for(&id);
        SessionHistory {
            group: format!("{GROUP_PREFIX}:{id}"),
            id,
            backend: Arc::clone(&self.backend),
            limit: self.limit,
            instance: Arc::clone(&self.instance),
            sequence: Arc::clone(&self.sequence),
            lock,
        }
    }

    fn lock_for(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(id).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(id.clone(), Arc::downgrade(&lock));
        lock
    }
}

/// Bounded, ordered history of a single session.
#[derive(Clone)]
pub struct SessionHistory {
    id: SessionId,
    group: String,
    backend: Arc<dyn HistoryBackend>,
    limit: usize,
    instance: Arc<str>,
    sequence: Arc<AtomicU64>,
    lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for SessionHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHistory")
            .field("id", &self.id)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl SessionHistory {
    /// Returns the session this handle refers to.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Appends a message, then evicts the oldest entries beyond the limit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend cannot be reached.
    /// The message may already be stored when eviction fails.
    #[instrument(skip(self, message), fields(session_id = %self.id, role = ?message.role))]
    pub async fn append(&self, message: Message) -> Result<(), StoreError> {
        let value = serde_json::to_string(&message).map_err(|e| StoreError::EncodeFailed {
            reason: e.to_string(),
        })?;

        let _guard = self.lock.lock().await;

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let key = entry_key(&message.created_at, seq, &self.instance);
        self.backend.put(&self.group, &key, &value).await?;

        let mut fields = self.backend.fields(&self.group).await?;
        if fields.len() > self.limit {
            fields.sort_unstable();
            let excess = fields.len() - self.limit;
            self.backend.remove(&self.group, &fields[..excess]).await?;
            debug!(evicted = excess, "evicted oldest messages");
        }

        Ok(())
    }

    /// Loads the session's messages, oldest first.
    ///
    /// Entries that fail to decode are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend cannot be reached.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn load(&self) -> Result<Vec<Message>, StoreError> {
        let mut entries = {
            let _guard = self.lock.lock().await;
            self.backend.entries(&self.group).await?
        };
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let skip = entries.len().saturating_sub(self.limit);
        let messages = entries
            .into_iter()
            .skip(skip)
            .filter_map(|(key, value)| match serde_json::from_str::<Message>(&value) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping undecodable history entry");
                    None
                }
            })
            .collect();

        Ok(messages)
    }

    /// Renders the history as `Human: ...` / `AI: ...` lines for a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend cannot be reached.
    pub async fn render_history(&self) -> Result<String, StoreError> {
        let messages = self.load().await?;
        Ok(messages.iter().map(Message::history_line).collect())
    }

    /// Deletes the whole history. Clearing an empty session succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend cannot be reached.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.backend.delete_group(&self.group).await?;
        debug!("cleared history");
        Ok(())
    }
}
