//! Storage backends for conversation history.
//!
//! A backend stores groups of string fields, one group per session, the
//! same shape as a Redis hash. Ordering, bounding and locking live in the
//! store built on top; a backend only needs each call to be atomic.

use crate::error::StoreError;
use async_trait::async_trait;
use chatline_core::Result;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Trait for hash-group storage.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Writes one field in a group, creating the group if needed.
    async fn put(&self, group: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Returns every field and value in a group, in no particular order.
    async fn entries(&self, group: &str) -> Result<Vec<(String, String)>, StoreError>;

    /// Returns every field name in a group, in no particular order.
    async fn fields(&self, group: &str) -> Result<Vec<String>, StoreError>;

    /// Removes the given fields from a group. Missing fields are ignored.
    async fn remove(&self, group: &str, fields: &[String]) -> Result<(), StoreError>;

    /// Deletes a whole group. Deleting a missing group succeeds.
    async fn delete_group(&self, group: &str) -> Result<(), StoreError>;

    /// Short name of the backend, reported by the status endpoint.
    fn kind(&self) -> &'static str;
}

/// In-process backend.
///
/// History does not survive a restart. Used for local runs without Redis
/// and in tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    groups: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of groups currently held.
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    async fn put(&self, group: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.groups
            .write()
            .await
            .entry(group.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn entries(&self, group: &str) -> Result<Vec<(String, String)>, StoreError> {
        let groups = self.groups.read().await;
        Ok(groups
            .get(group)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fields(&self, group: &str) -> Result<Vec<String>, StoreError> {
        let groups = self.groups.read().await;
        Ok(groups
            .get(group)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove(&self, group: &str, fields: &[String]) -> Result<(), StoreError> {
        let mut groups = self.groups.write().await;
        if let Some(existing) = groups.get_mut(group) {
            for field in fields {
                existing.remove(field);
            }
            if existing.is_empty() {
                groups.remove(group);
            }
        }
        Ok(())
    }

    async fn delete_group(&self, group: &str) -> Result<(), StoreError> {
        self.groups.write().await.remove(group);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
