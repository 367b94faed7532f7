//! Redis-backed history storage.
//!
//! Each session is one Redis hash; fields are sortable timestamp keys and
//! values are JSON-encoded messages.

use crate::backend::HistoryBackend;
use crate::error::StoreError;
use async_trait::async_trait;
use chatline_core::Result;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, instrument};

/// Connection settings for the Redis backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis host name.
    #[serde(default = "default_host")]
    pub host: String,
    /// Redis port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional password.
    #[serde(default)]
    pub password: Option<String>,
    /// Logical database index.
    #[serde(default)]
    pub db: i64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            db: 0,
        }
    }
}

impl RedisConfig {
    /// Builds the redis client connection description.
    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone().filter(|p| !p.is_empty()),
                ..Default::default()
            },
        }
    }
}

/// History backend talking to a Redis server.
///
/// The connection manager reconnects on its own; a command issued while
/// Redis is down fails with [`StoreError::Unavailable`].
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

fn unavailable(e: RedisError) -> StoreError {
    StoreError::Unavailable {
        reason: e.to_string(),
    }
}

impl RedisBackend {
    /// Connects to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the server cannot be reached.
    #[instrument(skip(config), fields(host = %config.host, port = config.port))]
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.connection_info()).map_err(unavailable)?;
        let connection = ConnectionManager::new(client).await.map_err(unavailable)?;
        info!("connected to redis");
        Ok(Self { connection })
    }
}

#[async_trait]
impl HistoryBackend for RedisBackend {
    async fn put(&self, group: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut con = self.connection.clone();
        con.hset::<_, _, _, ()>(group, field, value)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn entries(&self, group: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut con = self.connection.clone();
        let entries: HashMap<String, String> = con.hgetall(group).await.map_err(unavailable)?;
        Ok(entries.into_iter().collect())
    }

    async fn fields(&self, group: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.connection.clone();
        let fields: Vec<String> = con.hkeys(group).await.map_err(unavailable)?;
        Ok(fields)
    }

    async fn remove(&self, group: &str, fields: &[String]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut con = self.connection.clone();
        con.hdel::<_, _, ()>(group, fields)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn delete_group(&self, group: &str) -> Result<(), StoreError> {
        let mut con = self.connection.clone();
        con.del::<_, ()>(group).await.map_err(unavailable)?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}
