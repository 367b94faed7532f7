//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables (after an
//! optional `.env` file has been read by the binary). Keys are the
//! lower-cased variable names, so `LLM_MODEL` fills `llm_model`.

use chatline_ai::{AgentConfig, LlmBackendConfig};
use chatline_conversation::{DEFAULT_HISTORY_LIMIT, RedisConfig};
use serde::Deserialize;

/// Which history backend to run with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackendKind {
    /// Redis server.
    #[default]
    Redis,
    /// In-process map; history is lost on restart.
    Memory,
}

/// Server configuration.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Anthropic API key.
    pub anthropic_api_key: String,

    /// Anthropic API base URL.
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    /// Model identifier.
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Sampling temperature.
    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    /// Output token cap per model call, also the inbound message token limit.
    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Maximum model calls per chat turn. Zero is raised to one.
    #[serde(default = "default_agent_max_iterations")]
    pub agent_max_iterations: u32,

    /// History backend.
    #[serde(default)]
    pub memory_backend: MemoryBackendKind,

    /// Redis host.
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Redis port.
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Redis password.
    #[serde(default)]
    pub redis_password: Option<String>,

    /// Redis logical database.
    #[serde(default)]
    pub redis_db: i64,

    /// Messages kept per session.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Session used when a request names none. Generated at start-up when unset.
    #[serde(default)]
    pub session_id: Option<String>,

    /// Listen address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_anthropic_base_url() -> String {
    chatline_ai::anthropic::DEFAULT_BASE_URL.to_string()
}

fn default_llm_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_llm_temperature() -> f32 {
    0.7
}

fn default_llm_max_tokens() -> u32 {
    1000
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_agent_max_iterations() -> u32 {
    5
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_temperature", &self.llm_temperature)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .field("agent_max_iterations", &self.agent_max_iterations)
            .field("memory_backend", &self.memory_backend)
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("history_limit", &self.history_limit)
            .field("session_id", &self.session_id)
            .field("bind_address", &self.bind_address)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default())
    }

    /// Loads configuration from the given environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_source(source: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Redis connection settings.
    #[must_use]
    pub fn redis(&self) -> RedisConfig {
        RedisConfig {
            host: self.redis_host.clone(),
            port: self.redis_port,
            password: self.redis_password.clone(),
            db: self.redis_db,
        }
    }

    /// LLM backend settings.
    #[must_use]
    pub fn llm_backend(&self) -> LlmBackendConfig {
        LlmBackendConfig::anthropic(self.anthropic_api_key.clone(), self.llm_model.clone())
            .with_base_url(self.anthropic_base_url.clone())
            .with_timeout_secs(self.llm_timeout_secs)
    }

    /// Agent loop and sampling settings.
    #[must_use]
    pub fn agent(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.agent_max_iterations.max(1),
            temperature: self.llm_temperature,
            max_tokens: self.llm_max_tokens,
        }
    }
}
