//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `LlmError`: Low-level LLM backend operations
//! - `PromptError`: Prompt template operations
//! - `ToolError`: Tool execution errors
//! - `AgentError`: Agent run errors
//! - `TokenizerError`: Tokenizer loading errors

use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider is unavailable.
    ProviderUnavailable { provider: String, reason: String },
    /// Request failed.
    RequestFailed { reason: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Errors from prompt operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// Missing required variable.
    MissingVariable { template: String, variable: String },
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVariable { template, variable } => {
                write!(
                    f,
                    "missing required variable '{variable}' in template '{template}'"
                )
            }
        }
    }
}

impl std::error::Error for PromptError {}

/// Errors from tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Tool not found.
    NotFound { name: String },
    /// Tool execution failed.
    ExecutionFailed { name: String, reason: String },
    /// Invalid tool input.
    InvalidInput { name: String, reason: String },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "tool not found: {name}"),
            Self::ExecutionFailed { name, reason } => {
                write!(f, "tool '{name}' execution failed: {reason}")
            }
            Self::InvalidInput { name, reason } => {
                write!(f, "invalid input for tool '{name}': {reason}")
            }
        }
    }
}

impl std::error::Error for ToolError {}

/// Errors from an agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The prompt could not be rendered.
    Prompt { reason: String },
    /// The LLM backend failed during the given round.
    Backend { iteration: u32, reason: String },
    /// The model kept requesting tools past the round limit.
    MaxIterationsExceeded { max: u32 },
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt { reason } => write!(f, "failed to build prompt: {reason}"),
            Self::Backend { iteration, reason } => {
                write!(f, "LLM call failed in round {iteration}: {reason}")
            }
            Self::MaxIterationsExceeded { max } => {
                write!(f, "agent exceeded {max} tool rounds without an answer")
            }
        }
    }
}

impl std::error::Error for AgentError {}

/// Errors from the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    /// The BPE tables could not be loaded.
    LoadFailed { encoding: String, reason: String },
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadFailed { encoding, reason } => {
                write!(f, "failed to load tokenizer '{encoding}': {reason}")
            }
        }
    }
}

impl std::error::Error for TokenizerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_display() {
        let err = LlmError::ProviderUnavailable {
            provider: "anthropic".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("anthropic"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn rate_limited_display() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 30s");
    }

    #[test]
    fn prompt_error_display() {
        let err = PromptError::MissingVariable {
            template: "chat".to_string(),
            variable: "history".to_string(),
        };
        assert!(err.to_string().contains("history"));
        assert!(err.to_string().contains("chat"));
    }

    #[test]
    fn agent_error_display() {
        let err = AgentError::Backend {
            iteration: 2,
            reason: "LLM request timed out".to_string(),
        };
        assert!(err.to_string().contains("round 2"));
        assert!(err.to_string().contains("timed out"));

        let err = AgentError::MaxIterationsExceeded { max: 5 };
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn tool_error_display() {
        let err = ToolError::InvalidInput {
            name: "dummy".to_string(),
            reason: "missing query".to_string(),
        };
        assert!(err.to_string().contains("dummy"));
        assert!(err.to_string().contains("missing query"));
    }
}
