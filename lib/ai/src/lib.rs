//! AI primitives for the chatline service.
//!
//! This crate provides:
//!
//! - **LLM Backend**: A provider-neutral request/response model and the
//!   Anthropic Messages implementation
//! - **Agent**: Prompt rendering plus a bounded tool-use loop
//! - **Structured Output**: Classification of raw agent output into a
//!   small tagged model, and its display rendering
//! - **Token Counting**: `cl100k_base` token counts for input limits

pub mod agent;
pub mod anthropic;
pub mod backend;
pub mod display;
pub mod error;
pub mod prompt;
pub mod structured;
pub mod tokens;
pub mod tool;

pub use agent::{Agent, AgentConfig, AgentOutput};
pub use anthropic::AnthropicBackend;
pub use backend::{
    LlmBackend, LlmBackendConfig, LlmMessage, LlmRequest, LlmResponse, MessageRole, TokenUsage,
    ToolCall, ToolOutput,
};
pub use display::format_for_display;
pub use error::{AgentError, LlmError, PromptError, TokenizerError, ToolError};
pub use prompt::{DEFAULT_TEMPLATE, PromptTemplate};
pub use structured::{ParsedResponse, parse_response};
pub use tokens::TokenCounter;
pub use tool::{IdentityTool, Tool, ToolDefinition, ToolRegistry};
