//! Chat agent: renders the prompt, calls the model, and runs any tools the
//! model asks for until it produces an answer.

use crate::backend::{LlmBackend, LlmMessage, LlmRequest, TokenUsage, ToolOutput};
use crate::error::AgentError;
use crate::prompt::PromptTemplate;
use crate::tool::ToolRegistry;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Sampling and loop settings for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model calls per run.
    pub max_iterations: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per model call.
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    /// Final answer text.
    pub text: String,
    /// Number of model calls made.
    pub iterations: u32,
    /// Token usage summed over all calls.
    pub usage: TokenUsage,
}

/// A prompt, a model and a set of tools.
#[derive(Clone)]
pub struct Agent {
    backend: Arc<dyn LlmBackend>,
    prompt: PromptTemplate,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.backend.model())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Creates an agent with the default prompt, no tools and default settings.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            prompt: PromptTemplate::default(),
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    /// Sets the prompt template.
    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Sets the tools offered to the model.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the loop and sampling settings.
    #[must_use]
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the prompt template.
    #[must_use]
    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    /// Returns the settings.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Answers `input` given the rendered conversation `history`.
    ///
    /// Tool failures are reported back to the model rather than ending the
    /// run.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Prompt`] if the prompt cannot be rendered,
    /// [`AgentError::Backend`] if a model call fails, and
    /// [`AgentError::MaxIterationsExceeded`] if the model is still asking
    /// for tools after the last allowed call.
    #[instrument(skip_all, fields(model = %self.backend.model(), input_len = input.len()))]
    pub async fn run(&self, history: &str, input: &str) -> Result<AgentOutput, Report<AgentError>> {
        let prompt = self
            .prompt
            .render_chat(history, input)
            .map_err(|e| AgentError::Prompt {
                reason: e.to_string(),
            })?;

        let mut request = LlmRequest::new(prompt)
            .with_tools(self.tools.definitions())
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        let mut usage = TokenUsage::default();

        for iteration in 1..=self.config.max_iterations {
            let response =
                self.backend
                    .generate(&request)
                    .await
                    .map_err(|e| AgentError::Backend {
                        iteration,
                        reason: e.to_string(),
                    })?;
            usage.accumulate(response.usage);

            if !response.wants_tools() {
                debug!(iteration, total_tokens = usage.total(), "agent finished");
                return Ok(AgentOutput {
                    text: response.content,
                    iterations: iteration,
                    usage,
                });
            }

            let mut outputs = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let output = match self.tools.execute(&call.name, call.input.clone()).await {
                    Ok(text) => {
                        debug!(tool = %call.name, iteration, "tool succeeded");
                        ToolOutput::success(&call.id, text)
                    }
                    Err(e) => {
                        warn!(tool = %call.name, iteration, error = %e, "tool failed");
                        ToolOutput::failure(&call.id, e.to_string())
                    }
                };
                outputs.push(output);
            }

            request.push(LlmMessage::assistant(response.content).with_tool_calls(response.tool_calls));
            request.push(LlmMessage::tool_outputs(outputs));
        }

        Err(AgentError::MaxIterationsExceeded {
            max: self.config.max_iterations,
        }
        .into())
    }
}
