//! Tools the agent may call while answering.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Definition of a tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for input parameters.
    pub input_schema: JsonValue,
}

impl ToolDefinition {
    /// Creates a new tool definition with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: JsonValue) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Trait for tool execution.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Executes the tool with the given input, returning text for the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is unusable or execution fails.
    async fn execute(&self, input: JsonValue) -> Result<String, ToolError>;
}

/// Registry of available tools, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    /// Registers a shared tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.definition().name, tool);
    }

    /// Gets a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Returns all tool definitions, ordered by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Runs the named tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] for unknown names, otherwise whatever
    /// the tool returns.
    pub async fn execute(&self, name: &str, input: JsonValue) -> Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;
        tool.execute(input).await
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Tool that hands its input straight back.
///
/// Accepts `{"query": "..."}` or a bare JSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTool;

impl IdentityTool {
    /// Name the model sees.
    pub const NAME: &'static str = "dummy";
    /// Description the model sees.
    pub const DESCRIPTION: &'static str = "A dummy tool that always returns the input";
}

#[async_trait]
impl Tool for IdentityTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(Self::NAME, Self::DESCRIPTION).with_input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Text to return" }
            },
            "required": ["query"]
        }))
    }

    async fn execute(&self, input: JsonValue) -> Result<String, ToolError> {
        match input {
            JsonValue::String(s) => Ok(s),
            JsonValue::Object(mut map) => match map.remove("query") {
                Some(JsonValue::String(s)) => Ok(s),
                Some(other) => Ok(other.to_string()),
                None => Err(ToolError::InvalidInput {
                    name: Self::NAME.to_string(),
                    reason: "missing 'query'".to_string(),
                }),
            },
            other => Err(ToolError::InvalidInput {
                name: Self::NAME.to_string(),
                reason: format!("expected an object, got {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn identity_echoes_query() {
        let out = IdentityTool
            .execute(json!({ "query": "ping" }))
            .await
            .expect("execute");
        assert_eq!(out, "ping");
    }

    #[tokio::test]
    async fn identity_accepts_bare_string() {
        let out = IdentityTool.execute(json!("pong")).await.expect("execute");
        assert_eq!(out, "pong");
    }

    #[tokio::test]
    async fn identity_rejects_missing_query() {
        let err = IdentityTool
            .execute(json!({ "other": 1 }))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[test]
    fn identity_definition() {
        let def = IdentityTool.definition();
        assert_eq!(def.name, "dummy");
        assert_eq!(def.description, "A dummy tool that always returns the input");
    }

    #[tokio::test]
    async fn registry_dispatches_by_name() {
        let registry = ToolRegistry::new().with_tool(IdentityTool);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.definitions()[0].name, "dummy");

        let out = registry
            .execute("dummy", json!({ "query": "hi" }))
            .await
            .expect("execute");
        assert_eq!(out, "hi");

        let err = registry
            .execute("search", json!({}))
            .await
            .expect_err("unknown tool");
        assert_eq!(
            err,
            ToolError::NotFound {
                name: "search".to_string()
            }
        );
    }
}
