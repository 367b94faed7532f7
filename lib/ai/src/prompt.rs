//! Prompt template for chat turns.
//!
//! Templates use `{name}` placeholders. Substitution is a single pass over
//! the template text, so braces inside substituted values are left alone.

use crate::error::PromptError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default chat prompt.
pub const DEFAULT_TEMPLATE: &str =
    "You are a helpful AI assistant.\n\n{history}\nHuman: {input}\nAssistant:";

/// A prompt template with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template name, used in error messages.
    pub name: String,
    /// Template text.
    pub content: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new("chat", DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    /// Creates a new prompt template.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Returns the raw template text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.content
    }

    /// Returns the placeholder names in order of first appearance.
    #[must_use]
    pub fn input_variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for segment in segments(&self.content) {
            if let Segment::Variable(name) = segment
                && !names.contains(&name)
            {
                names.push(name);
            }
        }
        names
    }

    /// Renders the template.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::MissingVariable`] if a placeholder has no value.
    pub fn render(&self, variables: &HashMap<&str, &str>) -> Result<String, PromptError> {
        let mut out = String::with_capacity(self.content.len());
        for segment in segments(&self.content) {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value =
                        variables
                            .get(name)
                            .ok_or_else(|| PromptError::MissingVariable {
                                template: self.name.clone(),
                                variable: name.to_string(),
                            })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Renders the chat prompt from a history block and the new input.
    ///
    /// # Errors
    ///
    /// Returns an error if the template uses placeholders other than
    /// `history` and `input`.
    pub fn render_chat(&self, history: &str, input: &str) -> Result<String, PromptError> {
        let vars = HashMap::from([("history", history), ("input", input)]);
        self.render(&vars)
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Variable(&'a str),
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits template text into literals and `{identifier}` placeholders.
/// Braces that do not enclose an identifier stay literal.
fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_identifier(&after[..close]) => {
                if open > 0 {
                    out.push(Segment::Literal(&rest[..open]));
                }
                out.push(Segment::Variable(&after[..close]));
                rest = &after[close + 1..];
            }
            _ => {
                out.push(Segment::Literal(&rest[..=open]));
                rest = after;
            }
        }
    }
    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}
