//! Human-readable rendering of classified responses.

use crate::structured::{JsonObject, ParsedResponse};
use serde_json::Value as JsonValue;

/// Renders a classified response as one display string.
#[must_use]
pub fn format_for_display(response: &ParsedResponse) -> String {
    match response {
        ParsedResponse::Error { message, .. } => error_line(message),
        ParsedResponse::Action { actions, .. } => actions_block(actions.iter()),
        ParsedResponse::Info { content, .. } => info_line(content),
        ParsedResponse::Text { content, .. } => content.clone(),
    }
}

fn error_line(message: &str) -> String {
    format!("⚠️ Error: {message}")
}

fn info_line(content: &str) -> String {
    format!("ℹ️ {content}")
}

fn actions_block<'a>(actions: impl Iterator<Item = &'a JsonObject>) -> String {
    let lines: Vec<String> = actions.map(action_line).collect();
    format!("💡 Actions:\n{}", lines.join("\n"))
}

fn action_line(action: &JsonObject) -> String {
    let name = match action.get("name") {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let parameters = action
        .get("parameters")
        .map_or_else(|| "{}".to_string(), JsonValue::to_string);
    format!("- {name}: {parameters}")
}
