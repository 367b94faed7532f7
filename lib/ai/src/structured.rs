//! Classification of raw agent output.
//!
//! Agents answer with free-form text, and sometimes that text is a JSON
//! object describing an error, a list of actions, or a piece of
//! information. [`parse_response`] turns any string into exactly one
//! [`ParsedResponse`] variant and never fails: anything that does not
//! decode cleanly into a structured shape comes back as
//! [`ParsedResponse::Text`] holding the original string.
//!
//! Shapes are tried in a fixed order (`error`, then `actions`, then
//! `info_type`). The first key present in the object picks the shape; if
//! that shape cannot be built, the result is text and later shapes are not
//! tried.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A JSON object.
pub type JsonObject = Map<String, JsonValue>;

/// A classified agent response, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedResponse {
    /// Plain text; the fallback for everything else.
    Text {
        content: String,
        #[serde(default)]
        metadata: Option<JsonObject>,
    },
    /// An error reported by the agent.
    Error {
        content: String,
        error_type: String,
        message: String,
        #[serde(default)]
        details: Option<JsonObject>,
        #[serde(default)]
        metadata: Option<JsonObject>,
    },
    /// Actions the agent wants performed, in order.
    Action {
        content: String,
        actions: Vec<JsonObject>,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        metadata: Option<JsonObject>,
    },
    /// Informational payload.
    Info {
        content: String,
        info_type: String,
        data: JsonObject,
        #[serde(default)]
        metadata: Option<JsonObject>,
    },
}

impl ParsedResponse {
    /// Creates a text response.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            metadata: None,
        }
    }

    /// Returns the wire tag of this variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Error { .. } => "error",
            Self::Action { .. } => "action",
            Self::Info { .. } => "info",
        }
    }

    /// Returns the shared `content` field.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Text { content, .. }
            | Self::Error { content, .. }
            | Self::Action { content, .. }
            | Self::Info { content, .. } => content,
        }
    }

    /// Returns the shared `metadata` field.
    #[must_use]
    pub fn metadata(&self) -> Option<&JsonObject> {
        match self {
            Self::Text { metadata, .. }
            | Self::Error { metadata, .. }
            | Self::Action { metadata, .. }
            | Self::Info { metadata, .. } => metadata.as_ref(),
        }
    }
}

type Classifier = fn(&JsonObject) -> Option<ParsedResponse>;

/// Trigger key and constructor for each structured shape, in precedence
/// order.
const CLASSIFIERS: &[(&str, Classifier)] = &[
    ("error", classify_error),
    ("actions", classify_action),
    ("info_type", classify_info),
];

/// Classifies a raw response string.
#[must_use]
pub fn parse_response(raw: &str) -> ParsedResponse {
    let Ok(JsonValue::Object(object)) = serde_json::from_str::<JsonValue>(raw) else {
        return ParsedResponse::text(raw);
    };

    CLASSIFIERS
        .iter()
        .find(|(key, _)| object.contains_key(*key))
        .and_then(|(_, build)| build(&object))
        .unwrap_or_else(|| ParsedResponse::text(raw))
}

fn classify_error(object: &JsonObject) -> Option<ParsedResponse> {
    let details = optional_object(object, "details")?;
    let error_type = string_with_details(object, details.as_ref(), "error_type", "unknown")?;
    let message = string_with_details(object, details.as_ref(), "message", "")?;
    Some(ParsedResponse::Error {
        content: string_or(object, "error", "")?,
        error_type,
        message,
        details,
        metadata: metadata(object),
    })
}

fn classify_action(object: &JsonObject) -> Option<ParsedResponse> {
    let actions = match object.get("actions")? {
        JsonValue::Array(items) => items
            .iter()
            .map(|item| item.as_object().cloned())
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };
    let result = match object.get("result") {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(_) => return None,
    };
    Some(ParsedResponse::Action {
        content: string_or(object, "content", "")?,
        actions,
        result,
        metadata: metadata(object),
    })
}

fn classify_info(object: &JsonObject) -> Option<ParsedResponse> {
    let info_type = object.get("info_type")?.as_str()?.to_string();
    let data = match object.get("data") {
        None => JsonObject::new(),
        Some(JsonValue::Object(data)) => data.clone(),
        Some(_) => return None,
    };
    Some(ParsedResponse::Info {
        content: string_or(object, "content", "")?,
        info_type,
        data,
        metadata: metadata(object),
    })
}

/// A string field with a default when absent. `None` means the field is
/// present with the wrong type.
fn string_or(object: &JsonObject, key: &str, default: &str) -> Option<String> {
    match object.get(key) {
        None => Some(default.to_string()),
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(_) => None,
    }
}

/// Like [`string_or`], but an absent top-level field falls back to the same
/// key inside `details`.
fn string_with_details(
    object: &JsonObject,
    details: Option<&JsonObject>,
    key: &str,
    default: &str,
) -> Option<String> {
    if object.contains_key(key) {
        return string_or(object, key, default);
    }
    let nested = details
        .and_then(|d| d.get(key))
        .and_then(JsonValue::as_str)
        .unwrap_or(default);
    Some(nested.to_string())
}

/// An optional object field; null counts as absent. `None` means the field
/// is present with the wrong type.
fn optional_object(object: &JsonObject, key: &str) -> Option<Option<JsonObject>> {
    match object.get(key) {
        None | Some(JsonValue::Null) => Some(None),
        Some(JsonValue::Object(o)) => Some(Some(o.clone())),
        Some(_) => None,
    }
}

fn metadata(object: &JsonObject) -> Option<JsonObject> {
    object.get("metadata").and_then(JsonValue::as_object).cloned()
}
