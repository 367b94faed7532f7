//! Session identifiers.
//!
//! A session id is an opaque string supplied by the caller (or generated
//! once at start-up). It ends up inside backing-store keys, so parsing
//! rejects values that would be awkward there.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Longest accepted session identifier.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Identifier of a single logical conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh identifier backed by a ULID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{}_{}", Self::prefix(), Ulid::new()))
    }

    /// Returns the prefix used for generated identifiers.
    #[must_use]
    pub const fn prefix() -> &'static str {
        "sess"
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reject = |reason: &str| ParseIdError {
            id_type: "SessionId",
            reason: reason.to_string(),
        };

        if s.is_empty() {
            return Err(reject("empty"));
        }
        if s.len() > MAX_SESSION_ID_LEN {
            return Err(reject("longer than 128 bytes"));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(reject("contains whitespace or control characters"));
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for SessionId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
