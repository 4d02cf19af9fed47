//! Newtype wrappers for type safety
//!
//! This module contains newtype wrappers that keep participant, article and
//! quick-reply identifiers from being mixed up with plain strings.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Newtype Wrappers for Type Safety
// ============================================================================

/// Participant identifier newtype
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a new participant ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the participant ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Article identifier newtype (`item_id` on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    /// Create a new article ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the article ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ArticleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArticleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Quick reply option identifier
///
/// The agent sends numeric ids, but textual ids are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionId {
    /// Numeric id
    Number(i64),
    /// Textual id
    Text(String),
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for OptionId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for OptionId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
