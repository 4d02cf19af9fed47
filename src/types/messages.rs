//! Chat and panel payload definitions
//!
//! This module contains the records exchanged with the agent and the
//! transcript types built from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::identifiers::{ArticleId, OptionId};
use crate::error::AdaError;

// ============================================================================
// Transcript Types
// ============================================================================

/// Marker carried by the first frame of a new system turn
pub const NEW_TURN_MARKER: &str = "NEW";

/// Who authored a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Typed or selected by the participant
    User,
    /// Streamed by the agent
    System,
}

/// One turn of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Turn author
    pub origin: Origin,
    /// Turn text, grows while a system turn is streaming
    pub text: String,
}

impl ChatTurn {
    /// Create a user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::User,
            text: text.into(),
        }
    }

    /// Create a system turn
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::System,
            text: text.into(),
        }
    }
}

/// Streamed message frame sent by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFrame {
    /// Text chunk
    #[serde(default)]
    pub text: String,
    /// `"NEW"` when the frame opens a new system turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Dialogue intent label, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl TokenFrame {
    /// Frame that opens a new system turn
    pub fn new_turn(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            info: Some(NEW_TURN_MARKER.to_string()),
            intent: None,
        }
    }

    /// Frame that continues the current turn
    pub fn chunk(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            info: None,
            intent: None,
        }
    }

    /// Whether this frame starts a new turn
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.info.as_deref() == Some(NEW_TURN_MARKER)
    }
}

// ============================================================================
// Quick Replies and Keystrokes
// ============================================================================

/// Quick reply button offered by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReplyOption {
    /// Option id echoed back on selection
    pub id: OptionId,
    /// Full text shown in the transcript once selected
    #[serde(rename = "text")]
    pub full_text: String,
    /// Short label for the button
    #[serde(rename = "short_text", default)]
    pub short_label: String,
}

/// Keystroke captured while typing a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystroke {
    /// Last character typed
    pub key: String,
    /// ISO-8601 capture time
    pub timestamp: String,
}

// ============================================================================
// Articles
// ============================================================================

/// Recommended or bookmarked article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Article id
    #[serde(rename = "item_id")]
    pub id: ArticleId,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Abstract text
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    /// Author names
    #[serde(default)]
    pub authors: Vec<String>,
    /// Relevance score assigned by the recommender
    #[serde(rename = "score", default)]
    pub relevance_score: f64,
}

// ============================================================================
// Session Settings and Styles
// ============================================================================

/// Conversational style of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStyle {
    /// Agent waits for the participant to lead
    Considerate,
    /// Agent proactively suggests directions
    Involved,
}

impl ConversationStyle {
    /// The other style
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Considerate => Self::Involved,
            Self::Involved => Self::Considerate,
        }
    }

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Considerate => "considerate",
            Self::Involved => "involved",
        }
    }
}

impl fmt::Display for ConversationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStyle {
    type Err = AdaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "considerate" => Ok(Self::Considerate),
            "involved" => Ok(Self::Involved),
            other => Err(AdaError::invalid_config(format!(
                "unknown conversation style: {other}"
            ))),
        }
    }
}

fn default_style_name() -> String {
    "default".to_string()
}

/// Style part of the session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSettings {
    /// Style name chosen by the agent
    #[serde(default = "default_style_name")]
    pub name: String,
    /// Whether the participant may switch styles
    #[serde(rename = "showStyleSwitch", default)]
    pub show_style_switch: bool,
}

impl Default for StyleSettings {
    fn default() -> Self {
        Self {
            name: default_style_name(),
            show_style_switch: false,
        }
    }
}

/// Settings pushed by the agent on `init`, merged over defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Style settings
    #[serde(default)]
    pub style: StyleSettings,
}

/// Result of a `login` or `register` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    /// Whether the request succeeded
    pub success: bool,
    /// Reason for a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
