//! Typed events exchanged over the session channel
//!
//! Inbound events are produced by the channel reader (lifecycle events) and by
//! [`crate::message::parse_event`] (agent events). Outbound events are what the
//! client emits to the agent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::identifiers::{ArticleId, OptionId};
use super::messages::{
    Article, AuthenticationResult, ConversationStyle, Keystroke, QuickReplyOption, Settings,
    TokenFrame,
};

// ============================================================================
// Inbound Events
// ============================================================================

/// Kind of an inbound event, used as the multiplexer key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Channel connected
    Connect,
    /// Channel disconnected
    Disconnect,
    /// Channel failed to connect
    ConnectError,
    /// Session settings
    Init,
    /// Streamed message frame
    Message,
    /// End of the current agent turn
    EndOfTurn,
    /// Quick reply options
    Options,
    /// Recommended articles
    Recommendations,
    /// Bookmarked articles
    Bookmarks,
    /// Participant preferences
    Preferences,
    /// Conversation restart directive
    Restart,
    /// Login / register result
    Authentication,
}

impl EventKind {
    /// All kinds, in declaration order
    pub const ALL: [Self; 12] = [
        Self::Connect,
        Self::Disconnect,
        Self::ConnectError,
        Self::Init,
        Self::Message,
        Self::EndOfTurn,
        Self::Options,
        Self::Recommendations,
        Self::Bookmarks,
        Self::Preferences,
        Self::Restart,
        Self::Authentication,
    ];

    /// Event name on the wire, `None` for channel lifecycle kinds
    #[must_use]
    pub const fn wire_name(self) -> Option<&'static str> {
        match self {
            Self::Connect | Self::Disconnect | Self::ConnectError => None,
            Self::Init => Some("init"),
            Self::Message => Some("message"),
            Self::EndOfTurn => Some("EOT"),
            Self::Options => Some("options"),
            Self::Recommendations => Some("recommendations"),
            Self::Bookmarks => Some("bookmarks"),
            Self::Preferences => Some("preferences"),
            Self::Restart => Some("restart"),
            Self::Authentication => Some("authentication"),
        }
    }

    /// Look up an agent event kind by its wire name
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.wire_name() == Some(name))
    }
}

/// Event delivered to the multiplexer
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Channel connected
    Connected,
    /// Channel disconnected
    Disconnected {
        /// Why the channel went away
        reason: String,
    },
    /// Channel failed to connect
    ConnectError {
        /// Failure reason
        reason: String,
    },
    /// Session settings, already merged over defaults
    Init(Settings),
    /// Streamed message frame
    Message(TokenFrame),
    /// End of the current agent turn
    EndOfTurn,
    /// Quick reply options
    Options(Vec<QuickReplyOption>),
    /// Recommended articles
    Recommendations(Vec<Article>),
    /// Bookmarked articles
    Bookmarks(Vec<Article>),
    /// Participant preferences
    Preferences(Vec<String>),
    /// Conversation restart directive
    Restart,
    /// Login / register result
    Authentication(AuthenticationResult),
}

impl InboundEvent {
    /// Kind of this event
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connect,
            Self::Disconnected { .. } => EventKind::Disconnect,
            Self::ConnectError { .. } => EventKind::ConnectError,
            Self::Init(_) => EventKind::Init,
            Self::Message(_) => EventKind::Message,
            Self::EndOfTurn => EventKind::EndOfTurn,
            Self::Options(_) => EventKind::Options,
            Self::Recommendations(_) => EventKind::Recommendations,
            Self::Bookmarks(_) => EventKind::Bookmarks,
            Self::Preferences(_) => EventKind::Preferences,
            Self::Restart => EventKind::Restart,
            Self::Authentication(_) => EventKind::Authentication,
        }
    }
}

// ============================================================================
// Outbound Events
// ============================================================================

/// Event emitted by the client to the agent
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// Ask the agent to open the conversation
    StartConversation,
    /// Participant message with keystroke metadata
    Message {
        /// Message text as typed
        message: String,
        /// Keystrokes captured while typing
        keystrokes: Vec<Keystroke>,
    },
    /// Quick reply selection
    SelectOption {
        /// Selected option
        option: QuickReplyOption,
    },
    /// Bookmark an article
    AddBookmark {
        /// Article id
        item_id: ArticleId,
    },
    /// Remove a bookmark
    RemoveBookmark {
        /// Article id
        item_id: ArticleId,
    },
    /// Drop a preference topic
    RemovePreference {
        /// Topic name
        topic: String,
    },
    /// Request the bookmark list
    GetBookmarks,
    /// Request the preference list
    GetPreferences,
    /// Request a recommendation explanation
    GetExplanation {
        /// Article id
        item_id: ArticleId,
    },
    /// Select the conversation style
    SetStyle {
        /// Style
        style: ConversationStyle,
    },
    /// Study activity log record, already flattened
    LogEvent(Map<String, Value>),
    /// Log in an existing account
    Login {
        /// User name
        username: String,
        /// Password
        password: String,
    },
    /// Register a new account
    Register {
        /// User name
        username: String,
        /// Password
        password: String,
    },
}

impl OutboundEvent {
    /// Event name on the wire
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StartConversation => "start_conversation",
            Self::Message { .. } => "message",
            Self::SelectOption { .. } => "select_option",
            Self::AddBookmark { .. } => "add_bookmark",
            Self::RemoveBookmark { .. } => "remove_bookmark",
            Self::RemovePreference { .. } => "remove_preference",
            Self::GetBookmarks => "get_bookmarks",
            Self::GetPreferences => "get_preferences",
            Self::GetExplanation { .. } => "get_explanation",
            Self::SetStyle { .. } => "set_style",
            Self::LogEvent(_) => "log_event",
            Self::Login { .. } => "login",
            Self::Register { .. } => "register",
        }
    }

    /// JSON payload sent after the event name
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::StartConversation | Self::GetBookmarks | Self::GetPreferences => json!({}),
            Self::Message {
                message,
                keystrokes,
            } => json!({
                "message": message,
                "metadata": { "keystrokes": keystrokes },
            }),
            Self::SelectOption { option } => json!({ "option": option }),
            Self::AddBookmark { item_id }
            | Self::RemoveBookmark { item_id }
            | Self::GetExplanation { item_id } => json!({ "item_id": item_id }),
            Self::RemovePreference { topic } => json!({ "topic": topic }),
            Self::SetStyle { style } => json!({ "style": style }),
            Self::LogEvent(record) => Value::Object(record.clone()),
            Self::Login { username, password } | Self::Register { username, password } => {
                json!({ "username": username, "password": password })
            }
        }
    }
}
