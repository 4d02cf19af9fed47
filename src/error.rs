//! Error types for the study client

use thiserror::Error;

/// Main error type for the study client
#[derive(Error, Debug)]
pub enum AdaError {
    /// Connection error while opening or keeping the channel
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Engine.IO / Socket.IO protocol violation
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON decode error when parsing payloads or persisted records
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// Inbound event that could not be turned into a typed event
    #[error("Event parse error for '{event}': {message}")]
    EventParse {
        /// Event name as received
        event: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A turn-initiating action was attempted while the agent is busy
    #[error("Agent is busy")]
    Busy,

    /// No explain handler has been registered on the busy bus
    #[error("No explain handler registered")]
    NoExplainHandler,

    /// Article is not part of the current recommendations
    #[error("Article not found: {0}")]
    ArticleNotFound(String),

    /// Quick reply option is not part of the current option set
    #[error("Quick reply option not found: {0}")]
    OptionNotFound(String),

    /// Style switching is not available for the current task
    #[error("Style switching is not allowed for the current task")]
    StyleLocked,

    /// Operation needs an entered task
    #[error("No active task")]
    NoActiveTask,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for study client operations
pub type Result<T> = std::result::Result<T, AdaError>;

impl AdaError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an event parse error
    pub fn event_parse(event: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::EventParse {
            event: event.into(),
            message: msg.into(),
        }
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an article not found error
    pub fn article_not_found(id: impl Into<String>) -> Self {
        Self::ArticleNotFound(id.into())
    }

    /// Create an option not found error
    pub fn option_not_found(id: impl Into<String>) -> Self {
        Self::OptionNotFound(id.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error means the channel itself is unusable
    #[must_use]
    pub const fn is_channel_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Transport(_) | Self::Timeout(_)
        )
    }
}
