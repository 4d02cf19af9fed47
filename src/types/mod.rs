//! Type definitions for the study client
//!
//! - [`identifiers`] - Type-safe ID wrappers (`ParticipantId`, `ArticleId`, `OptionId`)
//! - [`messages`] - Transcript, token frame, article and settings records
//! - [`events`] - Inbound and outbound channel events
//! - [`options`] - Client configuration

pub mod events;
pub mod identifiers;
pub mod messages;
pub mod options;

// Re-export commonly used types
pub use events::{EventKind, InboundEvent, OutboundEvent};
pub use identifiers::{ArticleId, OptionId, ParticipantId};
pub use messages::{
    Article, AuthenticationResult, ChatTurn, ConversationStyle, Keystroke, NEW_TURN_MARKER,
    Origin, QuickReplyOption, Settings, StyleSettings, TokenFrame,
};
pub use options::{ClientOptions, ClientOptionsBuilder};
