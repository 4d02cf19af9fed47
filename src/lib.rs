//! # ADA study client
//!
//! Client side of the ArXivDigest Assistant (ADA) user study: a participant
//! talks to a conversational research-paper recommender while the client
//! streams the agent's replies, tracks recommendations and bookmarks, and
//! walks the participant through three tasks with randomized topics and
//! conversation styles.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ada_client::{AdaClient, ClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = AdaClient::from_options(ClientOptions::from_env()?)?;
//!     client.enter_task(None).await?;
//!
//!     while let Some(_event) = client.process_next_event().await {
//!         if let Some(turn) = client.chat().last_turn() {
//!             log::info!("{:?}: {}", turn.origin, turn.text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Components
//!
//! - [`identity`]: participant token with expiry; an expired token wipes the
//!   whole persisted profile
//! - [`channel`]: the single live Socket.IO connection, with explicit
//!   reconnect as the only retry
//! - [`multiplexer`]: one handler per inbound event kind, last writer wins
//! - [`assembler`]: turns streamed token frames into chat turns
//! - [`busy`]: busy flag and explain callback shared between panels
//! - [`sequencer`]: topic permutation, topic set and style per task slot
//! - [`chat`], [`panels`], [`activity`]: what the participant sees and does
//!
//! ## Transports
//!
//! [`WebSocketTransport`] talks to a real agent server. [`MemoryTransport`]
//! pairs the client with a scripted in-process [`MemoryPeer`], which is what
//! the tests use.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod activity;
pub mod assembler;
pub mod busy;
pub mod channel;
pub mod chat;
pub mod client;
pub mod error;
pub mod identity;
pub mod message;
pub mod multiplexer;
pub mod panels;
pub mod protocol;
pub mod sequencer;
pub mod storage;
pub mod transport;
pub mod types;

// Re-export commonly used types for external API
pub use activity::ActivityLogger;
pub use assembler::{FrameOutcome, MessageAssembler};
pub use busy::BusyBus;
pub use channel::{ChannelConfig, ChannelControl, ChannelHandle, ChannelManager, ChannelState};
pub use chat::ChatSession;
pub use client::AdaClient;
pub use error::{AdaError, Result};
pub use identity::{IdentityStore, ParticipantToken};
pub use message::parse_event;
pub use multiplexer::EventMultiplexer;
pub use panels::{PanelTab, PreferencesPanel, SidePanel};
pub use sequencer::{TaskAssignment, TaskSequenceState, TaskSequencer};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use transport::{Endpoint, MemoryPeer, MemoryTransport, Transport, WebSocketTransport};

// Re-export type submodules for flat public API
pub use types::events::{EventKind, InboundEvent, OutboundEvent};
pub use types::identifiers::{ArticleId, OptionId, ParticipantId};
pub use types::messages::{
    Article, AuthenticationResult, ChatTurn, ConversationStyle, Keystroke, Origin,
    QuickReplyOption, Settings, StyleSettings, TokenFrame,
};
pub use types::options::{ClientOptions, ClientOptionsBuilder};

/// Version of the client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
