//! `AdaClient`, the study client facade
//!
//! The client owns one of each component and wires them together:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         AdaClient                             │
//! │                                                               │
//! │  IdentityStore ─┐                      ┌─ ChatSession ──┐     │
//! │  TaskSequencer ─┼─ SharedStore         ├─ SidePanel     ├─ BusyBus
//! │  ActivityLogger ┘                      └─ Preferences   │     │
//! │                                                ▲              │
//! │  ChannelManager ──next_event──→ EventMultiplexer┘             │
//! │        ▲                                                      │
//! │        └── ChannelHandle (emit) ← every component             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inbound events are pumped one at a time by [`AdaClient::process_next_event`]
//! and run to completion in their handler before the next one is read.
//!
//! # Example
//!
//! ```no_run
//! use ada_client::{AdaClient, ClientOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ClientOptions::builder()
//!     .server_url("http://127.0.0.1:5000/")
//!     .participant_id("P-042")
//!     .build();
//! let mut client = AdaClient::from_options(options)?;
//!
//! let task = client.enter_task(None).await?;
//! log::info!("Task {} on topic {}", task.slot + 1, task.topic_index);
//!
//! while let Some(event) = client.process_next_event().await {
//!     if !client.chat().is_busy() {
//!         client.chat().send_message("Show me papers on graph neural networks")?;
//!     }
//!     log::debug!("{:?}", event.kind());
//! }
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod client_impl;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::Transport;
use crate::activity::ActivityLogger;
use crate::busy::BusyBus;
use crate::channel::ChannelManager;
use crate::chat::ChatSession;
use crate::identity::ParticipantToken;
use crate::multiplexer::EventMultiplexer;
use crate::panels::{PreferencesPanel, SidePanel};
use crate::sequencer::TaskSequencer;
use crate::storage::SharedStore;
use crate::types::messages::AuthenticationResult;
use crate::types::options::ClientOptions;

/// Study client
pub struct AdaClient<T: Transport> {
    options: ClientOptions,
    store: SharedStore,
    token: ParticipantToken,
    channel: ChannelManager<T>,
    multiplexer: EventMultiplexer,
    bus: BusyBus,
    chat: ChatSession,
    side: SidePanel,
    preferences: PreferencesPanel,
    sequencer: TaskSequencer,
    activity: ActivityLogger,
    authentication: Arc<Mutex<Option<AuthenticationResult>>>,
}
