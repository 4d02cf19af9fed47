//! Construction, handler wiring and operations of `AdaClient`

use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;

use crate::Transport;
use crate::activity::ActivityLogger;
use crate::busy::BusyBus;
use crate::channel::{ChannelConfig, ChannelHandle, ChannelManager, ChannelState};
use crate::chat::ChatSession;
use crate::error::Result;
use crate::identity::{IdentityStore, ParticipantToken};
use crate::multiplexer::EventMultiplexer;
use crate::panels::{PreferencesPanel, SidePanel};
use crate::sequencer::{TaskAssignment, TaskSequencer};
use crate::storage::{FileStore, MemoryStore, SharedStore};
use crate::transport::WebSocketTransport;
use crate::types::events::{InboundEvent, OutboundEvent};
use crate::types::messages::{AuthenticationResult, ConversationStyle};
use crate::types::options::ClientOptions;

use super::AdaClient;

impl AdaClient<WebSocketTransport> {
    /// Create a client talking to the configured server over WebSocket
    ///
    /// The profile lives in `options.storage_path` when set, in memory
    /// otherwise.
    ///
    /// # Errors
    /// Returns error if the options are invalid or the profile cannot be
    /// opened
    pub fn from_options(options: ClientOptions) -> Result<Self> {
        let store: SharedStore = match &options.storage_path {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let transport = WebSocketTransport::from_options(&options);
        Self::new(transport, store, options)
    }
}

impl<T: Transport + 'static> AdaClient<T> {
    /// Create a client over a transport and a profile store
    ///
    /// Resolves the participant identity once, wires the default event
    /// handlers and logs `App start`. The channel is not opened yet.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    /// Returns error if the options are invalid or the profile cannot be
    /// read or written
    pub fn new(transport: T, store: SharedStore, options: ClientOptions) -> Result<Self> {
        options.validate()?;

        let token = IdentityStore::new(store.clone())
            .resolve_identity(options.participant_id.as_deref())?;

        let channel = ChannelManager::new(transport, ChannelConfig::from_options(&options)?);
        let handle = channel.handle();
        let activity = ActivityLogger::new(store.clone(), handle.clone(), options.page.clone());

        let bus = BusyBus::new();
        let chat = ChatSession::new(bus.clone(), handle.clone(), activity.clone());
        let side = SidePanel::new(bus.clone(), handle.clone(), activity.clone());
        let preferences = PreferencesPanel::new(handle);

        let rng = options
            .rng_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let sequencer = TaskSequencer::new(store.clone(), rng);

        let mut client = Self {
            options,
            store,
            token,
            channel,
            multiplexer: EventMultiplexer::new(),
            bus,
            chat,
            side,
            preferences,
            sequencer,
            activity,
            authentication: Arc::new(Mutex::new(None)),
        };
        client.wire_default_handlers();
        client.activity.log_event("App start", None);

        Ok(client)
    }

    fn wire_default_handlers(&mut self) {
        let mux = &mut self.multiplexer;

        mux.on_connect(|| log::info!("Connected to agent"));
        mux.on_disconnect(|reason| log::warn!("Disconnected from agent: {reason}"));
        mux.on_connect_error(|reason| log::error!("Connection error: {reason}"));

        let chat = self.chat.clone();
        mux.on_init(move |settings| chat.handle_init(settings));

        let chat = self.chat.clone();
        mux.on_message(move |frame| {
            chat.handle_message(frame);
        });

        let chat = self.chat.clone();
        mux.on_end_of_turn(move || chat.handle_end_of_turn());

        let chat = self.chat.clone();
        mux.on_options(move |options| chat.handle_options(options));

        let chat = self.chat.clone();
        mux.on_restart(move || chat.handle_restart());

        let side = self.side.clone();
        mux.on_recommendations(move |articles| side.handle_recommendations(articles));

        let side = self.side.clone();
        mux.on_bookmarks(move |articles| side.handle_bookmarks(articles));

        let preferences = self.preferences.clone();
        mux.on_preferences(move |topics| preferences.handle_preferences(topics));

        let slot = self.authentication.clone();
        mux.on_authentication(move |result| {
            if result.success {
                log::info!("Authentication succeeded");
            } else {
                log::warn!(
                    "Authentication failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            *slot.lock() = Some(result.clone());
        });
    }

    // ------------------------------------------------------------------------
    // Channel
    // ------------------------------------------------------------------------

    /// Open the channel
    ///
    /// # Errors
    /// Returns error if connect or handshake fail or time out
    pub async fn connect(&mut self) -> Result<()> {
        self.channel.open().await.map(|_| ())
    }

    /// Tear down the channel and open a fresh one
    ///
    /// This is the retry after a failed connect or a lost connection.
    ///
    /// # Errors
    /// Returns error if the new connection cannot be established
    pub async fn reconnect(&mut self) -> Result<()> {
        self.channel.reconnect().await
    }

    /// Close the channel
    ///
    /// # Errors
    /// Returns error if the transport fails to close
    pub async fn close(&mut self) -> Result<()> {
        self.channel.close().await
    }

    /// Read the next inbound event and run its handler
    ///
    /// Returns the event once its handler finished, or `None` when the
    /// channel is closed or gone. While the agent is busy and nothing arrives
    /// for the stall threshold, a warning is logged and waiting continues.
    pub async fn process_next_event(&mut self) -> Option<InboundEvent> {
        let threshold = self.options.turn_stall_warning;
        loop {
            let next = if self.bus.is_busy() && !threshold.is_zero() {
                match tokio::time::timeout(threshold, self.channel.next_event()).await {
                    Ok(next) => next,
                    Err(_) => {
                        log::warn!(
                            "Agent busy for {:?} without any event",
                            self.bus.busy_for().unwrap_or(threshold)
                        );
                        continue;
                    }
                }
            } else {
                self.channel.next_event().await
            };

            let event = next?;
            self.multiplexer.dispatch(&event);
            return Some(event);
        }
    }

    // ------------------------------------------------------------------------
    // Study flow
    // ------------------------------------------------------------------------

    /// Enter the current task slot
    ///
    /// Reconnects the channel, resets the chat and side panel, selects the
    /// slot's style and asks the agent to open the conversation.
    ///
    /// # Errors
    /// Returns error if the profile cannot be read or written
    pub async fn enter_task(
        &mut self,
        forced_style: Option<ConversationStyle>,
    ) -> Result<TaskAssignment> {
        let assignment = self
            .sequencer
            .enter_task(&mut self.channel, forced_style)
            .await?;

        self.chat.reset();
        self.side.reset();
        self.chat.set_style_switchable(assignment.style_switchable);
        self.chat.select_style(assignment.style);
        self.chat.start_conversation();
        self.side.request_bookmarks();

        Ok(assignment)
    }

    /// Finish the current task and advance to the next slot
    ///
    /// # Errors
    /// Returns `AdaError::NoActiveTask` if no task was entered, or a storage
    /// error if the profile cannot be written
    pub fn complete_task(
        &mut self,
        forced_next: Option<ConversationStyle>,
    ) -> Result<TaskAssignment> {
        self.activity.log_event("Task completed", None);
        self.sequencer.complete_task(forced_next)
    }

    /// Forget the whole profile at the end of the study
    ///
    /// # Errors
    /// Returns error if the profile cannot be cleared
    pub fn finish_study(&mut self) -> Result<()> {
        self.sequencer.finish_study()
    }

    /// Move to another study page
    pub fn navigate(&self, page: impl Into<String>) {
        self.activity.log_event("navigation", None);
        self.activity.set_page(page);
    }

    /// Show or hide the task hints
    pub fn set_hints_open(&self, open: bool) {
        let event = if open { "Open hints" } else { "Close hints" };
        self.activity.log_event(event, None);
    }

    /// Log in an existing account; the result arrives as an event
    pub fn login(&self, username: impl Into<String>, password: impl Into<String>) {
        self.channel.handle().emit(OutboundEvent::Login {
            username: username.into(),
            password: password.into(),
        });
    }

    /// Register a new account; the result arrives as an event
    pub fn register(&self, username: impl Into<String>, password: impl Into<String>) {
        self.channel.handle().emit(OutboundEvent::Register {
            username: username.into(),
            password: password.into(),
        });
    }

    /// Log a custom activity event
    pub fn log_event(&self, event: &str, metadata: Option<serde_json::Value>) {
        self.activity.log_event(event, metadata);
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Participant token resolved at construction
    #[must_use]
    pub const fn token(&self) -> &ParticipantToken {
        &self.token
    }

    /// Options the client was built with
    #[must_use]
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Persisted profile
    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Chat session
    #[must_use]
    pub const fn chat(&self) -> &ChatSession {
        &self.chat
    }

    /// Recommendations and bookmarks
    #[must_use]
    pub const fn side_panel(&self) -> &SidePanel {
        &self.side
    }

    /// Preference topics
    #[must_use]
    pub const fn preferences(&self) -> &PreferencesPanel {
        &self.preferences
    }

    /// Busy bus shared by the panels
    #[must_use]
    pub const fn bus(&self) -> &BusyBus {
        &self.bus
    }

    /// Activity logger
    #[must_use]
    pub const fn activity(&self) -> &ActivityLogger {
        &self.activity
    }

    /// Event multiplexer, for replacing the default handlers
    pub fn multiplexer_mut(&mut self) -> &mut EventMultiplexer {
        &mut self.multiplexer
    }

    /// Handle for emitting events directly
    #[must_use]
    pub fn handle(&self) -> ChannelHandle {
        self.channel.handle()
    }

    /// Current channel state
    #[must_use]
    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Watch the channel state
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.channel.subscribe_state()
    }

    /// Current task slot, if a task was entered
    #[must_use]
    pub fn current_task(&self) -> Option<TaskAssignment> {
        self.sequencer.current()
    }

    /// Result of the last login or register request
    #[must_use]
    pub fn authentication(&self) -> Option<AuthenticationResult> {
        self.authentication.lock().clone()
    }
}
