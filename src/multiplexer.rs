//! Event multiplexer for inbound channel events
//!
//! Each [`EventKind`] has at most one handler. Registering a handler for a
//! kind that already has one replaces it silently: the most recently mounted
//! consumer owns the kind, and earlier consumers stop receiving it. Events
//! whose kind has no handler are dropped.
//!
//! ```
//! use ada_client::multiplexer::EventMultiplexer;
//! use ada_client::types::{InboundEvent, TokenFrame};
//!
//! let mut mux = EventMultiplexer::new();
//! mux.on_message(|frame| log::info!("chunk: {}", frame.text));
//! assert!(mux.dispatch(&InboundEvent::Message(TokenFrame::chunk("hi"))));
//! assert!(!mux.dispatch(&InboundEvent::EndOfTurn));
//! ```

use std::collections::HashMap;

use crate::types::events::{EventKind, InboundEvent};
use crate::types::messages::{Article, AuthenticationResult, QuickReplyOption, Settings, TokenFrame};

/// Handler for one event kind
pub type EventHandler = Box<dyn FnMut(&InboundEvent) + Send>;

/// Single-subscriber-per-kind event router
pub struct EventMultiplexer {
    handlers: HashMap<EventKind, EventHandler>,
}

impl EventMultiplexer {
    /// Create a multiplexer with no handlers
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for a kind
    ///
    /// Returns `true` if a previous handler was replaced.
    pub fn register<F>(&mut self, kind: EventKind, handler: F) -> bool
    where
        F: FnMut(&InboundEvent) + Send + 'static,
    {
        let replaced = self.handlers.insert(kind, Box::new(handler)).is_some();
        if replaced {
            log::debug!("Replaced handler for {kind:?}");
        }
        replaced
    }

    /// Remove the handler for a kind
    pub fn unregister(&mut self, kind: EventKind) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    /// Whether a kind has a handler
    #[must_use]
    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Deliver an event to its handler
    ///
    /// Returns `false` if the event was dropped for lack of a handler.
    pub fn dispatch(&mut self, event: &InboundEvent) -> bool {
        let kind = event.kind();
        match self.handlers.get_mut(&kind) {
            Some(handler) => {
                handler(event);
                true
            }
            None => {
                log::debug!("No handler for {kind:?}, dropping event");
                false
            }
        }
    }

    /// Handle channel connection
    pub fn on_connect<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        self.register(EventKind::Connect, move |_| f())
    }

    /// Handle channel disconnection
    pub fn on_disconnect<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.register(EventKind::Disconnect, move |event| {
            if let InboundEvent::Disconnected { reason } = event {
                f(reason);
            }
        })
    }

    /// Handle channel connect failures
    pub fn on_connect_error<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.register(EventKind::ConnectError, move |event| {
            if let InboundEvent::ConnectError { reason } = event {
                f(reason);
            }
        })
    }

    /// Handle session settings
    pub fn on_init<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&Settings) + Send + 'static,
    {
        self.register(EventKind::Init, move |event| {
            if let InboundEvent::Init(settings) = event {
                f(settings);
            }
        })
    }

    /// Handle streamed message frames
    pub fn on_message<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&TokenFrame) + Send + 'static,
    {
        self.register(EventKind::Message, move |event| {
            if let InboundEvent::Message(frame) = event {
                f(frame);
            }
        })
    }

    /// Handle end of turn
    pub fn on_end_of_turn<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        self.register(EventKind::EndOfTurn, move |_| f())
    }

    /// Handle quick reply options
    pub fn on_options<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&[QuickReplyOption]) + Send + 'static,
    {
        self.register(EventKind::Options, move |event| {
            if let InboundEvent::Options(options) = event {
                f(options);
            }
        })
    }

    /// Handle recommendations
    pub fn on_recommendations<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&[Article]) + Send + 'static,
    {
        self.register(EventKind::Recommendations, move |event| {
            if let InboundEvent::Recommendations(articles) = event {
                f(articles);
            }
        })
    }

    /// Handle bookmarks
    pub fn on_bookmarks<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&[Article]) + Send + 'static,
    {
        self.register(EventKind::Bookmarks, move |event| {
            if let InboundEvent::Bookmarks(articles) = event {
                f(articles);
            }
        })
    }

    /// Handle preferences
    pub fn on_preferences<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&[String]) + Send + 'static,
    {
        self.register(EventKind::Preferences, move |event| {
            if let InboundEvent::Preferences(topics) = event {
                f(topics);
            }
        })
    }

    /// Handle restart directives
    pub fn on_restart<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        self.register(EventKind::Restart, move |_| f())
    }

    /// Handle login / register results
    pub fn on_authentication<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&AuthenticationResult) + Send + 'static,
    {
        self.register(EventKind::Authentication, move |event| {
            if let InboundEvent::Authentication(result) = event {
                f(result);
            }
        })
    }
}

impl Default for EventMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort_by_key(|kind| format!("{kind:?}"));
        f.debug_struct("EventMultiplexer")
            .field("registered", &kinds)
            .finish()
    }
}
