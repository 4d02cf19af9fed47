//! Chat session: transcript, quick replies, keystrokes and style
//!
//! [`ChatSession`] is a cheap clonable handle. The multiplexer handlers, the
//! busy bus explain callback and the caller all share one session state.

use std::sync::{Arc, Weak};

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::json;

use crate::activity::ActivityLogger;
use crate::assembler::{FrameOutcome, MessageAssembler};
use crate::busy::BusyBus;
use crate::channel::ChannelHandle;
use crate::error::{AdaError, Result};
use crate::types::events::OutboundEvent;
use crate::types::identifiers::OptionId;
use crate::types::messages::{
    Article, ChatTurn, ConversationStyle, Keystroke, QuickReplyOption, Settings, TokenFrame,
};

/// Text echoed when the participant asks to explain a recommendation
fn explain_prompt(article: &Article) -> String {
    format!("Explain recommendation for the article: {}", article.title)
}

struct ChatState {
    assembler: MessageAssembler,
    quick_replies: Vec<QuickReplyOption>,
    keystrokes: Vec<Keystroke>,
    selected_style: Option<ConversationStyle>,
    style_switchable: bool,
    conversation_started: bool,
    settings: Settings,
}

/// Chat panel state shared across handlers
#[derive(Clone)]
pub struct ChatSession {
    state: Arc<Mutex<ChatState>>,
    bus: BusyBus,
    handle: ChannelHandle,
    activity: ActivityLogger,
}

impl ChatSession {
    /// Create a session and register its explain handler on the bus
    pub fn new(bus: BusyBus, handle: ChannelHandle, activity: ActivityLogger) -> Self {
        let state = Arc::new(Mutex::new(ChatState {
            assembler: MessageAssembler::new(bus.clone()),
            quick_replies: Vec::new(),
            keystrokes: Vec::new(),
            selected_style: None,
            style_switchable: false,
            conversation_started: false,
            settings: Settings::default(),
        }));

        // Weak, the bus is owned by the state's assembler
        let weak: Weak<Mutex<ChatState>> = Arc::downgrade(&state);
        bus.register_explain_handler(move |article: &Article| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            if let Err(e) = state.lock().assembler.begin_user_turn(explain_prompt(article)) {
                log::warn!("Explain request for {} ignored: {e}", article.id);
            }
        });

        Self {
            state,
            bus,
            handle,
            activity,
        }
    }

    // ------------------------------------------------------------------------
    // Conversation
    // ------------------------------------------------------------------------

    /// Ask the agent to open the conversation
    ///
    /// Returns `false` if the conversation was already started.
    pub fn start_conversation(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.conversation_started {
                return false;
            }
            state.conversation_started = true;
            state.assembler.await_agent();
        }
        self.handle.emit(OutboundEvent::StartConversation);
        self.activity.log_event("Start conversation", None);
        true
    }

    /// Select the conversation style
    ///
    /// `set_style` is emitted only when the style changes. Returns whether it
    /// was emitted.
    pub fn select_style(&self, style: ConversationStyle) -> bool {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.selected_style != Some(style);
            state.selected_style = Some(style);
            changed
        };
        if changed {
            self.handle.emit(OutboundEvent::SetStyle { style });
        }
        changed
    }

    /// Flip the style from the chat header switch
    ///
    /// # Errors
    /// Returns `AdaError::StyleLocked` outside the switchable task and
    /// `AdaError::Busy` while the agent is replying
    pub fn toggle_style(&self) -> Result<ConversationStyle> {
        let style = {
            let mut state = self.state.lock();
            if !state.style_switchable {
                return Err(AdaError::StyleLocked);
            }
            if self.bus.is_busy() {
                return Err(AdaError::Busy);
            }
            let style = match state.selected_style {
                Some(ConversationStyle::Involved) => ConversationStyle::Considerate,
                _ => ConversationStyle::Involved,
            };
            state.selected_style = Some(style);
            style
        };

        self.handle.emit(OutboundEvent::SetStyle { style });
        self.activity
            .log_event("Change style", Some(json!({ "style": style })));
        Ok(style)
    }

    /// Allow or forbid [`Self::toggle_style`]
    pub fn set_style_switchable(&self, switchable: bool) {
        self.state.lock().style_switchable = switchable;
    }

    /// Record one keystroke of the message being typed
    pub fn record_keystroke(&self, key: impl Into<String>) {
        let keystroke = Keystroke {
            key: key.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        self.state.lock().keystrokes.push(keystroke);
    }

    /// Send a typed message
    ///
    /// Blank messages are ignored and return `Ok(false)`. The message is
    /// echoed into the transcript before it is emitted, together with the
    /// keystrokes recorded since the previous message.
    ///
    /// # Errors
    /// Returns `AdaError::Busy` while the agent is replying
    pub fn send_message(&self, text: &str) -> Result<bool> {
        if text.trim().is_empty() {
            return Ok(false);
        }

        let keystrokes = {
            let mut state = self.state.lock();
            state.assembler.begin_user_turn(text)?;
            std::mem::take(&mut state.keystrokes)
        };

        self.handle.emit(OutboundEvent::Message {
            message: text.to_string(),
            keystrokes,
        });
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Quick replies
    // ------------------------------------------------------------------------

    /// Quick replies on offer; none while the agent is replying
    #[must_use]
    pub fn quick_replies(&self) -> Vec<QuickReplyOption> {
        if self.bus.is_busy() {
            return Vec::new();
        }
        self.state.lock().quick_replies.clone()
    }

    /// Pick a quick reply
    ///
    /// # Errors
    /// Returns `AdaError::Busy` while the agent is replying and
    /// `AdaError::OptionNotFound` for an id not on offer
    pub fn select_quick_reply(&self, id: &OptionId) -> Result<()> {
        let option = {
            let mut state = self.state.lock();
            if self.bus.is_busy() {
                return Err(AdaError::Busy);
            }
            let option = state
                .quick_replies
                .iter()
                .find(|option| &option.id == id)
                .cloned()
                .ok_or_else(|| AdaError::option_not_found(id.to_string()))?;
            state.assembler.begin_user_turn(option.full_text.clone())?;
            state.quick_replies.clear();
            option
        };

        self.handle.emit(OutboundEvent::SelectOption { option });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------------

    /// Apply a streamed message frame
    pub fn handle_message(&self, frame: &TokenFrame) -> FrameOutcome {
        self.state.lock().assembler.apply_frame(frame)
    }

    /// Close the current agent turn
    pub fn handle_end_of_turn(&self) {
        self.state.lock().assembler.end_of_turn();
    }

    /// Replace the quick replies on offer
    pub fn handle_options(&self, options: &[QuickReplyOption]) {
        self.state.lock().quick_replies = options.to_vec();
    }

    /// Store the session settings sent by the agent
    pub fn handle_init(&self, settings: &Settings) {
        log::debug!(
            "Agent style '{}', switch shown: {}",
            settings.style.name,
            settings.style.show_style_switch
        );
        self.state.lock().settings = settings.clone();
    }

    /// Restart directive: forget the transcript and the quick replies
    pub fn handle_restart(&self) {
        let mut state = self.state.lock();
        state.assembler.reset();
        state.quick_replies.clear();
        log::info!("Conversation restarted by the agent");
    }

    /// Prepare for a fresh channel: empty transcript, no style selected, the
    /// conversation not yet started
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.assembler.reset();
        state.quick_replies.clear();
        state.keystrokes.clear();
        state.selected_style = None;
        state.conversation_started = false;
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    /// Copy of the transcript
    #[must_use]
    pub fn transcript(&self) -> Vec<ChatTurn> {
        self.state.lock().assembler.transcript().to_vec()
    }

    /// Copy of the last turn
    #[must_use]
    pub fn last_turn(&self) -> Option<ChatTurn> {
        self.state.lock().assembler.last_turn().cloned()
    }

    /// Whether the agent is replying
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.bus.is_busy()
    }

    /// Whether the "agent is typing" placeholder should show
    #[must_use]
    pub fn is_awaiting_first_content(&self) -> bool {
        self.state.lock().assembler.is_awaiting_first_content()
    }

    /// Selected style
    #[must_use]
    pub fn selected_style(&self) -> Option<ConversationStyle> {
        self.state.lock().selected_style
    }

    /// Whether the style switch is enabled
    #[must_use]
    pub fn style_switchable(&self) -> bool {
        self.state.lock().style_switchable
    }

    /// Keystrokes recorded since the last message
    #[must_use]
    pub fn pending_keystrokes(&self) -> usize {
        self.state.lock().keystrokes.len()
    }

    /// Settings last sent by the agent
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.state.lock().settings.clone()
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ChatSession")
            .field("turns", &state.assembler.transcript().len())
            .field("quick_replies", &state.quick_replies.len())
            .field("selected_style", &state.selected_style)
            .field("busy", &self.bus.is_busy())
            .finish_non_exhaustive()
    }
}
