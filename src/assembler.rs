//! Incremental chat-turn assembly
//!
//! Agent replies arrive as a stream of [`TokenFrame`]s. A frame marked `NEW`
//! opens a system turn; every other frame extends the last turn of the
//! transcript. Turns are never reordered or buffered: what arrives is applied
//! immediately, so the last turn is always the one currently streaming.

use crate::busy::BusyBus;
use crate::error::Result;
use crate::types::messages::{ChatTurn, Origin, TokenFrame};

/// Outcome of applying one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A new system turn was appended
    Opened,
    /// The last turn was extended
    Extended,
    /// The transcript was empty and the frame was dropped
    Dropped,
}

/// Transcript owner
#[derive(Debug)]
pub struct MessageAssembler {
    turns: Vec<ChatTurn>,
    awaiting_first_content: bool,
    bus: BusyBus,
}

impl MessageAssembler {
    /// Create an empty transcript bound to the busy bus
    #[must_use]
    pub fn new(bus: BusyBus) -> Self {
        Self {
            turns: Vec::new(),
            awaiting_first_content: true,
            bus,
        }
    }

    /// Apply one streamed frame
    pub fn apply_frame(&mut self, frame: &TokenFrame) -> FrameOutcome {
        if frame.is_new() {
            self.turns.push(ChatTurn::system(frame.text.clone()));
            self.awaiting_first_content = false;
            return FrameOutcome::Opened;
        }

        match self.turns.last_mut() {
            Some(last) => {
                last.text.push_str(&frame.text);
                FrameOutcome::Extended
            }
            None => {
                log::warn!("Dropping continuation frame on empty transcript");
                FrameOutcome::Dropped
            }
        }
    }

    /// Close the current agent turn
    pub fn end_of_turn(&mut self) {
        self.bus.set_busy(false);
    }

    /// Start a user-initiated turn and echo its text
    ///
    /// # Errors
    /// Returns `AdaError::Busy` if a turn is already in progress
    pub fn begin_user_turn(&mut self, text: impl Into<String>) -> Result<()> {
        self.bus.begin_turn()?;
        self.awaiting_first_content = true;
        self.turns.push(ChatTurn::user(text));
        Ok(())
    }

    /// Mark the agent as busy without a user turn, e.g. for the opening turn
    pub fn await_agent(&mut self) {
        self.bus.set_busy(true);
        self.awaiting_first_content = true;
    }

    /// Whether the agent has not yet streamed any content for this turn
    #[must_use]
    pub fn is_awaiting_first_content(&self) -> bool {
        self.awaiting_first_content && self.bus.is_busy()
    }

    /// Full transcript
    #[must_use]
    pub fn transcript(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Last turn, if any
    #[must_use]
    pub fn last_turn(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    /// Number of system turns
    #[must_use]
    pub fn system_turns(&self) -> usize {
        self.turns
            .iter()
            .filter(|turn| turn.origin == Origin::System)
            .count()
    }

    /// Forget the transcript
    pub fn reset(&mut self) {
        self.turns.clear();
        self.awaiting_first_content = true;
    }
}
