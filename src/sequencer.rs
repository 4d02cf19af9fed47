//! Task sequencing across the three study tasks
//!
//! Each participant works through three task slots. On first entry the
//! sequencer draws a topic permutation, a topic set and a starting style, and
//! persists them as one record under [`TASK_SEQUENCE_KEY`]. Later entries read
//! the record back unchanged; completing a task advances the slot and flips
//! the style. Entering a slot always reconnects the channel so the agent
//! starts the task with a fresh session.

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelControl;
use crate::error::{AdaError, Result};
use crate::storage::{SharedStore, load_json, save_json};
use crate::types::messages::ConversationStyle;

/// Storage key of the task sequence record
pub const TASK_SEQUENCE_KEY: &str = "taskSequence";

/// Number of task slots in the study
pub const TASK_SLOTS: usize = 3;

/// Slot whose style the participant may switch
pub const SWITCHABLE_SLOT: usize = TASK_SLOTS - 1;

/// Persisted task sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSequenceState {
    /// Topic order, a permutation of `0..3`
    pub topic_permutation: [usize; TASK_SLOTS],
    /// Topic set, 0 or 1
    pub topic_set_id: u8,
    /// Current slot, `0..3`
    pub current_task_slot: usize,
    /// Style of the current slot
    pub current_style: ConversationStyle,
}

impl TaskSequenceState {
    /// Draw a fresh sequence starting at slot 0
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut topic_permutation = [0, 1, 2];
        topic_permutation.shuffle(rng);
        let topic_set_id = u8::from(rng.gen_bool(0.5));
        let current_style = if rng.gen_bool(0.5) {
            ConversationStyle::Considerate
        } else {
            ConversationStyle::Involved
        };
        Self {
            topic_permutation,
            topic_set_id,
            current_task_slot: 0,
            current_style,
        }
    }

    /// Topic of the current slot
    #[must_use]
    pub const fn topic_index(&self) -> usize {
        self.topic_permutation[self.current_task_slot % TASK_SLOTS]
    }

    /// Whether the record describes a reachable sequence
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let mut seen = [false; TASK_SLOTS];
        for &topic in &self.topic_permutation {
            if topic >= TASK_SLOTS || seen[topic] {
                return false;
            }
            seen[topic] = true;
        }
        self.topic_set_id <= 1 && self.current_task_slot < TASK_SLOTS
    }

    /// Resolved view of the current slot
    #[must_use]
    pub const fn assignment(&self) -> TaskAssignment {
        TaskAssignment {
            slot: self.current_task_slot,
            topic_index: self.topic_index(),
            topic_set_id: self.topic_set_id,
            style: self.current_style,
            style_switchable: self.current_task_slot == SWITCHABLE_SLOT,
        }
    }
}

/// Stored form, carrying the derived topic index for the server-side logs
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSequence {
    #[serde(flatten)]
    state: TaskSequenceState,
    #[serde(default)]
    topic_index: usize,
}

/// Resolved task slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    /// Slot, `0..3`
    pub slot: usize,
    /// Topic shown in this slot
    pub topic_index: usize,
    /// Topic set
    pub topic_set_id: u8,
    /// Conversation style
    pub style: ConversationStyle,
    /// Whether the participant may switch style in this slot
    pub style_switchable: bool,
}

impl TaskAssignment {
    /// Whether this is the last task of the study
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.slot == TASK_SLOTS - 1
    }
}

/// Drives slot transitions and their persistence
pub struct TaskSequencer {
    store: SharedStore,
    rng: StdRng,
    state: Option<TaskSequenceState>,
}

impl TaskSequencer {
    /// Create a sequencer over the shared profile
    #[must_use]
    pub fn new(store: SharedStore, rng: StdRng) -> Self {
        Self {
            store,
            rng,
            state: None,
        }
    }

    /// Read the persisted sequence, or draw and persist a new one
    ///
    /// # Errors
    /// Returns error if the profile cannot be read or written
    pub fn load_or_create(&mut self) -> Result<TaskSequenceState> {
        let stored = load_json::<StoredSequence>(self.store.as_ref(), TASK_SEQUENCE_KEY)?
            .map(|stored| stored.state);

        let state = match stored {
            Some(state) if state.is_valid() => {
                log::debug!("Restored task sequence at slot {}", state.current_task_slot);
                state
            }
            other => {
                if other.is_some() {
                    log::warn!("Ignoring invalid task sequence record");
                }
                let state = TaskSequenceState::random(&mut self.rng);
                log::info!(
                    "New task sequence: topics {:?}, set {}, starting {}",
                    state.topic_permutation,
                    state.topic_set_id,
                    state.current_style
                );
                self.persist(&state)?;
                state
            }
        };

        self.state = Some(state.clone());
        Ok(state)
    }

    /// Enter the current slot and reconnect the channel
    ///
    /// A forced style overrides the stored one and is persisted. A failed
    /// reconnect is logged and leaves the channel in its error state.
    ///
    /// # Errors
    /// Returns error if the profile cannot be read or written
    pub async fn enter_task<C: ChannelControl>(
        &mut self,
        channel: &mut C,
        forced_style: Option<ConversationStyle>,
    ) -> Result<TaskAssignment> {
        let mut state = self.load_or_create()?;
        if let Some(style) = forced_style
            && style != state.current_style
        {
            state.current_style = style;
            self.persist(&state)?;
            self.state = Some(state.clone());
        }

        let assignment = state.assignment();
        log::info!(
            "Entering task {} (topic {}, set {}, {})",
            assignment.slot + 1,
            assignment.topic_index,
            assignment.topic_set_id,
            assignment.style
        );

        if let Err(e) = channel.reconnect().await {
            log::error!("Reconnect on task entry failed: {e}");
        }
        Ok(assignment)
    }

    /// Advance to the next slot
    ///
    /// The style flips unless `forced_next` names the next one.
    ///
    /// # Errors
    /// Returns `AdaError::NoActiveTask` if no task was entered, or a storage
    /// error if the profile cannot be written
    pub fn complete_task(
        &mut self,
        forced_next: Option<ConversationStyle>,
    ) -> Result<TaskAssignment> {
        let mut state = self.state.clone().ok_or(AdaError::NoActiveTask)?;
        state.current_task_slot = (state.current_task_slot + 1) % TASK_SLOTS;
        state.current_style = forced_next.unwrap_or_else(|| state.current_style.flip());
        self.persist(&state)?;

        let next = state.assignment();
        self.state = Some(state);
        Ok(next)
    }

    /// Current slot, if a task was entered
    #[must_use]
    pub fn current(&self) -> Option<TaskAssignment> {
        self.state.as_ref().map(TaskSequenceState::assignment)
    }

    /// Current sequence record, if a task was entered
    #[must_use]
    pub fn state(&self) -> Option<&TaskSequenceState> {
        self.state.as_ref()
    }

    /// Forget the whole profile at the end of the study
    ///
    /// # Errors
    /// Returns error if the profile cannot be cleared
    pub fn finish_study(&mut self) -> Result<()> {
        self.store.clear()?;
        self.state = None;
        log::info!("Study finished, profile cleared");
        Ok(())
    }

    fn persist(&self, state: &TaskSequenceState) -> Result<()> {
        let stored = StoredSequence {
            state: state.clone(),
            topic_index: state.topic_index(),
        };
        save_json(self.store.as_ref(), TASK_SEQUENCE_KEY, &stored)
    }
}
