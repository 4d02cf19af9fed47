//! Shared busy-state bus
//!
//! The bus carries two things shared between independently owned panels:
//! whether the agent is currently producing a turn, and the callback that
//! turns an "explain this recommendation" click into a chat turn. Panels hold
//! a clone of the bus and never touch the transcript owner directly.
//!
//! ```
//! use ada_client::busy::BusyBus;
//!
//! let bus = BusyBus::new();
//! assert!(bus.begin_turn().is_ok());
//! assert!(bus.begin_turn().is_err());
//! bus.set_busy(false);
//! assert!(!bus.is_busy());
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{AdaError, Result};
use crate::types::messages::Article;

/// Callback invoked when the participant asks to explain an article
pub type ExplainHandler = Arc<dyn Fn(&Article) + Send + Sync>;

struct BusyInner {
    busy: watch::Sender<bool>,
    since: Mutex<Option<Instant>>,
    explain: Mutex<Option<ExplainHandler>>,
}

/// Cross-component busy flag plus explain callback slot
#[derive(Clone)]
pub struct BusyBus {
    inner: Arc<BusyInner>,
}

impl BusyBus {
    /// Create an idle bus with no explain handler
    #[must_use]
    pub fn new() -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(BusyInner {
                busy,
                since: Mutex::new(None),
                explain: Mutex::new(None),
            }),
        }
    }

    /// Set or clear the busy flag
    pub fn set_busy(&self, busy: bool) {
        let was_busy = self.inner.busy.send_replace(busy);
        let mut since = self.inner.since.lock();
        match (was_busy, busy) {
            (false, true) => *since = Some(Instant::now()),
            (_, false) => *since = None,
            (true, true) => {}
        }
    }

    /// Whether a turn is in progress
    #[must_use]
    pub fn is_busy(&self) -> bool {
        *self.inner.busy.borrow()
    }

    /// Atomically mark a user-initiated turn as started
    ///
    /// # Errors
    /// Returns `AdaError::Busy` if a turn is already in progress
    pub fn begin_turn(&self) -> Result<()> {
        let mut began = false;
        self.inner.busy.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                began = true;
                true
            }
        });

        if began {
            *self.inner.since.lock() = Some(Instant::now());
            Ok(())
        } else {
            Err(AdaError::Busy)
        }
    }

    /// Watch the busy flag
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.busy.subscribe()
    }

    /// How long the current busy cycle has been open
    #[must_use]
    pub fn busy_for(&self) -> Option<Duration> {
        self.inner.since.lock().map(|since| since.elapsed())
    }

    /// Register the explain handler, replacing any previous one
    pub fn register_explain_handler<F>(&self, handler: F)
    where
        F: Fn(&Article) + Send + Sync + 'static,
    {
        *self.inner.explain.lock() = Some(Arc::new(handler));
    }

    /// Whether an explain handler is registered
    #[must_use]
    pub fn has_explain_handler(&self) -> bool {
        self.inner.explain.lock().is_some()
    }

    /// Invoke the explain handler for an article
    ///
    /// # Errors
    /// Returns `AdaError::Busy` while a turn is in progress and
    /// `AdaError::NoExplainHandler` when nothing is registered
    pub fn invoke_explain(&self, article: &Article) -> Result<()> {
        if self.is_busy() {
            return Err(AdaError::Busy);
        }
        // Clone out so the handler may touch the bus without deadlocking.
        let handler = self
            .inner
            .explain
            .lock()
            .clone()
            .ok_or(AdaError::NoExplainHandler)?;
        handler(article);
        Ok(())
    }
}

impl Default for BusyBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BusyBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyBus")
            .field("busy", &self.is_busy())
            .field("explain_handler", &self.has_explain_handler().then_some("<callback>"))
            .finish()
    }
}
