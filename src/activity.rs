//! Study activity logging
//!
//! Every participant action of interest is sent to the agent as a `log_event`
//! record. A record carries the time, the current page, a copy of the whole
//! persisted profile, the event name and optional metadata.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::channel::ChannelHandle;
use crate::storage::SharedStore;
use crate::types::events::OutboundEvent;

/// Emits `log_event` records
#[derive(Clone)]
pub struct ActivityLogger {
    store: SharedStore,
    handle: ChannelHandle,
    page: Arc<RwLock<String>>,
}

impl ActivityLogger {
    /// Create a logger for a page
    pub fn new(store: SharedStore, handle: ChannelHandle, page: impl Into<String>) -> Self {
        Self {
            store,
            handle,
            page: Arc::new(RwLock::new(page.into())),
        }
    }

    /// Page attached to records
    #[must_use]
    pub fn page(&self) -> String {
        self.page.read().clone()
    }

    /// Change the page attached to records
    pub fn set_page(&self, page: impl Into<String>) {
        *self.page.write() = page.into();
    }

    /// Build a record without emitting it
    #[must_use]
    pub fn record(&self, event: &str, metadata: Option<Value>) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert(
            "timestamp".into(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert("page".into(), Value::String(self.page()));

        match self.store.snapshot() {
            Ok(snapshot) => {
                for (key, value) in snapshot {
                    record.insert(key, Value::String(value));
                }
            }
            Err(e) => log::warn!("Logging '{event}' without profile context: {e}"),
        }

        record.insert("event".into(), Value::String(event.to_string()));
        if let Some(metadata) = metadata {
            record.insert("metadata".into(), metadata);
        }
        record
    }

    /// Emit a record for `event`
    pub fn log_event(&self, event: &str, metadata: Option<Value>) {
        log::debug!("Activity: {event}");
        self.handle.emit(OutboundEvent::LogEvent(self.record(event, metadata)));
    }
}

impl std::fmt::Debug for ActivityLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLogger")
            .field("page", &self.page())
            .finish_non_exhaustive()
    }
}
