//! Event parser for agent payloads

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AdaError, Result};
use crate::types::events::{EventKind, InboundEvent};
use crate::types::messages::Settings;

/// Parse a named Socket.IO event into a typed inbound event
///
/// # Arguments
/// * `name` - Event name as sent by the agent
/// * `payload` - First event argument, `Value::Null` when absent
///
/// # Errors
/// Returns `AdaError::EventParse` for unknown event names and for payloads
/// that do not match the event's shape
pub fn parse_event(name: &str, payload: Value) -> Result<InboundEvent> {
    let kind = EventKind::from_wire_name(name)
        .ok_or_else(|| AdaError::event_parse(name, "unknown event"))?;

    let event = match kind {
        EventKind::Init => InboundEvent::Init(merge_settings(payload)),
        EventKind::Message => InboundEvent::Message(decode(name, payload)?),
        EventKind::EndOfTurn => InboundEvent::EndOfTurn,
        EventKind::Options => InboundEvent::Options(decode_list(name, payload)?),
        EventKind::Recommendations => InboundEvent::Recommendations(decode_list(name, payload)?),
        EventKind::Bookmarks => InboundEvent::Bookmarks(decode_list(name, payload)?),
        EventKind::Preferences => InboundEvent::Preferences(decode_list(name, payload)?),
        EventKind::Restart => InboundEvent::Restart,
        EventKind::Authentication => InboundEvent::Authentication(decode(name, payload)?),
        EventKind::Connect | EventKind::Disconnect | EventKind::ConnectError => {
            return Err(AdaError::event_parse(name, "reserved lifecycle event"));
        }
    };
    Ok(event)
}

/// Settings from an `init` payload, with missing fields taken from the defaults
fn merge_settings(payload: Value) -> Settings {
    if payload.is_null() {
        return Settings::default();
    }
    serde_json::from_value(payload).unwrap_or_else(|e| {
        log::warn!("Malformed init settings, using defaults: {e}");
        Settings::default()
    })
}

fn decode<T: DeserializeOwned>(name: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| AdaError::event_parse(name, e.to_string()))
}

fn decode_list<T: DeserializeOwned>(name: &str, payload: Value) -> Result<Vec<T>> {
    if payload.is_null() {
        return Ok(Vec::new());
    }
    decode(name, payload)
}
