//! Engine.IO v4 text packets

use serde::{Deserialize, Serialize};

use crate::error::{AdaError, Result};

/// Engine.IO protocol revision spoken by the client
pub const ENGINE_IO_VERSION: u8 = 4;

/// Payload of the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine.IO session id
    pub sid: String,
    /// Transports the server can upgrade to
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server ping interval in milliseconds
    pub ping_interval: u64,
    /// Time the server waits for a pong in milliseconds
    pub ping_timeout: u64,
    /// Largest payload the server accepts
    #[serde(default)]
    pub max_payload: u64,
}

impl Handshake {
    /// Longest silence tolerated before the connection counts as dead
    #[must_use]
    pub const fn heartbeat_deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// Engine.IO packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    /// `0` session opened
    Open(Handshake),
    /// `1` transport closed
    Close,
    /// `2` heartbeat request
    Ping(String),
    /// `3` heartbeat response
    Pong(String),
    /// `4` Socket.IO payload
    Message(String),
    /// `5` transport upgrade
    Upgrade,
    /// `6` no-op
    Noop,
}

impl EnginePacket {
    /// Decode one text frame
    ///
    /// # Errors
    /// Returns a protocol error for empty frames, unknown packet types and
    /// malformed `open` payloads
    pub fn decode(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| AdaError::protocol("empty Engine.IO frame"))?;
        let body = chars.as_str();

        match kind {
            '0' => {
                let handshake = serde_json::from_str(body).map_err(|e| {
                    AdaError::protocol(format!("malformed Engine.IO open packet: {e}"))
                })?;
                Ok(Self::Open(handshake))
            }
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(body.to_string())),
            '3' => Ok(Self::Pong(body.to_string())),
            '4' => Ok(Self::Message(body.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(AdaError::protocol(format!(
                "unknown Engine.IO packet type '{other}'"
            ))),
        }
    }

    /// Encode into a text frame
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}
