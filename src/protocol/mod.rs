//! Wire protocol spoken with the agent server
//!
//! The agent is a Socket.IO server. Every WebSocket text frame is an Engine.IO
//! packet; Engine.IO `message` packets carry Socket.IO packets, and Socket.IO
//! `EVENT` packets carry `["name", payload]` arrays.
//!
//! [`SocketCodec`] turns raw frames into [`Frame`]s and outbound events into
//! raw frames for one namespace.

pub mod engine;
pub mod socket;

use serde_json::Value;

use crate::error::Result;
use crate::types::events::OutboundEvent;

pub use engine::{ENGINE_IO_VERSION, EnginePacket, Handshake};
pub use socket::{DEFAULT_NAMESPACE, SocketPacket, SocketPacketType};

/// Decoded frame, reduced to what the channel cares about
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Engine.IO session opened
    Open(Handshake),
    /// Server heartbeat, answered with a pong carrying the same data
    Ping(String),
    /// Engine.IO transport closed by the server
    Close,
    /// Namespace connect acknowledged
    Connected {
        /// Socket.IO session id
        sid: Option<String>,
    },
    /// Namespace connect refused
    ConnectRefused(String),
    /// Namespace disconnected by the server
    Disconnect,
    /// Named event with its payload
    Event {
        /// Event name
        name: String,
        /// First event argument
        payload: Value,
    },
    /// Valid frame with no meaning for the client
    Ignored,
}

/// Codec for one Socket.IO namespace
#[derive(Debug, Clone)]
pub struct SocketCodec {
    namespace: String,
}

impl SocketCodec {
    /// Create a codec for a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Namespace served by this codec
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Frame requesting the namespace connection
    #[must_use]
    pub fn connect_frame(&self) -> String {
        EnginePacket::Message(SocketPacket::connect(self.namespace.clone()).encode()).encode()
    }

    /// Frame leaving the namespace
    #[must_use]
    pub fn disconnect_frame(&self) -> String {
        EnginePacket::Message(SocketPacket::disconnect(self.namespace.clone()).encode()).encode()
    }

    /// Heartbeat answer
    #[must_use]
    pub fn pong_frame(data: &str) -> String {
        EnginePacket::Pong(data.to_string()).encode()
    }

    /// Serialize an outbound event
    #[must_use]
    pub fn serialize_event(&self, event: &OutboundEvent) -> String {
        let packet = SocketPacket::event(self.namespace.clone(), event.name(), event.payload());
        EnginePacket::Message(packet.encode()).encode()
    }

    /// Deserialize one inbound frame
    ///
    /// # Errors
    /// Returns a protocol or JSON error for frames that cannot be decoded
    pub fn deserialize_frame(&self, frame: &str) -> Result<Frame> {
        let body = match EnginePacket::decode(frame)? {
            EnginePacket::Open(handshake) => return Ok(Frame::Open(handshake)),
            EnginePacket::Ping(data) => return Ok(Frame::Ping(data)),
            EnginePacket::Close => return Ok(Frame::Close),
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {
                return Ok(Frame::Ignored);
            }
            EnginePacket::Message(body) => body,
        };

        let packet = SocketPacket::decode(&body)?;
        if packet.namespace != self.namespace {
            log::debug!("Ignoring packet for namespace {}", packet.namespace);
            return Ok(Frame::Ignored);
        }

        let frame = match packet.kind {
            SocketPacketType::Connect => Frame::Connected {
                sid: packet
                    .data
                    .as_ref()
                    .and_then(|d| d.get("sid"))
                    .and_then(Value::as_str)
                    .map(String::from),
            },
            SocketPacketType::ConnectError => Frame::ConnectRefused(
                packet
                    .data
                    .as_ref()
                    .and_then(|d| d.get("message").and_then(Value::as_str).or_else(|| d.as_str()))
                    .unwrap_or("connection refused")
                    .to_string(),
            ),
            SocketPacketType::Disconnect => Frame::Disconnect,
            SocketPacketType::Event => match packet.as_event() {
                Some((name, payload)) => Frame::Event {
                    name: name.to_string(),
                    payload,
                },
                None => {
                    log::warn!("Dropping EVENT packet without a name: {body}");
                    Frame::Ignored
                }
            },
            SocketPacketType::Ack => Frame::Ignored,
        };
        Ok(frame)
    }
}

impl Default for SocketCodec {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
