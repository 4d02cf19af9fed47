//! Socket.IO v5 packets carried inside Engine.IO `message` packets

use serde_json::Value;

use crate::error::{AdaError, Result};

/// Default namespace
pub const DEFAULT_NAMESPACE: &str = "/";

/// Socket.IO packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketPacketType {
    /// `0` namespace connect / connect acknowledgement
    Connect,
    /// `1` namespace disconnect
    Disconnect,
    /// `2` event
    Event,
    /// `3` acknowledgement
    Ack,
    /// `4` namespace connect refused
    ConnectError,
}

impl SocketPacketType {
    const fn digit(self) -> char {
        match self {
            Self::Connect => '0',
            Self::Disconnect => '1',
            Self::Event => '2',
            Self::Ack => '3',
            Self::ConnectError => '4',
        }
    }

    fn from_digit(digit: char) -> Result<Self> {
        match digit {
            '0' => Ok(Self::Connect),
            '1' => Ok(Self::Disconnect),
            '2' => Ok(Self::Event),
            '3' => Ok(Self::Ack),
            '4' => Ok(Self::ConnectError),
            '5' | '6' => Err(AdaError::protocol("binary Socket.IO packets are not supported")),
            other => Err(AdaError::protocol(format!(
                "unknown Socket.IO packet type '{other}'"
            ))),
        }
    }
}

/// Decoded Socket.IO packet
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    /// Packet type
    pub kind: SocketPacketType,
    /// Namespace, `/` when absent on the wire
    pub namespace: String,
    /// Acknowledgement id
    pub id: Option<u64>,
    /// JSON data
    pub data: Option<Value>,
}

impl SocketPacket {
    /// `CONNECT` request for a namespace
    pub fn connect(namespace: impl Into<String>) -> Self {
        Self {
            kind: SocketPacketType::Connect,
            namespace: namespace.into(),
            id: None,
            data: None,
        }
    }

    /// `DISCONNECT` for a namespace
    pub fn disconnect(namespace: impl Into<String>) -> Self {
        Self {
            kind: SocketPacketType::Disconnect,
            namespace: namespace.into(),
            id: None,
            data: None,
        }
    }

    /// `EVENT` with a single payload argument
    pub fn event(namespace: impl Into<String>, name: &str, payload: Value) -> Self {
        Self {
            kind: SocketPacketType::Event,
            namespace: namespace.into(),
            id: None,
            data: Some(Value::Array(vec![Value::String(name.to_string()), payload])),
        }
    }

    /// Event name and first argument, for `EVENT` packets
    ///
    /// Events sent without arguments yield `Value::Null`.
    #[must_use]
    pub fn as_event(&self) -> Option<(&str, Value)> {
        if self.kind != SocketPacketType::Event {
            return None;
        }
        let args = self.data.as_ref()?.as_array()?;
        let name = args.first()?.as_str()?;
        Some((name, args.get(1).cloned().unwrap_or(Value::Null)))
    }

    /// Decode the body of an Engine.IO `message` packet
    ///
    /// # Errors
    /// Returns a protocol error for unknown or binary packet types and for
    /// undecodable JSON data
    pub fn decode(body: &str) -> Result<Self> {
        let mut chars = body.chars();
        let digit = chars
            .next()
            .ok_or_else(|| AdaError::protocol("empty Socket.IO packet"))?;
        let kind = SocketPacketType::from_digit(digit)?;
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            let (namespace, tail) = rest.split_once(',').unwrap_or((rest, ""));
            rest = tail;
            namespace.to_string()
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let id = if digits > 0 {
            let (id, tail) = rest.split_at(digits);
            rest = tail;
            Some(
                id.parse()
                    .map_err(|e| AdaError::protocol(format!("bad ack id '{id}': {e}")))?,
            )
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace,
            id,
            data,
        })
    }

    /// Encode into the body of an Engine.IO `message` packet
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.namespace != DEFAULT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }
}
