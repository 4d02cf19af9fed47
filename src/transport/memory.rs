//! In-process transport with a scripted agent server
//!
//! [`MemoryTransport::pair`] returns the client side plus a [`MemoryPeer`]
//! playing the server. The peer answers the Engine.IO / Socket.IO handshake
//! on its own, records every frame the client writes, and lets the caller
//! push events, heartbeats and disconnects.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::Transport;
use crate::error::{AdaError, Result};
use crate::protocol::{EnginePacket, Frame, Handshake, SocketCodec, SocketPacket, SocketPacketType};

struct PeerState {
    connected: bool,
    connect_count: usize,
    fail_next_connect: Option<String>,
    refuse_next_namespace: Option<String>,
    handshake: Handshake,
    inbound: Option<mpsc::UnboundedSender<Result<String>>>,
    pending: Vec<String>,
    sent: Vec<String>,
    pongs: usize,
}

impl PeerState {
    fn deliver(&mut self, frame: String) {
        match &self.inbound {
            Some(tx) => {
                if tx.send(Ok(frame)).is_err() {
                    self.inbound = None;
                }
            }
            None if self.connected => self.pending.push(frame),
            None => log::debug!("Memory peer dropping frame while disconnected: {frame}"),
        }
    }

    fn drop_connection(&mut self) {
        self.connected = false;
        self.inbound = None;
        self.pending.clear();
    }
}

fn default_handshake() -> Handshake {
    Handshake {
        sid: String::new(),
        upgrades: Vec::new(),
        ping_interval: 25_000,
        ping_timeout: 20_000,
        max_payload: 1_000_000,
    }
}

/// Client half of the in-process transport
pub struct MemoryTransport {
    state: Arc<Mutex<PeerState>>,
    codec: SocketCodec,
}

/// Server half of the in-process transport
#[derive(Clone)]
pub struct MemoryPeer {
    state: Arc<Mutex<PeerState>>,
    codec: SocketCodec,
}

impl MemoryTransport {
    /// Create a connected pair for the default namespace
    #[must_use]
    pub fn pair() -> (Self, MemoryPeer) {
        let state = Arc::new(Mutex::new(PeerState {
            connected: false,
            connect_count: 0,
            fail_next_connect: None,
            refuse_next_namespace: None,
            handshake: default_handshake(),
            inbound: None,
            pending: Vec::new(),
            sent: Vec::new(),
            pongs: 0,
        }));
        let codec = SocketCodec::default();
        (
            Self {
                state: state.clone(),
                codec: codec.clone(),
            },
            MemoryPeer { state, codec },
        )
    }
}

impl Transport for MemoryTransport {
    async fn connect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.connected {
            return Ok(());
        }
        if let Some(reason) = state.fail_next_connect.take() {
            return Err(AdaError::connection(reason));
        }

        state.connected = true;
        state.connect_count += 1;
        state.inbound = None;
        let mut handshake = state.handshake.clone();
        handshake.sid = format!("mem-{}", state.connect_count);
        state.pending = vec![EnginePacket::Open(handshake).encode()];
        Ok(())
    }

    async fn write(&mut self, frame: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(AdaError::transport("Transport is not ready for writing"));
        }
        state.sent.push(frame.to_string());

        if frame == self.codec.connect_frame() {
            let reply = match state.refuse_next_namespace.take() {
                Some(message) => {
                    let mut packet = SocketPacket::connect(self.codec.namespace());
                    packet.kind = SocketPacketType::ConnectError;
                    packet.data = Some(serde_json::json!({ "message": message }));
                    packet
                }
                None => {
                    let mut packet = SocketPacket::connect(self.codec.namespace());
                    let sid = format!("ns-{}", state.connect_count);
                    packet.data = Some(serde_json::json!({ "sid": sid }));
                    packet
                }
            };
            state.deliver(EnginePacket::Message(reply.encode()).encode());
        } else if frame.starts_with('3') {
            state.pongs += 1;
        }
        Ok(())
    }

    fn read_frames(&mut self) -> mpsc::UnboundedReceiver<Result<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if !state.connected {
            let _ = tx.send(Err(AdaError::connection("Not connected")));
            return rx;
        }
        for frame in state.pending.drain(..) {
            let _ = tx.send(Ok(frame));
        }
        state.inbound = Some(tx);
        rx
    }

    fn is_ready(&self) -> bool {
        self.state.lock().connected
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().drop_connection();
        Ok(())
    }
}

impl MemoryPeer {
    /// Emit an event to the client
    pub fn emit(&self, name: &str, payload: Value) {
        let frame = EnginePacket::Message(
            SocketPacket::event(self.codec.namespace(), name, payload).encode(),
        )
        .encode();
        self.state.lock().deliver(frame);
    }

    /// Deliver a raw frame
    pub fn send_raw(&self, frame: impl Into<String>) {
        self.state.lock().deliver(frame.into());
    }

    /// Send an Engine.IO heartbeat
    pub fn ping(&self) {
        self.send_raw(EnginePacket::Ping(String::new()).encode());
    }

    /// Drop the connection from the server side
    pub fn disconnect(&self) {
        self.state.lock().drop_connection();
    }

    /// Make the next connect attempt fail
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_connect = Some(reason.into());
    }

    /// Refuse the next namespace connect with a `CONNECT_ERROR`
    pub fn refuse_next_namespace(&self, message: impl Into<String>) {
        self.state.lock().refuse_next_namespace = Some(message.into());
    }

    /// Heartbeat timing announced in the next handshakes, in milliseconds
    pub fn set_heartbeat(&self, ping_interval: u64, ping_timeout: u64) {
        let mut state = self.state.lock();
        state.handshake.ping_interval = ping_interval;
        state.handshake.ping_timeout = ping_timeout;
    }

    /// Number of successful connects so far
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.lock().connect_count
    }

    /// Whether the client is currently connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Number of pongs received
    #[must_use]
    pub fn pongs(&self) -> usize {
        self.state.lock().pongs
    }

    /// Raw frames written by the client
    #[must_use]
    pub fn sent_frames(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Events written by the client, in order
    #[must_use]
    pub fn sent_events(&self) -> Vec<(String, Value)> {
        self.state
            .lock()
            .sent
            .iter()
            .filter_map(|frame| match self.codec.deserialize_frame(frame) {
                Ok(Frame::Event { name, payload }) => Some((name, payload)),
                _ => None,
            })
            .collect()
    }

    /// Names of the events written by the client, in order
    #[must_use]
    pub fn sent_event_names(&self) -> Vec<String> {
        self.sent_events().into_iter().map(|(name, _)| name).collect()
    }

    /// Forget recorded frames
    pub fn clear_sent(&self) {
        let mut state = self.state.lock();
        state.sent.clear();
        state.pongs = 0;
    }
}
