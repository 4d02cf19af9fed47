//! Background tasks for `ChannelManager`
//!
//! The frame reader lives as long as one connection; the event writer lives as
//! long as the manager and survives reconnects.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};

use crate::message::parse_event;
use crate::protocol::{Frame, SocketCodec};
use crate::transport::Transport;
use crate::types::events::{InboundEvent, OutboundEvent};

use super::ChannelState;
use super::handshake::FrameStream;

/// Everything the frame reader needs for one connection
pub(super) struct ReaderContext<T: Transport> {
    pub(super) transport: Arc<Mutex<T>>,
    pub(super) codec: SocketCodec,
    pub(super) events: mpsc::UnboundedSender<InboundEvent>,
    pub(super) deadline: Duration,
    pub(super) generation: u64,
    pub(super) current_generation: Arc<AtomicU64>,
    pub(super) state_tx: Arc<watch::Sender<ChannelState>>,
}

impl<T: Transport> ReaderContext<T> {
    fn is_current(&self) -> bool {
        self.current_generation.load(Ordering::SeqCst) == self.generation
    }
}

/// Frame reader task - answers heartbeats and turns event frames into events
pub(super) async fn frame_reader_task<T: Transport>(
    ctx: ReaderContext<T>,
    mut frames: FrameStream,
) {
    let reason = loop {
        let next = if ctx.deadline.is_zero() {
            frames.recv().await
        } else {
            match tokio::time::timeout(ctx.deadline, frames.recv()).await {
                Ok(next) => next,
                Err(_) => break format!("no heartbeat within {:?}", ctx.deadline),
            }
        };

        let raw = match next {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => break e.to_string(),
            None => break "transport closed".to_string(),
        };

        match ctx.codec.deserialize_frame(&raw) {
            Ok(Frame::Event { name, payload }) => match parse_event(&name, payload) {
                Ok(event) => {
                    if ctx.events.send(event).is_err() {
                        // Receiver dropped, the connection was torn down
                        return;
                    }
                }
                Err(e) => log::warn!("Dropping inbound event: {e}"),
            },
            Ok(Frame::Ping(data)) => {
                let pong = SocketCodec::pong_frame(&data);
                if let Err(e) = ctx.transport.lock().await.write(&pong).await {
                    break format!("failed to answer heartbeat: {e}");
                }
            }
            Ok(Frame::Close) => break "server closed the transport".to_string(),
            Ok(Frame::Disconnect) => break "server disconnected".to_string(),
            Ok(other) => log::debug!("Ignoring frame: {other:?}"),
            Err(e) => log::warn!("Dropping undecodable frame: {e}"),
        }
    };

    if !ctx.is_current() {
        log::debug!("Stale reader stopped: {reason}");
        return;
    }

    log::warn!("Channel lost: {reason}");
    ctx.state_tx.send_replace(ChannelState::Error(reason.clone()));
    let _ = ctx.events.send(InboundEvent::Disconnected { reason });
}

/// Event writer task - serializes outbound events onto the transport
///
/// Events are held while the channel is not connected and flushed in order
/// once it is. At most `capacity` events are held; the oldest go first.
pub(super) async fn event_writer_task<T: Transport>(
    transport: Arc<Mutex<T>>,
    codec: SocketCodec,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundEvent>,
    mut state_rx: watch::Receiver<ChannelState>,
    capacity: usize,
) {
    let mut pending: VecDeque<OutboundEvent> = VecDeque::new();

    loop {
        tokio::select! {
            event = outbound_rx.recv() => {
                let Some(event) = event else { break };
                if pending.len() >= capacity
                    && let Some(dropped) = pending.pop_front()
                {
                    log::warn!("Outbound buffer full, dropping {}", dropped.name());
                }
                pending.push_back(event);
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let connected = state_rx.borrow_and_update().is_connected();
        if connected {
            flush(&transport, &codec, &state_rx, &mut pending).await;
        }
    }
}

async fn flush<T: Transport>(
    transport: &Arc<Mutex<T>>,
    codec: &SocketCodec,
    state_rx: &watch::Receiver<ChannelState>,
    pending: &mut VecDeque<OutboundEvent>,
) {
    while let Some(event) = pending.front() {
        let frame = codec.serialize_event(event);
        let mut guard = transport.lock().await;
        // A reconnect may have started while waiting for the lock; events must
        // not reach a socket before its namespace connect.
        if !state_rx.borrow().is_connected() {
            return;
        }
        if let Err(e) = guard.write(&frame).await {
            log::error!("Failed to send {}: {e}", event.name());
            // Kept for the next connection
            return;
        }
        drop(guard);
        pending.pop_front();
    }
}
