//! Channel manager owning the live connection to the agent
//!
//! The manager owns exactly one connection at a time and exposes:
//! - fire-and-forget emission through clonable [`ChannelHandle`]s
//! - an ordered stream of inbound events for the current connection
//! - an observable [`ChannelState`]
//! - explicit [`ChannelManager::reconnect`], the only retry mechanism
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      ChannelManager                        │
//! │                                                            │
//! │  ┌───────────────────┐          ┌───────────────────┐     │
//! │  │   Frame Reader    │          │   Event Writer    │     │
//! │  │  (per connection) │          │  (one per manager)│     │
//! │  │                   │          │                   │     │
//! │  │ • owns receiver   │          │ • buffers while   │     │
//! │  │ • answers pings   │          │   not connected   │     │
//! │  │ • decodes events  │          │ • locks per write │     │
//! │  └─────────┬─────────┘          └─────────┬─────────┘     │
//! │            │       ┌──────────────┐       │               │
//! │            └──────→│  Transport   │←──────┘               │
//! │                    │ (Arc<Mutex>) │                       │
//! │                    └──────────────┘                       │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Every connection gets its own inbound queue and a generation number.
//! Tearing a connection down drops its queue, so frames still in flight are
//! discarded, and a reader from an older generation can never change the
//! state of a newer connection.

mod handshake;
mod tasks;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{AdaError, Result};
use crate::protocol::{DEFAULT_NAMESPACE, SocketCodec};
use crate::transport::{Endpoint, Transport};
use crate::types::events::{InboundEvent, OutboundEvent};
use crate::types::options::{ClientOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_OUTBOUND_BUFFER};

/// Connection state, owned by the channel manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// No connection
    Disconnected,
    /// Connect or handshake in progress
    Connecting,
    /// Namespace connected, events flow
    Connected,
    /// Connect failed or the connection was lost
    Error(String),
}

impl ChannelState {
    /// Whether events can currently be exchanged
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Socket.IO namespace
    pub namespace: String,
    /// Limit for connect plus handshake
    pub connect_timeout: Duration,
    /// Outbound events kept while not connected
    pub outbound_buffer: usize,
}

impl ChannelConfig {
    /// Configuration derived from client options
    ///
    /// # Errors
    /// Returns error if the server URL cannot be parsed
    pub fn from_options(options: &ClientOptions) -> Result<Self> {
        Ok(Self {
            namespace: Endpoint::from_options(options).namespace()?,
            connect_timeout: options.connect_timeout,
            outbound_buffer: options.outbound_buffer,
        })
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

/// Clonable handle for emitting events and observing the channel
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    state: watch::Receiver<ChannelState>,
}

impl ChannelHandle {
    /// Emit an event; delivery is fire-and-forget
    ///
    /// Events emitted while the channel is not connected are buffered and
    /// sent once it is.
    pub fn emit(&self, event: OutboundEvent) {
        log::debug!("Emitting {}", event.name());
        if self.outbound.send(event).is_err() {
            log::warn!("Channel writer stopped, dropping outbound event");
        }
    }

    /// Current channel state
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state.borrow().clone()
    }

    /// Whether the channel is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Watch the channel state
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }
}

/// Explicit reconnect primitive used by the task sequencer
pub trait ChannelControl: Send {
    /// Tear down the current connection and open a fresh one
    ///
    /// # Errors
    /// Returns error if the new connection cannot be established
    fn reconnect(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Owner of the single live connection
pub struct ChannelManager<T: Transport> {
    transport: Arc<Mutex<T>>,
    codec: SocketCodec,
    connect_timeout: Duration,
    state_tx: Arc<watch::Sender<ChannelState>>,
    generation: Arc<AtomicU64>,
    outbound_tx: mpsc::UnboundedSender<OutboundEvent>,
    writer_task: JoinHandle<()>,
    inbound_rx: Option<mpsc::UnboundedReceiver<InboundEvent>>,
    reader_task: Option<JoinHandle<()>>,
}

impl<T: Transport + 'static> ChannelManager<T> {
    /// Create a manager over a transport
    ///
    /// Spawns the writer task, so this must be called within a Tokio runtime.
    pub fn new(transport: T, config: ChannelConfig) -> Self {
        let transport = Arc::new(Mutex::new(transport));
        let codec = SocketCodec::new(config.namespace);
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        let state_tx = Arc::new(state_tx);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let writer_task = tokio::spawn(tasks::event_writer_task(
            transport.clone(),
            codec.clone(),
            outbound_rx,
            state_tx.subscribe(),
            config.outbound_buffer.max(1),
        ));

        Self {
            transport,
            codec,
            connect_timeout: config.connect_timeout,
            state_tx,
            generation: Arc::new(AtomicU64::new(0)),
            outbound_tx,
            writer_task,
            inbound_rx: None,
            reader_task: None,
        }
    }

    /// Open the channel
    ///
    /// On failure the state becomes `Error(reason)`, a `ConnectError` event
    /// is queued, and no retry is attempted.
    ///
    /// # Errors
    /// Returns error if connect or handshake fail or time out
    pub async fn open(&mut self) -> Result<ChannelHandle> {
        self.connect_current().await?;
        Ok(self.handle())
    }

    /// Close the channel
    ///
    /// Pending inbound events are discarded and [`Self::next_event`] resolves
    /// to `None` until the channel is opened again.
    ///
    /// # Errors
    /// Returns error if the transport fails to close
    pub async fn close(&mut self) -> Result<()> {
        let was_connected = self.state().is_connected();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.inbound_rx = None;

        let result = {
            let mut transport = self.transport.lock().await;
            if was_connected && transport.is_ready() {
                // Leaving the namespace is a courtesy; the close below is what matters.
                let _ = transport.write(&self.codec.disconnect_frame()).await;
            }
            transport.close().await
        };

        self.state_tx.send_replace(ChannelState::Disconnected);
        if was_connected {
            log::info!("Channel closed");
        }
        result
    }

    /// Tear down the current connection and open a new one
    ///
    /// Calling this while already disconnected just opens the channel.
    ///
    /// # Errors
    /// Returns error if the new connection cannot be established
    pub async fn reconnect(&mut self) -> Result<()> {
        log::info!("Reconnecting channel");
        if let Err(e) = self.close().await {
            log::warn!("Error while closing channel for reconnect: {e}");
        }
        self.connect_current().await
    }

    /// Next inbound event of the current connection
    ///
    /// Returns `None` once the connection is gone and its events are drained,
    /// or immediately when the channel is closed.
    pub async fn next_event(&mut self) -> Option<InboundEvent> {
        match self.inbound_rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Handle for emitting events
    #[must_use]
    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle {
            outbound: self.outbound_tx.clone(),
            state: self.state_tx.subscribe(),
        }
    }

    /// Current channel state
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state_tx.borrow().clone()
    }

    /// Watch the channel state
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Connection generation, bumped on every connect and close
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Connect the transport and run the handshake for a new generation
    async fn connect_current(&mut self) -> Result<()> {
        if self.state().is_connected() {
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state_tx.send_replace(ChannelState::Connecting);

        let attempt = handshake::connect_and_handshake(&self.transport, &self.codec);
        let outcome = match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdaError::timeout(format!(
                "connect did not finish within {:?}",
                self.connect_timeout
            ))),
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.inbound_rx = Some(events_rx);

        match outcome {
            Ok((frames, open)) => {
                log::info!("Channel connected (sid {})", open.sid);
                let _ = events_tx.send(InboundEvent::Connected);
                self.reader_task = Some(tokio::spawn(tasks::frame_reader_task(
                    tasks::ReaderContext {
                        transport: self.transport.clone(),
                        codec: self.codec.clone(),
                        events: events_tx,
                        deadline: open.heartbeat_deadline(),
                        generation,
                        current_generation: self.generation.clone(),
                        state_tx: self.state_tx.clone(),
                    },
                    frames,
                )));
                self.state_tx.send_replace(ChannelState::Connected);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                log::warn!("Channel connect failed: {reason}");
                if let Err(close_err) = self.transport.lock().await.close().await {
                    log::debug!("Transport close after failed connect: {close_err}");
                }
                let _ = events_tx.send(InboundEvent::ConnectError {
                    reason: reason.clone(),
                });
                self.state_tx.send_replace(ChannelState::Error(reason));
                Err(e)
            }
        }
    }
}

impl<T: Transport + 'static> ChannelControl for ChannelManager<T> {
    async fn reconnect(&mut self) -> Result<()> {
        ChannelManager::reconnect(self).await
    }
}

impl<T: Transport> Drop for ChannelManager<T> {
    fn drop(&mut self) {
        self.writer_task.abort();
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}
