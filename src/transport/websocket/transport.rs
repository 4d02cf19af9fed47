//! WebSocket transport implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::SinkExt;
use futures::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::Transport;
use crate::error::{AdaError, Result};
use crate::types::options::ClientOptions;

use super::config::Endpoint;

pub(super) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport for the agent server
pub struct WebSocketTransport {
    pub(super) endpoint: Endpoint,
    pub(super) connect_timeout: Duration,
    pub(super) sink: Option<SplitSink<WsStream, Message>>,
    pub(super) stream: Option<SplitStream<WsStream>>,
    pub(super) ready: Arc<AtomicBool>,
    pub(super) reader_task: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport
    ///
    /// # Arguments
    /// * `endpoint` - Server URL and routing path
    /// * `connect_timeout` - Limit for the TCP + WebSocket handshake
    #[must_use]
    pub fn new(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
            sink: None,
            stream: None,
            ready: Arc::new(AtomicBool::new(false)),
            reader_task: None,
        }
    }

    /// Create a transport from client options
    #[must_use]
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(Endpoint::from_options(options), options.connect_timeout)
    }

    /// Endpoint this transport connects to
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Transport for WebSocketTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_impl().await
    }

    async fn write(&mut self, frame: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(AdaError::transport("Transport is not ready for writing"));
        }

        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| AdaError::transport("WebSocket sink not available"))?;

        sink.send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| AdaError::transport(format!("Failed to send frame: {e}")))?;

        Ok(())
    }

    fn read_frames(&mut self) -> mpsc::UnboundedReceiver<Result<String>> {
        self.read_frames_impl()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        self.close_impl().await
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.drop_impl();
    }
}
