//! Lifecycle management for the WebSocket transport (connect, close)

use std::sync::atomic::Ordering;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{AdaError, Result};

use super::transport::WebSocketTransport;

impl WebSocketTransport {
    /// Open the WebSocket connection
    ///
    /// Connecting a live transport is a no-op. A socket the server already
    /// dropped is released first and replaced by a new one.
    ///
    /// # Errors
    /// Returns error if the URL is invalid, the connection is refused or the
    /// handshake does not finish within the connect timeout
    pub(super) async fn connect_impl(&mut self) -> Result<()> {
        if self.sink.is_some() {
            if self.ready.load(Ordering::SeqCst) {
                return Ok(());
            }
            if let Err(e) = self.close_impl().await {
                log::debug!("Releasing dropped WebSocket: {e}");
            }
        }

        let url = self.endpoint.websocket_url()?;
        log::debug!("Opening WebSocket {url}");

        let attempt = connect_async(url.as_str());
        let (ws, _response) = tokio::time::timeout(self.connect_timeout, attempt)
            .await
            .map_err(|_| {
                AdaError::timeout(format!(
                    "WebSocket connect to {url} exceeded {:?}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| AdaError::connection(format!("Failed to connect to {url}: {e}")))?;

        let (sink, stream) = ws.split();
        self.sink = Some(sink);
        self.stream = Some(stream);
        self.ready.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Close the connection and clean up resources
    ///
    /// # Errors
    /// Returns error if the close frame cannot be flushed
    pub(super) async fn close_impl(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.stream = None;

        if let Some(mut sink) = self.sink.take() {
            // The peer may already be gone; a failed close frame is not an error.
            let _ = sink.send(Message::Close(None)).await;
            sink.close()
                .await
                .or_else(|e| match e {
                    tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::AlreadyClosed => Ok(()),
                    other => Err(other),
                })
                .map_err(|e| AdaError::transport(format!("Failed to close WebSocket: {e}")))?;
        }

        Ok(())
    }

    /// Handle Drop cleanup
    pub(super) fn drop_impl(&mut self) {
        self.ready.store(false, Ordering::SeqCst);
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}
