//! Frame reading logic for the WebSocket transport

use std::sync::atomic::Ordering;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{AdaError, Result};

use super::transport::WebSocketTransport;

impl WebSocketTransport {
    /// Read text frames from the WebSocket
    ///
    /// This method spawns a background task that owns the read half of the
    /// socket, so writes never wait on reads.
    ///
    /// # Returns
    /// A receiver that yields text frames or a final error
    pub(super) fn read_frames_impl(&mut self) -> mpsc::UnboundedReceiver<Result<String>> {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        let stream = self.stream.take();
        let ready = self.ready.clone();

        let task = tokio::spawn(async move {
            let Some(mut stream) = stream else {
                let _ = tx.send(Err(AdaError::connection(
                    "Not connected - WebSocket stream not available",
                )));
                return;
            };

            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if tx.send(Ok(text)).is_err() {
                            // Receiver dropped, stop reading
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                        ready.store(false, Ordering::SeqCst);
                        let _ = tx.send(Err(AdaError::connection(reason)));
                        break;
                    }
                    Ok(Message::Binary(data)) => {
                        log::warn!("Ignoring {} byte binary frame", data.len());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        ready.store(false, Ordering::SeqCst);
                        let _ = tx.send(Err(AdaError::transport(format!(
                            "WebSocket read failed: {e}"
                        ))));
                        break;
                    }
                }
            }

            ready.store(false, Ordering::SeqCst);
        });

        self.reader_task = Some(task);

        rx
    }
}
