//! Transport layer for reaching the agent server
//!
//! A transport moves raw text frames. It knows nothing about Engine.IO or
//! Socket.IO; the channel manager does the handshake and decoding on top.

pub mod memory;
pub mod websocket;

use tokio::sync::mpsc;

use crate::error::Result;

/// Transport trait for exchanging text frames with the agent server
pub trait Transport: Send + Sync {
    /// Open the underlying connection
    ///
    /// # Errors
    /// Returns error if the connection cannot be established
    fn connect(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Write one text frame
    ///
    /// # Errors
    /// Returns error if the write fails or the transport is not ready
    fn write(&mut self, frame: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read frames from the transport
    ///
    /// Returns a receiver fed by a background task. The receiver closes when
    /// the connection ends; a final `Err` item reports why, if known. Each
    /// call hands out the frames of the current connection only.
    fn read_frames(&mut self) -> mpsc::UnboundedReceiver<Result<String>>;

    /// Check if transport is ready for communication
    fn is_ready(&self) -> bool;

    /// Close the connection and clean up resources
    ///
    /// # Errors
    /// Returns error if cleanup fails
    fn close(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub use memory::{MemoryPeer, MemoryTransport};
pub use websocket::{Endpoint, WebSocketTransport};
