//! WebSocket transport implementation using tokio-tungstenite
//!
//! This module provides a transport that opens the Engine.IO WebSocket
//! endpoint of the agent server and exchanges text frames with it.

mod config;
mod lifecycle;
mod reader;
mod transport;

// Re-export public types
pub use config::Endpoint;
pub use transport::WebSocketTransport;
