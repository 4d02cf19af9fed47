//! Endpoint configuration for the WebSocket transport

use crate::error::{AdaError, Result};
use crate::protocol::{DEFAULT_NAMESPACE, ENGINE_IO_VERSION};
use crate::types::options::ClientOptions;

/// Agent server address plus Socket.IO routing path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server URL; its path selects the Socket.IO namespace
    pub server_url: String,
    /// Socket.IO routing path, usually `/socket.io`
    pub path: String,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(server_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            path: path.into(),
        }
    }

    /// Endpoint configured by the client options
    #[must_use]
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(options.server_url.clone(), options.socketio_path.clone())
    }

    /// Split the server URL into WebSocket scheme, authority and path
    fn parts(&self) -> Result<(&'static str, &str, &str)> {
        let url = self.server_url.trim();
        let (scheme, rest) = match url.split_once("://") {
            Some(("http" | "ws", rest)) => ("ws", rest),
            Some(("https" | "wss", rest)) => ("wss", rest),
            Some((other, _)) => {
                return Err(AdaError::invalid_config(format!(
                    "unsupported URL scheme '{other}' in {url}"
                )));
            }
            None => ("ws", url),
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(AdaError::invalid_config(format!("missing host in {url}")));
        }
        Ok((scheme, authority, path))
    }

    /// Engine.IO WebSocket URL
    ///
    /// # Errors
    /// Returns error if the server URL has no host or an unsupported scheme
    pub fn websocket_url(&self) -> Result<String> {
        let (scheme, authority, _) = self.parts()?;
        let path = self.path.trim().trim_end_matches('/');
        let path = if path.starts_with('/') || path.is_empty() {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Ok(format!(
            "{scheme}://{authority}{path}/?EIO={ENGINE_IO_VERSION}&transport=websocket"
        ))
    }

    /// Socket.IO namespace selected by the server URL path
    ///
    /// # Errors
    /// Returns error if the server URL has no host or an unsupported scheme
    pub fn namespace(&self) -> Result<String> {
        let (_, _, path) = self.parts()?;
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        Ok(if path.is_empty() {
            DEFAULT_NAMESPACE.to_string()
        } else {
            path.to_string()
        })
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::from_options(&ClientOptions::default())
    }
}
