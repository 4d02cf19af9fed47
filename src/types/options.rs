//! Client options and configuration
//!
//! This module contains the configuration of the study client, including a
//! builder and an environment-variable loader.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AdaError, Result};

/// Default agent server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000/";

/// Default Socket.IO routing path
pub const DEFAULT_SOCKETIO_PATH: &str = "/socket.io";

/// Default connect and handshake timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default busy stall warning threshold
pub const DEFAULT_TURN_STALL_WARNING: Duration = Duration::from_secs(60);

/// Default number of outbound events kept while disconnected
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

// ============================================================================
// Client Options
// ============================================================================

/// Main options for the study client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Agent server URL (http, https, ws or wss)
    pub server_url: String,
    /// Socket.IO routing path
    pub socketio_path: String,
    /// Timeout for connect plus handshake
    pub connect_timeout: Duration,
    /// File backing the persisted profile; in-memory when unset
    pub storage_path: Option<PathBuf>,
    /// Participant id handed in by the study link
    pub participant_id: Option<String>,
    /// Page name attached to activity log records
    pub page: String,
    /// Chat name shown in the driver
    pub name: String,
    /// Busy duration after which a stall warning is logged
    pub turn_stall_warning: Duration,
    /// Outbound events kept while the channel is not connected
    pub outbound_buffer: usize,
    /// Seed for task condition randomization
    pub rng_seed: Option<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            socketio_path: DEFAULT_SOCKETIO_PATH.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            storage_path: None,
            participant_id: None,
            page: "task".to_string(),
            name: "Chatbot".to_string(),
            turn_stall_warning: DEFAULT_TURN_STALL_WARNING,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            rng_seed: None,
        }
    }
}

impl ClientOptions {
    /// Create a new builder for `ClientOptions`
    #[must_use]
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// Load options from `ADA_*` environment variables over the defaults
    ///
    /// # Errors
    /// Returns error if a numeric variable does not parse
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Ok(url) = env::var("ADA_SERVER_URL") {
            options.server_url = url;
        }
        if let Ok(path) = env::var("ADA_SOCKETIO_PATH") {
            options.socketio_path = path;
        }
        if let Ok(secs) = env::var("ADA_CONNECT_TIMEOUT_SECS") {
            options.connect_timeout =
                Duration::from_secs(parse_number("ADA_CONNECT_TIMEOUT_SECS", &secs)?);
        }
        if let Ok(path) = env::var("ADA_STORAGE_PATH") {
            options.storage_path = Some(PathBuf::from(path));
        }
        if let Ok(id) = env::var("ADA_USER_ID")
            && !id.trim().is_empty()
        {
            options.participant_id = Some(id);
        }
        if let Ok(page) = env::var("ADA_PAGE") {
            options.page = page;
        }
        if let Ok(secs) = env::var("ADA_TURN_STALL_SECS") {
            options.turn_stall_warning =
                Duration::from_secs(parse_number("ADA_TURN_STALL_SECS", &secs)?);
        }
        if let Ok(seed) = env::var("ADA_RNG_SEED") {
            options.rng_seed = Some(parse_number("ADA_RNG_SEED", &seed)?);
        }

        options.validate()?;
        Ok(options)
    }

    /// Check option consistency
    ///
    /// # Errors
    /// Returns error for an empty server URL or a zero outbound buffer
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(AdaError::invalid_config("server_url is empty"));
        }
        if self.outbound_buffer == 0 {
            return Err(AdaError::invalid_config("outbound_buffer must be positive"));
        }
        Ok(())
    }
}

fn parse_number(var: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| AdaError::invalid_config(format!("{var}={value}: {e}")))
}

// ============================================================================
// Builder for ClientOptions
// ============================================================================

/// Builder for `ClientOptions`
#[derive(Debug, Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    /// Set the server URL
    #[must_use]
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.options.server_url = url.into();
        self
    }

    /// Set the Socket.IO routing path
    #[must_use]
    pub fn socketio_path(mut self, path: impl Into<String>) -> Self {
        self.options.socketio_path = path.into();
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Persist the profile to a JSON file
    #[must_use]
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.storage_path = Some(path.into());
        self
    }

    /// Set the inbound participant id
    #[must_use]
    pub fn participant_id(mut self, id: impl Into<String>) -> Self {
        self.options.participant_id = Some(id.into());
        self
    }

    /// Set the page name used in activity logs
    #[must_use]
    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.options.page = page.into();
        self
    }

    /// Set the chat name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    /// Set the busy stall warning threshold
    #[must_use]
    pub const fn turn_stall_warning(mut self, threshold: Duration) -> Self {
        self.options.turn_stall_warning = threshold;
        self
    }

    /// Set the outbound buffer size
    #[must_use]
    pub const fn outbound_buffer(mut self, size: usize) -> Self {
        self.options.outbound_buffer = size;
        self
    }

    /// Seed the task condition randomization
    #[must_use]
    pub const fn rng_seed(mut self, seed: u64) -> Self {
        self.options.rng_seed = Some(seed);
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> ClientOptions {
        self.options
    }
}
