//! Durable key-value storage for the participant profile
//!
//! The profile is a flat map of string keys to string values. Components
//! store JSON records as values and treat anything they cannot decode as
//! absent.

mod file;
mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key-value store backing the participant profile
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    ///
    /// # Errors
    /// Returns error if the backing store cannot be read
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    ///
    /// # Errors
    /// Returns error if the backing store cannot be written
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value
    ///
    /// # Errors
    /// Returns error if the backing store cannot be written
    fn remove(&self, key: &str) -> Result<()>;

    /// Remove every value
    ///
    /// # Errors
    /// Returns error if the backing store cannot be written
    fn clear(&self) -> Result<()>;

    /// Copy of every key and value, ordered by key
    ///
    /// # Errors
    /// Returns error if the backing store cannot be read
    fn snapshot(&self) -> Result<BTreeMap<String, String>>;
}

/// Store shared between the identity store, sequencer and activity logger
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Read and decode a JSON record, treating malformed data as absent
///
/// # Errors
/// Returns error only if the store itself fails
pub fn load_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::warn!("Ignoring malformed record under '{key}': {e}");
            Ok(None)
        }
    }
}

/// Encode and write a JSON record
///
/// # Errors
/// Returns error if encoding or the store write fails
pub fn save_json<T: serde::Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}
