//! JSON file store written with tmp file + atomic rename

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::KeyValueStore;
use crate::error::{AdaError, Result};

/// Store persisting the profile as one JSON object file.
///
/// The whole map is cached in memory; every mutation rewrites the file
/// atomically, so a crash leaves either the old or the new profile.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open a store, loading the file if it exists.
    ///
    /// A missing, empty or corrupt file yields an empty profile.
    ///
    /// # Errors
    /// Returns error if an existing file cannot be read
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = Self::load(&path)?;
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                log::warn!(
                    "Profile file {} is corrupt, starting empty: {e}",
                    path.display()
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| AdaError::storage(format!("{} has no file name", self.path.display())))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        Ok(self.path.with_file_name(tmp_name))
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        f(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<()> {
        self.mutate(BTreeMap::clear)
    }

    fn snapshot(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.entries.lock().clone())
    }
}
