//! Durable key/value storage for client state.
//!
//! SYSTEM CONTEXT
//! ==============
//! Preferences, quota counters and local chat history are small JSON
//! documents keyed by a fixed name. The conversation manager and the
//! preference store only see the [`Storage`] trait, so tests hand them a
//! [`MemoryStorage`] and the CLI hands them a [`FileStorage`] rooted in its
//! state directory.
//!
//! Writes through [`FileStorage`] go to a temporary sibling file that is then
//! renamed over the target, so a reader never observes a half-written value.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Minimal string key/value store.
pub trait Storage: Send + Sync {
    /// Read the value under `key`. Absent keys are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under `key`. Completes before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// MEMORY
// =============================================================================

/// Process-local storage, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// One `<key>.json` file per key under a state directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keys become file names, so only a conservative alphabet is allowed.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.starts_with('.')
}

// =============================================================================
// JSON HELPERS
// =============================================================================

/// Load and decode a JSON value. Missing, unreadable and undecodable values
/// all come back as `None`; the latter two are logged.
pub fn load_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(key, error = %e, "storage read failed");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "stored value did not decode");
            None
        }
    }
}

/// Encode and store a JSON value.
///
/// # Errors
///
/// Returns an error if encoding or the underlying write fails.
pub fn save_json<T: Serialize + ?Sized>(storage: &dyn Storage, key: &str, value: &T) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw)
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
