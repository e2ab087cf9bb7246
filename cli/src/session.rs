//! Saved login for the CLI, kept in the tutor's local storage.

use serde::{Deserialize, Serialize};
use tutor::Storage;
use tutor::storage::{StorageError, load_json, save_json};

pub const SESSION_KEY: &str = "cliSession";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub token: String,
    pub email: String,
    pub name: String,
}

impl SavedSession {
    /// Conversation partition for this login.
    #[must_use]
    pub fn identity(&self) -> String {
        tutor::resolve_identity(Some(&self.email))
    }
}

#[must_use]
pub fn load(storage: &dyn Storage) -> Option<SavedSession> {
    load_json(storage, SESSION_KEY)
}

pub fn save(storage: &dyn Storage, session: &SavedSession) -> Result<(), StorageError> {
    save_json(storage, SESSION_KEY, session)
}

pub fn clear(storage: &dyn Storage) -> Result<(), StorageError> {
    storage.remove(SESSION_KEY)
}

/// Token to send: an explicit one wins over the saved login.
#[must_use]
pub fn effective_token(explicit: Option<&str>, saved: Option<&SavedSession>) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .or_else(|| saved.map(|s| s.token.clone()))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
