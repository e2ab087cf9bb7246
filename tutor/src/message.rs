//! Conversation records: one canonical message shape.
//!
//! DESIGN
//! ======
//! Older records carry either `text` or `content`, and mark the author with
//! either `isUser` or `sender: "user" | "bot"`. All of that is folded into
//! [`Message`] at deserialization time through [`RawMessage`]; nothing
//! downstream looks at which field happened to be present.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::prefs::{Gender, LanguageMode, ProficiencyLevel, Week};

// =============================================================================
// MESSAGE
// =============================================================================

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

impl Message {
    #[must_use]
    pub fn new(sender: Sender, body: impl Into<String>) -> Self {
        Self { id: new_message_id(), sender, body: body.into(), at: OffsetDateTime::now_utc() }
    }

    #[must_use]
    pub fn user(body: impl Into<String>) -> Self {
        Self::new(Sender::User, body)
    }

    #[must_use]
    pub fn assistant(body: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, body)
    }

    #[must_use]
    pub fn is_from_user(&self) -> bool {
        self.sender == Sender::User
    }
}

/// Message id: creation time in milliseconds followed by a random suffix,
/// so ids sort roughly by creation time and stay unique within a session.
#[must_use]
pub fn new_message_id() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{millis:013}-{}", &suffix[..8])
}

// =============================================================================
// INGESTION
// =============================================================================

/// Every message shape seen on the wire or in stored history.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_user: Option<bool>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default, alias = "at", alias = "createdAt")]
    pub timestamp: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageShapeError {
    #[error("message has no body, content or text field")]
    MissingBody,
    #[error("unknown sender: {0}")]
    UnknownSender(String),
}

impl TryFrom<RawMessage> for Message {
    type Error = MessageShapeError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let body = raw
            .body
            .or(raw.content)
            .or(raw.text)
            .ok_or(MessageShapeError::MissingBody)?;

        let sender = match (raw.is_user, raw.sender.as_deref()) {
            (Some(true), _) => Sender::User,
            (Some(false), _) => Sender::Assistant,
            (None, Some("user" | "student")) => Sender::User,
            (None, Some("assistant" | "bot")) | (None, None) => Sender::Assistant,
            (None, Some(other)) => return Err(MessageShapeError::UnknownSender(other.to_owned())),
        };

        let at = raw
            .timestamp
            .as_deref()
            .and_then(|ts| OffsetDateTime::parse(ts, &time::format_description::well_known::Rfc3339).ok())
            .unwrap_or_else(OffsetDateTime::now_utc);

        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(new_message_id);

        Ok(Self { id, sender, body, at })
    }
}

// =============================================================================
// CONVERSATION
// =============================================================================

/// The ordered message history of one learner, as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub session_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub level: ProficiencyLevel,
    #[serde(default)]
    pub week: Week,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub language: LanguageMode,
}

impl Conversation {
    #[must_use]
    pub fn new(session_id: impl Into<String>, owner_id: impl Into<String>, at: OffsetDateTime) -> Self {
        Self {
            session_id: session_id.into(),
            owner_id: owner_id.into(),
            owner_email: String::new(),
            owner_name: String::new(),
            messages: Vec::new(),
            created_at: at,
            updated_at: at,
            level: ProficiencyLevel::default(),
            week: Week::default(),
            gender: Gender::default(),
            language: LanguageMode::default(),
        }
    }

    /// Append messages in order and bump `updated_at`.
    pub fn append(&mut self, messages: impl IntoIterator<Item = Message>, at: OffsetDateTime) {
        self.messages.extend(messages);
        self.updated_at = at;
    }

    /// The last `n` messages, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
