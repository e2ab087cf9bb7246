//! LLM types: provider-neutral chat messages, responses and errors.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERRORS
// =============================================================================

/// Failures talking to the tutor's language model.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("invalid LLM setting: {0}")]
    InvalidConfig(String),

    /// No key under the configured variable name.
    #[error("no LLM API key in ${var}")]
    MissingApiKey { var: String },

    #[error("LLM request did not complete: {0}")]
    Transport(String),

    #[error("LLM provider answered {status}")]
    Upstream { status: u16, body: String },

    #[error("unexpected LLM response: {0}")]
    Malformed(String),

    #[error("could not build LLM http client: {0}")]
    ClientBuild(String),
}

// =============================================================================
// CHAT TURNS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Sampling parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// One completion with its token accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub model: String,
    pub finish_reason: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

// =============================================================================
// SEAM
// =============================================================================

/// The one call the ask service makes: a system prompt plus the turn(s),
/// answered with a single completion.
#[async_trait::async_trait]
pub trait LlmChat: Send + Sync {
    /// # Errors
    ///
    /// Transport, provider, or decoding failures as [`LlmError`].
    async fn chat(&self, params: ChatParams, system: &str, messages: &[ChatMessage]) -> Result<ChatResponse, LlmError>;
}
