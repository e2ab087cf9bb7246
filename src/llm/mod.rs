//! LLM: chat completions adapter for the tutor.
//!
//! DESIGN
//! ======
//! The ask service talks to the model only through the [`LlmChat`] trait so
//! tests can script replies. [`LlmClient`] is the production implementation:
//! an OpenAI-compatible `/chat/completions` client configured from the
//! environment. Any compatible endpoint works through `LLM_BASE_URL`.

pub mod config;
pub mod openai;
pub mod types;

use config::LlmConfig;
pub use types::LlmChat;
use types::{ChatMessage, ChatParams, ChatResponse, LlmError};

/// Production LLM client, configured by [`LlmClient::from_env`].
pub struct LlmClient {
    inner: openai::OpenAiClient,
    model: String,
}

impl LlmClient {
    /// Build an LLM client from environment variables. See
    /// [`LlmConfig::from_env`] for the variables read.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        let config = LlmConfig::from_env()?;
        Self::from_config(config)
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = openai::OpenAiClient::new(config.api_key, config.base_url, config.timeouts)?;
        Ok(Self { inner, model: config.model })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl LlmChat for LlmClient {
    async fn chat(&self, params: ChatParams, system: &str, messages: &[ChatMessage]) -> Result<ChatResponse, LlmError> {
        self.inner.chat(&self.model, params, system, messages).await
    }
}
