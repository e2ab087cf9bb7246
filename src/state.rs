//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the store bundle, the optional LLM client, and the parsed server
//! config. Every field is `Arc`-backed so cloning per request is cheap.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::llm::LlmChat;
use crate::store::Stores;

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    /// `None` when no LLM API key is configured; `/api/ask` answers 503.
    pub llm: Option<Arc<dyn LlmChat>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(stores: Stores, llm: Option<Arc<dyn LlmChat>>, config: ServerConfig) -> Self {
        Self { stores, llm, config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::sync::Mutex;

    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::llm::types::{ChatMessage, ChatParams, ChatResponse, LlmError};
    use crate::store::Account;

    pub const ADMIN_EMAIL: &str = "admin@lisan.test";

    /// Memory stores, no LLM, one configured admin.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(Stores::memory(), None, test_config())
    }

    #[must_use]
    pub fn test_app_state_with_llm(llm: Arc<dyn LlmChat>) -> AppState {
        AppState::new(Stores::memory(), Some(llm), test_config())
    }

    #[must_use]
    pub fn test_config() -> ServerConfig {
        ServerConfig { admin_emails: vec![ADMIN_EMAIL.to_owned()], ..ServerConfig::default() }
    }

    /// Create an account plus a live session and return both.
    pub async fn seed_account(state: &AppState, email: &str) -> (Account, String) {
        let name = email.split('@').next().unwrap_or("user");
        let account = state
            .stores
            .accounts
            .upsert_account(email, name)
            .await
            .expect("account upsert should succeed");
        let token = crate::services::session::generate_token();
        state
            .stores
            .accounts
            .insert_session(&token, account.id, OffsetDateTime::now_utc() + Duration::days(1))
            .await
            .expect("session insert should succeed");
        (account, token)
    }

    /// Scripted LLM: answers with a fixed text, or fails when `fail` is set.
    /// Records every system prompt and message list it receives.
    pub struct MockLlm {
        pub reply: String,
        pub fail: bool,
        pub calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    impl MockLlm {
        #[must_use]
        pub fn replying(text: &str) -> Self {
            Self { reply: text.to_owned(), fail: false, calls: Mutex::new(Vec::new()) }
        }

        #[must_use]
        pub fn failing() -> Self {
            Self { reply: String::new(), fail: true, calls: Mutex::new(Vec::new()) }
        }

        pub fn call_count(&self) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len()
        }

        pub fn last_system_prompt(&self) -> Option<String> {
            self.calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .last()
                .map(|(system, _)| system.clone())
        }
    }

    #[async_trait::async_trait]
    impl LlmChat for MockLlm {
        async fn chat(
            &self,
            _params: ChatParams,
            system: &str,
            messages: &[ChatMessage],
        ) -> Result<ChatResponse, LlmError> {
            self.calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((system.to_owned(), messages.to_vec()));
            if self.fail {
                return Err(LlmError::Upstream { status: 500, body: "upstream down".into() });
            }
            Ok(ChatResponse {
                text: self.reply.clone(),
                model: "mock".into(),
                finish_reason: "stop".into(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }
}
