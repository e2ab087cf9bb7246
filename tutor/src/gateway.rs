//! Remote conversation gateway.
//!
//! ARCHITECTURE
//! ============
//! [`AskGateway`] is the only way the conversation manager reaches the
//! backend. Production uses [`HttpAskGateway`]; tests implement the trait
//! with scripted fakes. The wire response ([`AskResponse`]) is normalized to
//! [`AskReply`] here, so the manager never sees optional wire fields.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::message::{Conversation, Message};
use crate::prefs::{Gender, LanguageMode, Preferences, ProficiencyLevel, Week};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("message quota exceeded")]
    QuotaExceeded,
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("failed to build http client: {0}")]
    HttpClientBuild(String),
}

/// How a failed ask is explained to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Authentication,
    Quota,
    Generic,
}

impl GatewayError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unauthorized => FailureKind::Authentication,
            Self::QuotaExceeded => FailureKind::Quota,
            Self::Status { .. } | Self::Network(_) | Self::Parse(_) | Self::HttpClientBuild(_) => FailureKind::Generic,
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub week: Week,
    #[serde(default)]
    pub level: ProficiencyLevel,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub language: LanguageMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AskRequest {
    #[must_use]
    pub fn new(question: impl Into<String>, prefs: &Preferences, session_id: Option<String>) -> Self {
        Self {
            question: question.into(),
            week: prefs.week,
            level: prefs.proficiency_level,
            gender: prefs.gender,
            language: prefs.language,
            session_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub language: Option<LanguageMode>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub conversation: Option<Conversation>,
    #[serde(default)]
    pub remaining_messages: Option<u32>,
    #[serde(default)]
    pub limit_warning: bool,
    #[serde(default)]
    pub max_limit_reached: bool,
}

/// A successful ask, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskReply {
    pub answer: String,
    pub session_id: Option<String>,
    /// The authoritative message list, when the backend returned one.
    pub messages: Option<Vec<Message>>,
    pub remaining: Option<u32>,
    pub limit_reached: bool,
    pub limit_warning: bool,
}

impl AskReply {
    /// A bare answer with no server counters.
    #[must_use]
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            answer: text.into(),
            session_id: None,
            messages: None,
            remaining: None,
            limit_reached: false,
            limit_warning: false,
        }
    }
}

impl TryFrom<AskResponse> for AskReply {
    type Error = GatewayError;

    fn try_from(response: AskResponse) -> Result<Self, Self::Error> {
        let answer = match response.answer {
            Some(answer) => answer,
            None if response.max_limit_reached => return Err(GatewayError::QuotaExceeded),
            None => return Err(GatewayError::Parse("response has no answer".into())),
        };
        let session_id = response
            .session_id
            .or_else(|| response.conversation.as_ref().map(|c| c.session_id.clone()));
        Ok(Self {
            answer,
            session_id,
            messages: response.conversation.map(|c| c.messages),
            remaining: response.remaining_messages,
            limit_reached: response.max_limit_reached,
            limit_warning: response.limit_warning,
        })
    }
}

// =============================================================================
// GATEWAY
// =============================================================================

#[async_trait]
pub trait AskGateway: Send + Sync {
    /// Ask the tutor a question.
    async fn ask(&self, request: AskRequest) -> Result<AskReply, GatewayError>;

    /// Fetch the stored messages of a conversation. `Ok(None)` when the
    /// backend has no such conversation.
    async fn load_conversation(&self, session_id: &str) -> Result<Option<Vec<Message>>, GatewayError>;
}

/// [`AskGateway`] over the backend's HTTP API.
#[derive(Clone)]
pub struct HttpAskGateway {
    api: ApiClient,
}

impl HttpAskGateway {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AskGateway for HttpAskGateway {
    async fn ask(&self, request: AskRequest) -> Result<AskReply, GatewayError> {
        let response: AskResponse = self.api.post_json("/api/ask", &request).await?;
        AskReply::try_from(response)
    }

    async fn load_conversation(&self, session_id: &str) -> Result<Option<Vec<Message>>, GatewayError> {
        match self
            .api
            .get_json::<Conversation>(&format!("/api/chatlogs/{session_id}"))
            .await
        {
            Ok(conversation) => Ok(Some(conversation.messages)),
            Err(GatewayError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;
