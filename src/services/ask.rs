//! Ask service: one tutoring turn.
//!
//! DESIGN
//! ======
//! The server is the only authority on quota. A turn runs:
//!
//! 1. reject blank questions
//! 2. load this month's usage and entitlement; refuse when the free quota
//!    is used up
//! 3. load or create the learner's conversation
//! 4. look up lesson materials and build the teaching prompt
//! 5. call the LLM
//! 6. count the message, append `[user, assistant]`, persist
//!
//! TRADE-OFFS
//! ==========
//! The counter moves only after the LLM has answered, so a failed upstream
//! call never costs the learner a message. Two concurrent asks from the same
//! account at `limit - 1` can both pass step 2; the overshoot is bounded by
//! the number of in-flight requests and self-corrects on the next turn.

use time::OffsetDateTime;
use tracing::{info, warn};
use tutor::materials::lesson_key;
use tutor::quota::WARNING_THRESHOLD;
use tutor::{AskRequest, AskResponse, Conversation, Message, resolve_identity};

use crate::llm::types::{ChatMessage, ChatParams, LlmError};
use crate::services::prompt::{LearnerProfile, build_teaching_prompt};
use crate::services::usage;
use crate::state::AppState;
use crate::store::{Account, StoreError};

pub const ASK_PARAMS: ChatParams = ChatParams { max_tokens: 1000, temperature: 0.3 };

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("question is required")]
    EmptyQuestion,
    #[error("monthly message limit reached")]
    QuotaExceeded,
    #[error("LLM is not configured")]
    LlmUnavailable,
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Conversation id for an account. Matches the identity the client derives
/// from the same e-mail, so the client can fetch its own log by id.
#[must_use]
pub fn session_id_for(account: &Account) -> String {
    resolve_identity(Some(&account.email))
}

/// Quota counters returned with every answer.
#[must_use]
pub fn quota_signal(limit: u32, used: u32, entitled: bool) -> (Option<u32>, bool, bool) {
    if entitled {
        return (None, false, false);
    }
    let remaining = limit.saturating_sub(used);
    (Some(remaining), remaining <= WARNING_THRESHOLD, remaining == 0)
}

pub async fn ask(state: &AppState, account: &Account, request: AskRequest) -> Result<AskResponse, AskError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AskError::EmptyQuestion);
    }

    let now = OffsetDateTime::now_utc();
    let month = usage::month_key(now);
    let limit = state.config.max_monthly_messages;
    let used = state.stores.usage.get(account.id, &month).await?.message_count;
    let entitled = usage::is_premium(state, account.id, &month, now).await?;
    if !entitled && used >= limit {
        info!(account_id = %account.id, used, limit, "ask refused: monthly limit reached");
        return Err(AskError::QuotaExceeded);
    }

    let Some(llm) = state.llm.as_ref() else {
        return Err(AskError::LlmUnavailable);
    };

    let session_id = session_id_for(account);
    if request.session_id.as_deref().is_some_and(|id| id != session_id) {
        warn!(account_id = %account.id, requested = ?request.session_id, "ignoring foreign session id");
    }

    let mut conversation = match state.stores.chat_logs.get(&session_id).await? {
        Some(existing) => existing,
        None => {
            let mut fresh = Conversation::new(&session_id, account.id.to_string(), now);
            fresh.owner_email.clone_from(&account.email);
            fresh.owner_name.clone_from(&account.name);
            fresh
        }
    };
    conversation.level = request.level;
    conversation.week = request.week;
    conversation.gender = request.gender;
    conversation.language = request.language;

    let key = lesson_key(request.level, request.week);
    let materials = match state.stores.materials.by_prefix(&key).await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, lesson = %key, "materials lookup failed; answering without materials");
            Vec::new()
        }
    };
    info!(lesson = %key, count = materials.len(), "materials loaded");

    let profile = LearnerProfile {
        level: request.level,
        week: request.week,
        gender: request.gender,
        language: request.language,
    };
    let prompt = build_teaching_prompt(&profile, &materials, &conversation.messages);
    let reply = llm
        .chat(ASK_PARAMS, &prompt, &[ChatMessage::user(question)])
        .await?;

    let count = state.stores.usage.increment(account.id, &month).await?;
    conversation.append([Message::user(question), Message::assistant(&reply.text)], OffsetDateTime::now_utc());
    state.stores.chat_logs.upsert(&conversation).await?;

    info!(
        account_id = %account.id,
        session_id = %session_id,
        count,
        model = %reply.model,
        input_tokens = reply.input_tokens,
        output_tokens = reply.output_tokens,
        "ask answered"
    );

    let (remaining_messages, limit_warning, max_limit_reached) = quota_signal(limit, count, entitled);
    Ok(AskResponse {
        answer: Some(reply.text),
        session_id: Some(session_id),
        language: Some(request.language),
        direction: Some(request.language.direction().to_owned()),
        conversation: Some(conversation),
        remaining_messages,
        limit_warning,
        max_limit_reached,
    })
}

#[cfg(test)]
#[path = "ask_test.rs"]
mod tests;
