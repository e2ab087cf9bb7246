//! Conversation state manager.
//!
//! DESIGN
//! ======
//! One manager owns one learner's conversation: the ordered messages, the
//! quota mirror, and the `Idle | Sending` phase. All of it sits behind a
//! single `std::sync::Mutex` that is taken for short synchronous sections
//! only and never held across the gateway `.await`.
//!
//! SEND LIFECYCLE
//! ==============
//! 1. Empty input is ignored. A send while another is in flight is `Busy`.
//! 2. The quota gate refuses with a notice and no network call.
//! 3. The user message is appended before the request is issued, and the
//!    phase flips to `Sending` under the same lock.
//! 4. On success the answer is appended, or the backend's message list
//!    replaces local state wholesale. Server counters overwrite the quota
//!    mirror.
//! 5. On failure exactly one diagnostic assistant message is appended.
//!
//! `start` and `resume` replace the conversation without touching the phase,
//! so an outstanding ask still holds the `Sending` slot. Each replacement
//! bumps a generation counter; a result that comes back for an earlier
//! generation updates the quota mirror only and is otherwise dropped.
//!
//! Every mutation is mirrored to local storage under [`HISTORY_KEY`] and
//! [`QUOTA_KEY`], keyed by the learner's identity. The quota mirror carries
//! the `YYYY-MM` period it was counted in.
//!
//! TRADE-OFFS
//! ==========
//! There is no retry and no cancellation of an in-flight ask; the gateway's
//! HTTP timeouts bound the wait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::gateway::{AskGateway, AskReply, AskRequest, FailureKind, GatewayError};
use crate::identity::GUEST_IDENTITY;
use crate::message::Message;
use crate::prefs::Preferences;
use crate::quota::{QuotaState, month_key};
use crate::storage::{Storage, load_json, save_json};
use crate::welcome::{diagnostic_message, remaining_hint, welcome_message};

pub const HISTORY_KEY: &str = "chatHistory";
pub const QUOTA_KEY: &str = "quotaState";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    /// Offer the upgrade flow.
    UpgradeRequired,
}

/// A transient notification for the front end (a toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
    pub action: Option<NoticeAction>,
}

impl Notice {
    fn new(level: NoticeLevel, title: &str, body: impl Into<String>) -> Self {
        Self { level, title: title.to_owned(), body: body.into(), action: None }
    }

    fn with_upgrade(mut self) -> Self {
        self.action = Some(NoticeAction::UpgradeRequired);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty or whitespace-only input.
    Ignored,
    /// Refused by the quota gate; the gateway was not called.
    Blocked,
    /// Another send is still in flight.
    Busy,
    Replied,
    Failed(FailureKind),
    /// The conversation was replaced while waiting; the result was dropped.
    Superseded,
}

/// Where [`ConversationManager::resume`] found the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSource {
    Remote,
    Local,
    /// Nothing usable; a fresh welcome was started.
    Started,
}

/// Collaborators injected into a manager.
#[derive(Clone)]
pub struct ConversationContext {
    pub storage: Arc<dyn Storage>,
    pub gateway: Arc<dyn AskGateway>,
    /// Partition key from [`crate::resolve_identity`].
    pub identity: String,
    /// Premium entitlement known at construction.
    pub entitled: bool,
}

/// Local mirror of one learner's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalConversation {
    owner_id: String,
    #[serde(default)]
    session_id: Option<String>,
    messages: Vec<Message>,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

/// Quota mirror as stored, stamped with its period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredQuota {
    #[serde(default)]
    period: String,
    #[serde(flatten)]
    state: QuotaState,
}

struct Inner {
    phase: Phase,
    /// Bumped whenever the message list is replaced by `start` or `resume`.
    generation: u64,
    prefs: Preferences,
    session_id: Option<String>,
    messages: Vec<Message>,
    quota: QuotaState,
    quota_period: String,
    notices: Vec<Notice>,
}

impl Inner {
    /// Reset the mirror if the calendar month moved on since it was counted.
    fn roll_quota_period(&mut self, now: OffsetDateTime) {
        let current = month_key(now);
        if self.quota_period != current {
            self.quota.reset_period();
            self.quota_period = current;
        }
    }
}

// =============================================================================
// MANAGER
// =============================================================================

pub struct ConversationManager {
    storage: Arc<dyn Storage>,
    gateway: Arc<dyn AskGateway>,
    identity: String,
    inner: Mutex<Inner>,
}

impl ConversationManager {
    /// Build a manager. The quota mirror is restored from local storage;
    /// messages stay empty until [`start`](Self::start),
    /// [`resume`](Self::resume) or [`open`](Self::open).
    #[must_use]
    pub fn new(ctx: ConversationContext, prefs: Preferences) -> Self {
        let stored = load_json::<HashMap<String, StoredQuota>>(ctx.storage.as_ref(), QUOTA_KEY)
            .and_then(|mut all| all.remove(&ctx.identity));
        let (mut quota, quota_period) = stored.map_or_else(
            || (QuotaState::default(), String::new()),
            |s| (s.state, s.period),
        );
        quota.set_entitlement(ctx.entitled);

        let mut inner = Inner {
            phase: Phase::Idle,
            generation: 0,
            prefs,
            session_id: None,
            messages: Vec::new(),
            quota,
            quota_period,
            notices: Vec::new(),
        };
        inner.roll_quota_period(OffsetDateTime::now_utc());

        Self { storage: ctx.storage, gateway: ctx.gateway, identity: ctx.identity, inner: Mutex::new(inner) }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // session start
    // -------------------------------------------------------------------------

    /// Begin a fresh conversation with a localized welcome message. A send
    /// still in flight keeps the manager busy; its reply is dropped.
    pub fn start(&self, prefs: &Preferences) {
        {
            let mut inner = self.lock();
            inner.prefs = prefs.clone();
            inner.session_id = None;
            inner.messages = vec![Message::assistant(welcome_message(prefs))];
            inner.generation += 1;
        }
        tracing::info!(identity = %self.identity, language = %prefs.language, "conversation started");
        self.persist_history();
    }

    /// Restore an earlier conversation: the backend's copy first, then the
    /// local mirror, and a fresh start when neither has messages. Load
    /// failures are logged, never returned.
    pub async fn resume(&self, session_id: &str) -> ResumeSource {
        if self.identity != GUEST_IDENTITY {
            match self.gateway.load_conversation(session_id).await {
                Ok(Some(messages)) if !messages.is_empty() => {
                    self.adopt(Some(session_id.to_owned()), messages);
                    tracing::info!(identity = %self.identity, %session_id, "conversation resumed from backend");
                    return ResumeSource::Remote;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(identity = %self.identity, %session_id, error = %e, "remote history unavailable");
                }
            }
        }

        if let Some(local) = self.load_local().filter(|c| !c.messages.is_empty()) {
            let session = local.session_id.or_else(|| Some(session_id.to_owned()));
            self.adopt(session, local.messages);
            tracing::info!(identity = %self.identity, %session_id, "conversation resumed from local history");
            return ResumeSource::Local;
        }

        let prefs = self.preferences();
        self.start(&prefs);
        ResumeSource::Started
    }

    /// Resume the learner's conversation if there is one, else start fresh.
    pub async fn open(&self) -> ResumeSource {
        let session_id = self
            .load_local()
            .and_then(|c| c.session_id)
            .unwrap_or_else(|| self.identity.clone());
        self.resume(&session_id).await
    }

    fn adopt(&self, session_id: Option<String>, messages: Vec<Message>) {
        {
            let mut inner = self.lock();
            inner.session_id = session_id;
            inner.messages = messages;
            inner.generation += 1;
        }
        self.persist_history();
    }

    // -------------------------------------------------------------------------
    // send
    // -------------------------------------------------------------------------

    /// Send one learner message and wait for the outcome.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        let (request, generation) = {
            let mut inner = self.lock();
            if inner.phase == Phase::Sending {
                return SendOutcome::Busy;
            }
            inner.roll_quota_period(OffsetDateTime::now_utc());
            if !inner.quota.can_send() {
                inner.notices.push(limit_reached_notice());
                tracing::info!(identity = %self.identity, "send blocked by quota");
                return SendOutcome::Blocked;
            }
            inner.messages.push(Message::user(text));
            inner.phase = Phase::Sending;
            (AskRequest::new(text, &inner.prefs, inner.session_id.clone()), inner.generation)
        };
        self.persist_history();

        let result = self.gateway.ask(request).await;

        if self.finish_if_superseded(generation, result.as_ref()) {
            self.persist_quota();
            return SendOutcome::Superseded;
        }
        let outcome = match result {
            Ok(reply) => {
                self.apply_reply(reply);
                SendOutcome::Replied
            }
            Err(e) => SendOutcome::Failed(self.apply_failure(&e)),
        };
        self.persist_history();
        self.persist_quota();
        outcome
    }

    /// Release the `Sending` slot for a result issued against an earlier
    /// generation. Only the server's quota counters survive.
    fn finish_if_superseded(&self, generation: u64, result: Result<&AskReply, &GatewayError>) -> bool {
        let mut inner = self.lock();
        if inner.generation == generation {
            return false;
        }
        inner.phase = Phase::Idle;
        match result {
            Ok(reply) if reply.remaining.is_some() || reply.limit_reached => {
                inner.quota.apply_server_signal(reply.remaining, reply.limit_reached);
            }
            Ok(_) => inner.quota.record_sent(),
            Err(e) if e.kind() == FailureKind::Quota => inner.quota.apply_server_signal(None, true),
            Err(_) => {}
        }
        tracing::info!(identity = %self.identity, generation, "dropped result for a replaced conversation");
        true
    }

    fn apply_reply(&self, reply: AskReply) {
        let mut inner = self.lock();
        inner.phase = Phase::Idle;

        match reply.messages {
            Some(messages) if !messages.is_empty() => inner.messages = messages,
            _ => inner.messages.push(Message::assistant(reply.answer)),
        }
        if reply.session_id.is_some() {
            inner.session_id = reply.session_id;
        }

        if reply.remaining.is_some() || reply.limit_reached {
            inner.quota.apply_server_signal(reply.remaining, reply.limit_reached);
        } else {
            inner.quota.record_sent();
        }

        if reply.limit_reached && !inner.quota.is_premium_entitled {
            inner.notices.push(limit_reached_notice());
        } else if reply.limit_warning || inner.quota.is_near_limit() {
            if let Some(remaining) = inner.quota.remaining() {
                let notice = Notice::new(NoticeLevel::Warning, "Message limit approaching", remaining_hint(remaining));
                inner.notices.push(notice.with_upgrade());
            }
        }

        tracing::debug!(identity = %self.identity, remaining = ?inner.quota.remaining(), "reply applied");
    }

    fn apply_failure(&self, error: &GatewayError) -> FailureKind {
        let kind = error.kind();
        tracing::warn!(identity = %self.identity, error = %error, ?kind, "ask failed");

        let mut inner = self.lock();
        inner.phase = Phase::Idle;
        let diagnostic = diagnostic_message(kind, inner.prefs.language);
        inner.messages.push(Message::assistant(diagnostic));

        let notice = match kind {
            FailureKind::Authentication => Notice::new(
                NoticeLevel::Error,
                "Authentication Error",
                "Your session may have expired. Please log in again.",
            ),
            FailureKind::Quota => {
                inner.quota.apply_server_signal(None, true);
                limit_reached_notice()
            }
            FailureKind::Generic => Notice::new(
                NoticeLevel::Error,
                "API Error",
                "Could not get a response. Please try again.",
            ),
        };
        inner.notices.push(notice);
        kind
    }

    // -------------------------------------------------------------------------
    // accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// True while a reply is outstanding.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.phase() == Phase::Sending
    }

    #[must_use]
    pub fn quota(&self) -> QuotaState {
        self.lock().quota
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    #[must_use]
    pub fn preferences(&self) -> Preferences {
        self.lock().prefs.clone()
    }

    /// Drain pending notices, oldest first.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.lock().notices)
    }

    /// Apply an external entitlement change (subscription activated or
    /// lapsed).
    pub fn set_entitlement(&self, entitled: bool) {
        self.lock().quota.set_entitlement(entitled);
        self.persist_quota();
        tracing::info!(identity = %self.identity, entitled, "entitlement updated");
    }

    // -------------------------------------------------------------------------
    // persistence
    // -------------------------------------------------------------------------

    fn load_local(&self) -> Option<LocalConversation> {
        load_json::<Vec<LocalConversation>>(self.storage.as_ref(), HISTORY_KEY)?
            .into_iter()
            .find(|c| c.owner_id == self.identity)
    }

    fn persist_history(&self) {
        let snapshot = {
            let inner = self.lock();
            LocalConversation {
                owner_id: self.identity.clone(),
                session_id: inner.session_id.clone(),
                messages: inner.messages.clone(),
                updated_at: OffsetDateTime::now_utc(),
            }
        };
        let mut all: Vec<LocalConversation> = load_json(self.storage.as_ref(), HISTORY_KEY).unwrap_or_default();
        all.retain(|c| c.owner_id != self.identity);
        all.push(snapshot);
        if let Err(e) = save_json(self.storage.as_ref(), HISTORY_KEY, &all) {
            tracing::warn!(identity = %self.identity, error = %e, "chat history not saved");
        }
    }

    fn persist_quota(&self) {
        let stored = {
            let inner = self.lock();
            StoredQuota { period: inner.quota_period.clone(), state: inner.quota }
        };
        let mut all: HashMap<String, StoredQuota> = load_json(self.storage.as_ref(), QUOTA_KEY).unwrap_or_default();
        all.insert(self.identity.clone(), stored);
        if let Err(e) = save_json(self.storage.as_ref(), QUOTA_KEY, &all) {
            tracing::warn!(identity = %self.identity, error = %e, "quota state not saved");
        }
    }
}

fn limit_reached_notice() -> Notice {
    Notice::new(
        NoticeLevel::Warning,
        "Message limit reached",
        "You've reached the maximum messages for the free plan. Upgrade to Premium for unlimited messages.",
    )
    .with_upgrade()
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
