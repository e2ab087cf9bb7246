//! Persistence seams for the backend.
//!
//! ARCHITECTURE
//! ============
//! Services never touch SQL directly. Each concern has an object-safe async
//! trait, and [`Stores`] bundles one implementation of each into the shared
//! application state. Production wires [`postgres::PgStore`]; tests and
//! database-less runs wire [`memory::MemoryStore`].
//!
//! TRADE-OFFS
//! ==========
//! Chat log filtering is implemented twice (SQL and in-memory). The memory
//! version is the reference the route tests exercise; the SQL version is only
//! covered by the `live-db-tests` feature.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tutor::materials::MaterialItem;
use tutor::subscription::{Plan, Subscription};
use tutor::Conversation;
use uuid::Uuid;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Per-account message counter for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub owner_id: Uuid,
    pub month: String,
    pub message_count: u32,
    pub premium: bool,
}

impl Usage {
    #[must_use]
    pub fn empty(owner_id: Uuid, month: &str) -> Self {
        Self { owner_id, month: month.to_owned(), message_count: 0, premium: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub transaction_id: String,
    pub owner_id: Uuid,
    pub owner_email: String,
    pub amount: i64,
    pub plan: Plan,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Typed chat log listing filter. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLogFilter {
    pub page: u32,
    pub page_size: u32,
    /// Case-insensitive substring of owner name, e-mail, id or session id.
    pub search_term: Option<String>,
    /// Case-insensitive substring of the owner id.
    pub owner_id: Option<String>,
    /// Case-insensitive substring of the owner e-mail.
    pub owner_email: Option<String>,
    /// Inclusive bounds on `created_at`.
    pub created_from: Option<OffsetDateTime>,
    pub created_to: Option<OffsetDateTime>,
}

impl Default for ChatLogFilter {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            search_term: None,
            owner_id: None,
            owner_email: None,
            created_from: None,
            created_to: None,
        }
    }
}

impl ChatLogFilter {
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.page_size as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLogPage {
    pub chats: Vec<Conversation>,
    pub total_pages: u32,
}

#[must_use]
pub fn total_pages(total: usize, page_size: u32) -> u32 {
    let size = page_size.max(1) as usize;
    u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX)
}

// =============================================================================
// TRAITS
// =============================================================================

#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert the account if the e-mail is new; an existing name is kept.
    async fn upsert_account(&self, email: &str, name: &str) -> Result<Account, StoreError>;
    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    async fn insert_session(&self, token: &str, account_id: Uuid, expires_at: OffsetDateTime) -> Result<(), StoreError>;
    async fn account_for_session(&self, token: &str, now: OffsetDateTime) -> Result<Option<Account>, StoreError>;
    async fn delete_session(&self, token: &str) -> Result<(), StoreError>;
    /// Drop any unconsumed codes for `email` and store a new hash.
    async fn replace_login_code(&self, email: &str, code_hash: &str, expires_at: OffsetDateTime)
    -> Result<(), StoreError>;
    /// Consume the newest live code when the hash matches. A miss counts as a
    /// failed attempt and burns the code once `max_attempts` is reached.
    async fn check_login_code(
        &self,
        email: &str,
        code_hash: &str,
        now: OffsetDateTime,
        max_attempts: u32,
    ) -> Result<bool, StoreError>;
}

#[async_trait::async_trait]
pub trait ChatLogStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<Conversation>, StoreError>;
    async fn upsert(&self, conversation: &Conversation) -> Result<(), StoreError>;
    async fn list(&self, filter: &ChatLogFilter) -> Result<ChatLogPage, StoreError>;
    async fn delete(&self, session_id: &str) -> Result<bool, StoreError>;
    async fn delete_all(&self) -> Result<u64, StoreError>;
}

#[async_trait::async_trait]
pub trait MaterialStore: Send + Sync {
    async fn upsert_many(&self, items: &[MaterialItem]) -> Result<usize, StoreError>;
    /// Items whose id starts with `prefix`, ordered by id.
    async fn by_prefix(&self, prefix: &str) -> Result<Vec<MaterialItem>, StoreError>;
}

#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get(&self, owner_id: Uuid) -> Result<Option<Subscription>, StoreError>;
    async fn put(&self, subscription: &Subscription) -> Result<(), StoreError>;
    async fn due_for_expiry(&self, now: OffsetDateTime) -> Result<Vec<Subscription>, StoreError>;
    async fn record_payment(&self, payment: &Payment) -> Result<(), StoreError>;
    async fn payment(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError>;
}

#[async_trait::async_trait]
pub trait UsageStore: Send + Sync {
    async fn get(&self, owner_id: Uuid, month: &str) -> Result<Usage, StoreError>;
    /// Add one message and return the new count.
    async fn increment(&self, owner_id: Uuid, month: &str) -> Result<u32, StoreError>;
    async fn set_premium(&self, owner_id: Uuid, month: &str, premium: bool) -> Result<(), StoreError>;
}

// =============================================================================
// BUNDLE
// =============================================================================

#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub chat_logs: Arc<dyn ChatLogStore>,
    pub materials: Arc<dyn MaterialStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub usage: Arc<dyn UsageStore>,
}

impl Stores {
    /// All concerns backed by one shared in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            accounts: store.clone(),
            chat_logs: store.clone(),
            materials: store.clone(),
            subscriptions: store.clone(),
            usage: store,
        }
    }

    #[must_use]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self {
            accounts: store.clone(),
            chat_logs: store.clone(),
            materials: store.clone(),
            subscriptions: store.clone(),
            usage: store,
        }
    }
}
