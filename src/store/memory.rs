//! In-memory store used by tests and by database-less runs.

use std::collections::{BTreeMap, HashMap};

use time::OffsetDateTime;
use tokio::sync::RwLock;
use tutor::Conversation;
use tutor::materials::MaterialItem;
use tutor::subscription::Subscription;
use uuid::Uuid;

use super::{
    Account, AccountStore, ChatLogFilter, ChatLogPage, ChatLogStore, MaterialStore, Payment, StoreError,
    SubscriptionStore, Usage, UsageStore, total_pages,
};

#[derive(Debug, Clone)]
struct LoginCode {
    code_hash: String,
    attempts: u32,
    expires_at: OffsetDateTime,
    consumed: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<HashMap<String, (Uuid, OffsetDateTime)>>,
    login_codes: RwLock<HashMap<String, Vec<LoginCode>>>,
    chat_logs: RwLock<HashMap<String, Conversation>>,
    materials: RwLock<BTreeMap<String, MaterialItem>>,
    subscriptions: RwLock<HashMap<Uuid, Subscription>>,
    payments: RwLock<Vec<Payment>>,
    usage: RwLock<HashMap<(Uuid, String), Usage>>,
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[async_trait::async_trait]
impl AccountStore for MemoryStore {
    async fn upsert_account(&self, email: &str, name: &str) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(email.to_owned()).or_insert_with(|| Account {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            name: name.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(account.clone())
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(email).cloned())
    }

    async fn insert_session(&self, token: &str, account_id: Uuid, expires_at: OffsetDateTime) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(token.to_owned(), (account_id, expires_at));
        Ok(())
    }

    async fn account_for_session(&self, token: &str, now: OffsetDateTime) -> Result<Option<Account>, StoreError> {
        let Some((account_id, expires_at)) = self.sessions.read().await.get(token).copied() else {
            return Ok(None);
        };
        if expires_at <= now {
            return Ok(None);
        }
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.id == account_id).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn replace_login_code(
        &self,
        email: &str,
        code_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut codes = self.login_codes.write().await;
        let entry = codes.entry(email.to_owned()).or_default();
        entry.retain(|c| c.consumed);
        entry.push(LoginCode { code_hash: code_hash.to_owned(), attempts: 0, expires_at, consumed: false });
        Ok(())
    }

    async fn check_login_code(
        &self,
        email: &str,
        code_hash: &str,
        now: OffsetDateTime,
        max_attempts: u32,
    ) -> Result<bool, StoreError> {
        let mut codes = self.login_codes.write().await;
        let Some(live) = codes
            .get_mut(email)
            .and_then(|list| list.iter_mut().rev().find(|c| !c.consumed && c.expires_at > now))
        else {
            return Ok(false);
        };
        if live.code_hash == code_hash {
            live.consumed = true;
            return Ok(true);
        }
        live.attempts += 1;
        if live.attempts >= max_attempts {
            live.consumed = true;
        }
        Ok(false)
    }
}

// =============================================================================
// CHAT LOGS
// =============================================================================

/// Apply a listing filter to a set of conversations: newest first, then
/// paginated.
#[must_use]
pub fn filter_chat_logs<'a>(logs: impl IntoIterator<Item = &'a Conversation>, filter: &ChatLogFilter) -> ChatLogPage {
    let lowered = |v: Option<&str>| {
        v.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    };
    let needle = lowered(filter.search_term.as_deref());
    let owner = lowered(filter.owner_id.as_deref());
    let email = lowered(filter.owner_email.as_deref());
    let contains = |field: &str, part: &str| field.to_lowercase().contains(part);

    let mut matching: Vec<&Conversation> = logs
        .into_iter()
        .filter(|c| owner.as_deref().map_or(true, |part| contains(&c.owner_id, part)))
        .filter(|c| email.as_deref().map_or(true, |part| contains(&c.owner_email, part)))
        .filter(|c| filter.created_from.map_or(true, |from| c.created_at >= from))
        .filter(|c| filter.created_to.map_or(true, |to| c.created_at <= to))
        .filter(|c| {
            needle.as_deref().map_or(true, |needle| {
                [&c.owner_name, &c.owner_email, &c.owner_id, &c.session_id]
                    .iter()
                    .any(|field| contains(field, needle))
            })
        })
        .collect();

    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.session_id.cmp(&b.session_id)));

    let total = matching.len();
    let chats = matching
        .into_iter()
        .skip(filter.offset())
        .take(filter.page_size as usize)
        .cloned()
        .collect();
    ChatLogPage { chats, total_pages: total_pages(total, filter.page_size) }
}

#[async_trait::async_trait]
impl ChatLogStore for MemoryStore {
    async fn get(&self, session_id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.chat_logs.read().await.get(session_id).cloned())
    }

    async fn upsert(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.chat_logs
            .write()
            .await
            .insert(conversation.session_id.clone(), conversation.clone());
        Ok(())
    }

    async fn list(&self, filter: &ChatLogFilter) -> Result<ChatLogPage, StoreError> {
        let logs = self.chat_logs.read().await;
        Ok(filter_chat_logs(logs.values(), filter))
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.chat_logs.write().await.remove(session_id).is_some())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut logs = self.chat_logs.write().await;
        let removed = logs.len() as u64;
        logs.clear();
        Ok(removed)
    }
}

// =============================================================================
// MATERIALS
// =============================================================================

#[async_trait::async_trait]
impl MaterialStore for MemoryStore {
    async fn upsert_many(&self, items: &[MaterialItem]) -> Result<usize, StoreError> {
        let mut materials = self.materials.write().await;
        for item in items {
            materials.insert(item.id.clone(), item.clone());
        }
        Ok(items.len())
    }

    async fn by_prefix(&self, prefix: &str) -> Result<Vec<MaterialItem>, StoreError> {
        let materials = self.materials.read().await;
        Ok(materials
            .range(prefix.to_owned()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[async_trait::async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get(&self, owner_id: Uuid) -> Result<Option<Subscription>, StoreError> {
        Ok(self.subscriptions.read().await.get(&owner_id).cloned())
    }

    async fn put(&self, subscription: &Subscription) -> Result<(), StoreError> {
        self.subscriptions
            .write()
            .await
            .insert(subscription.owner_id, subscription.clone());
        Ok(())
    }

    async fn due_for_expiry(&self, now: OffsetDateTime) -> Result<Vec<Subscription>, StoreError> {
        let subs = self.subscriptions.read().await;
        Ok(subs
            .values()
            .filter(|s| s.is_due_for_expiry(now))
            .cloned()
            .collect())
    }

    async fn record_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut payments = self.payments.write().await;
        payments.retain(|p| p.transaction_id != payment.transaction_id);
        payments.push(payment.clone());
        Ok(())
    }

    async fn payment(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError> {
        let payments = self.payments.read().await;
        Ok(payments
            .iter()
            .find(|p| p.transaction_id == transaction_id)
            .cloned())
    }
}

// =============================================================================
// USAGE
// =============================================================================

#[async_trait::async_trait]
impl UsageStore for MemoryStore {
    async fn get(&self, owner_id: Uuid, month: &str) -> Result<Usage, StoreError> {
        let usage = self.usage.read().await;
        Ok(usage
            .get(&(owner_id, month.to_owned()))
            .cloned()
            .unwrap_or_else(|| Usage::empty(owner_id, month)))
    }

    async fn increment(&self, owner_id: Uuid, month: &str) -> Result<u32, StoreError> {
        let mut usage = self.usage.write().await;
        let entry = usage
            .entry((owner_id, month.to_owned()))
            .or_insert_with(|| Usage::empty(owner_id, month));
        entry.message_count += 1;
        Ok(entry.message_count)
    }

    async fn set_premium(&self, owner_id: Uuid, month: &str, premium: bool) -> Result<(), StoreError> {
        let mut usage = self.usage.write().await;
        usage
            .entry((owner_id, month.to_owned()))
            .or_insert_with(|| Usage::empty(owner_id, month))
            .premium = premium;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
