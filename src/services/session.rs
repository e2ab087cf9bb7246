//! Bearer session tokens.
//!
//! ARCHITECTURE
//! ============
//! A successful e-mail code exchange mints a random 32-byte token that the
//! client sends as `Authorization: Bearer <token>`. Tokens live for
//! [`SESSION_TTL_DAYS`]; expiry is checked at lookup time.

use std::fmt::Write;

use rand::Rng;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::store::{Account, AccountStore, StoreError};

pub const SESSION_TTL_DAYS: i64 = 30;

/// Lowercase hex, two digits per byte.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// 32 random bytes, hex encoded.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex_encode(&bytes)
}

/// Mint a token for `account_id` valid for [`SESSION_TTL_DAYS`].
pub async fn create_session(store: &dyn AccountStore, account_id: Uuid) -> Result<String, StoreError> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + Duration::days(SESSION_TTL_DAYS);
    store.insert_session(&token, account_id, expires_at).await?;
    Ok(token)
}

/// The account behind `token`, or `None` for unknown, empty or expired tokens.
pub async fn validate_session(store: &dyn AccountStore, token: &str) -> Result<Option<Account>, StoreError> {
    if token.is_empty() {
        return Ok(None);
    }
    store.account_for_session(token, OffsetDateTime::now_utc()).await
}

pub async fn delete_session(store: &dyn AccountStore, token: &str) -> Result<(), StoreError> {
    store.delete_session(token).await
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
