//! Monthly usage accounting.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::AppState;
use crate::store::StoreError;

/// Usage bucket key for `at`, formatted `YYYY-MM` in UTC.
#[must_use]
pub fn month_key(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    format!("{:04}-{:02}", at.year(), u8::from(at.month()))
}

#[must_use]
pub fn current_month() -> String {
    month_key(OffsetDateTime::now_utc())
}

/// Entitlement for one account right now: either the month carries a premium
/// flag from a payment, or an active premium subscription covers `now`.
pub async fn is_premium(state: &AppState, owner_id: Uuid, month: &str, now: OffsetDateTime) -> Result<bool, StoreError> {
    if state.stores.usage.get(owner_id, month).await?.premium {
        return Ok(true);
    }
    Ok(state
        .stores
        .subscriptions
        .get(owner_id)
        .await?
        .is_some_and(|s| s.is_entitled(now)))
}

#[cfg(test)]
#[path = "usage_test.rs"]
mod tests;
