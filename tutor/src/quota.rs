//! Free-tier quota gate.
//!
//! The backend is the only enforcer of the monthly allowance. This mirror
//! exists so the client can refuse a send it knows would be rejected and show
//! a remaining-messages hint; every server-reported counter overwrites it.
//!
//! The allowance is per calendar month (UTC), the same bucket the backend
//! counts in. A mirror stamped with an earlier month carries no information
//! about the current one and is reset before use.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const MAX_MESSAGES: u32 = 50;

/// Remaining allowance at or below which the learner is warned.
pub const WARNING_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaState {
    pub message_count: u32,
    pub max_messages: u32,
    pub is_premium_entitled: bool,
    #[serde(default)]
    pub remaining_messages: Option<u32>,
}

impl Default for QuotaState {
    fn default() -> Self {
        Self { message_count: 0, max_messages: MAX_MESSAGES, is_premium_entitled: false, remaining_messages: None }
    }
}

/// `YYYY-MM` bucket for `now`.
#[must_use]
pub fn month_key(now: OffsetDateTime) -> String {
    format!("{:04}-{:02}", now.year(), u8::from(now.month()))
}

impl QuotaState {
    #[must_use]
    pub fn with_count(message_count: u32) -> Self {
        Self { message_count, ..Self::default() }
    }

    /// True iff entitled or still under the allowance.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.is_premium_entitled || self.message_count < self.max_messages
    }

    /// Count one exchange. Entitled users are not counted.
    pub fn record_sent(&mut self) {
        if self.is_premium_entitled {
            return;
        }
        self.message_count = self.message_count.saturating_add(1);
        self.remaining_messages = Some(self.max_messages.saturating_sub(self.message_count));
    }

    /// Overwrite the local estimate with counters reported by the backend.
    pub fn apply_server_signal(&mut self, remaining: Option<u32>, limit_reached: bool) {
        if let Some(remaining) = remaining {
            let remaining = remaining.min(self.max_messages);
            self.remaining_messages = Some(remaining);
            self.message_count = self.max_messages - remaining;
        }
        if limit_reached && !self.is_premium_entitled {
            self.message_count = self.max_messages;
            self.remaining_messages = Some(0);
        }
    }

    /// Forget the count for a new period. Entitlement is kept.
    pub fn reset_period(&mut self) {
        *self = Self { is_premium_entitled: self.is_premium_entitled, ..Self::default() };
    }

    /// External entitlement change, e.g. a confirmed subscription.
    pub fn set_entitlement(&mut self, entitled: bool) {
        self.is_premium_entitled = entitled;
        if entitled {
            self.remaining_messages = None;
        }
    }

    /// Messages left this period; `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        if self.is_premium_entitled {
            return None;
        }
        Some(
            self.remaining_messages
                .unwrap_or_else(|| self.max_messages.saturating_sub(self.message_count)),
        )
    }

    /// True when the learner should see a "limit approaching" hint.
    #[must_use]
    pub fn is_near_limit(&self) -> bool {
        matches!(self.remaining(), Some(r) if r > 0 && r <= WARNING_THRESHOLD)
    }
}

#[cfg(test)]
#[path = "quota_test.rs"]
mod tests;
