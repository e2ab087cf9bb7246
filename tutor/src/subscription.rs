//! Subscriptions: lifecycle rules shared by the backend and clients, plus the
//! client side of checkout and payment verification.
//!
//! LIFECYCLE
//! =========
//! ```text
//! trial ──payment──▶ active ──user──▶ cancelled
//!   │                  │
//!   └──end passed──▶ expired ◀──end passed
//! ```
//! A checkout writes a `trial` record; only the payment webhook moves it to
//! `active`. A `trial` record does not grant premium.
//!
//! Payment confirmation arrives out of band, so clients poll
//! `GET /api/subscription/verify` with [`poll_until_active`] until the
//! webhook has landed, the attempts run out, or the caller cancels.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::gateway::GatewayError;
use crate::prefs::ParseChoiceError;

pub const MONTHLY_PERIOD_DAYS: i64 = 30;
pub const YEARLY_PERIOD_DAYS: i64 = 365;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Basic,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Self::Trial),
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            _ => Err(ParseChoiceError { field: "status", value: s.to_owned() }),
        }
    }
}

impl FromStr for Plan {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            _ => Err(ParseChoiceError { field: "plan", value: s.to_owned() }),
        }
    }
}

impl FromStr for BillingCycle {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(ParseChoiceError { field: "billingCycle", value: s.to_owned() }),
        }
    }
}

impl Plan {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Premium => "premium",
        }
    }
}

impl BillingCycle {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// Price in whole currency units.
#[must_use]
pub fn plan_price(plan: Plan, cycle: BillingCycle) -> u32 {
    match (plan, cycle) {
        (Plan::Basic, _) => 0,
        (Plan::Premium, BillingCycle::Monthly) => 30,
        (Plan::Premium, BillingCycle::Yearly) => 288,
    }
}

/// End of a billing period starting at `start`.
#[must_use]
pub fn period_end(cycle: BillingCycle, start: OffsetDateTime) -> OffsetDateTime {
    let days = match cycle {
        BillingCycle::Monthly => MONTHLY_PERIOD_DAYS,
        BillingCycle::Yearly => YEARLY_PERIOD_DAYS,
    };
    start + time::Duration::days(days)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("subscription cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: SubscriptionStatus,
    pub to: SubscriptionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub owner_id: Uuid,
    pub owner_email: String,
    pub plan: Plan,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    pub auto_renew: bool,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Subscription {
    /// A checkout awaiting payment confirmation.
    #[must_use]
    pub fn pending(owner_id: Uuid, owner_email: &str, plan: Plan, cycle: BillingCycle, now: OffsetDateTime) -> Self {
        Self {
            owner_id,
            owner_email: owner_email.to_owned(),
            plan,
            billing_cycle: cycle,
            status: SubscriptionStatus::Trial,
            start_date: now,
            end_date: period_end(cycle, now),
            auto_renew: true,
            transaction_id: None,
            updated_at: now,
        }
    }

    /// Move to `target`, stamping `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error for any move not on the lifecycle diagram.
    pub fn transition(&mut self, target: SubscriptionStatus, now: OffsetDateTime) -> Result<(), TransitionError> {
        use SubscriptionStatus::{Active, Cancelled, Expired, Trial};
        let allowed = matches!(
            (self.status, target),
            (Trial, Active) | (Active, Cancelled) | (Active, Expired) | (Trial, Expired)
        );
        if !allowed {
            return Err(TransitionError { from: self.status, to: target });
        }
        if target == Cancelled {
            self.auto_renew = false;
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// Premium is granted only by an active, unexpired premium record.
    #[must_use]
    pub fn is_entitled(&self, now: OffsetDateTime) -> bool {
        self.plan == Plan::Premium && self.status == SubscriptionStatus::Active && self.end_date > now
    }

    /// Trial or active records whose period has ended.
    #[must_use]
    pub fn is_due_for_expiry(&self, now: OffsetDateTime) -> bool {
        matches!(self.status, SubscriptionStatus::Trial | SubscriptionStatus::Active) && self.end_date <= now
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub subscription: Option<Subscription>,
    pub entitled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub plan: Plan,
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub active: bool,
}

#[derive(Clone)]
pub struct SubscriptionClient {
    api: ApiClient,
}

impl SubscriptionClient {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// Any [`GatewayError`] from the backend call.
    pub async fn status(&self) -> Result<SubscriptionView, GatewayError> {
        self.api.get_json("/api/subscription").await
    }

    /// Start a checkout and return the hosted payment page URL.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`] from the backend call.
    pub async fn checkout(&self, plan: Plan, billing_cycle: BillingCycle) -> Result<String, GatewayError> {
        let response: CheckoutResponse = self
            .api
            .post_json("/api/subscription/checkout", &CheckoutRequest { plan, billing_cycle })
            .await?;
        Ok(response.url)
    }

    /// # Errors
    ///
    /// Any [`GatewayError`] from the backend call.
    pub async fn cancel(&self) -> Result<Subscription, GatewayError> {
        self.api
            .post_json("/api/subscription/cancel", &serde_json::json!({}))
            .await
    }
}

/// Something that can report whether premium is active yet.
#[async_trait]
pub trait EntitlementCheck: Send + Sync {
    async fn is_active(&self) -> Result<bool, GatewayError>;
}

#[async_trait]
impl EntitlementCheck for SubscriptionClient {
    async fn is_active(&self) -> Result<bool, GatewayError> {
        let response: VerifyResponse = self.api.get_json("/api/subscription/verify").await?;
        Ok(response.active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Activated,
    TimedOut,
    Cancelled,
}

/// Poll `check` every `interval` until it reports active, `max_attempts`
/// checks have been made, or `cancel` fires. Check errors are logged and
/// count as an attempt.
pub async fn poll_until_active(
    check: &dyn EntitlementCheck,
    interval: Duration,
    max_attempts: u32,
    cancel: CancellationToken,
) -> PollOutcome {
    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        match check.is_active().await {
            Ok(true) => {
                tracing::info!(attempt, "subscription active");
                return PollOutcome::Activated;
            }
            Ok(false) => tracing::debug!(attempt, "subscription not active yet"),
            Err(e) => tracing::warn!(attempt, error = %e, "subscription check failed"),
        }
        if attempt == max_attempts {
            break;
        }
        tokio::select! {
            () = cancel.cancelled() => return PollOutcome::Cancelled,
            () = tokio::time::sleep(interval) => {}
        }
    }
    PollOutcome::TimedOut
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
