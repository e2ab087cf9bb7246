//! Subscription service: checkout, payment activation, cancel, expiry.
//!
//! ARCHITECTURE
//! ============
//! Checkout only records a pending `trial` subscription and hands back the
//! hosted payment page URL. The payment provider then calls the webhook,
//! which is the single place a subscription becomes `active`. Clients learn
//! about activation by polling the verify endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use tracing::info;
use tutor::subscription::{
    BillingCycle, CheckoutRequest, CheckoutResponse, Plan, Subscription, SubscriptionStatus, SubscriptionView,
    TransitionError, plan_price,
};

use crate::services::email_auth::{name_from_email, normalize_email};
use crate::services::usage;
use crate::state::AppState;
use crate::store::{Account, Payment, StoreError};

/// Payments at or above this sum are treated as yearly when the provider
/// does not say so explicitly.
pub const YEARLY_SUM_THRESHOLD: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("the basic plan is free and needs no checkout")]
    FreePlan,
    #[error("an active subscription already exists")]
    AlreadyActive,
    #[error("no subscription found")]
    NotFound,
    #[error("payer email is missing or invalid")]
    MissingPayerEmail,
    #[error("payment page url is invalid: {0}")]
    PaymentUrl(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// CLIENT-FACING
// =============================================================================

pub async fn status(state: &AppState, account: &Account) -> Result<SubscriptionView, StoreError> {
    let subscription = state.stores.subscriptions.get(account.id).await?;
    let now = OffsetDateTime::now_utc();
    let entitled = usage::is_premium(state, account.id, &usage::month_key(now), now).await?;
    Ok(SubscriptionView { subscription, entitled })
}

/// Hosted payment page URL carrying the purchase details.
///
/// # Errors
///
/// Returns an error when the configured base URL does not parse.
pub fn checkout_url(
    base: &str,
    email: &str,
    plan: Plan,
    cycle: BillingCycle,
) -> Result<String, SubscriptionError> {
    let amount = plan_price(plan, cycle).to_string();
    let url = reqwest::Url::parse_with_params(
        base,
        &[
            ("email", email),
            ("plan", plan.as_str()),
            ("billingCycle", cycle.as_str()),
            ("amount", amount.as_str()),
        ],
    )
    .map_err(|e| SubscriptionError::PaymentUrl(e.to_string()))?;
    Ok(url.into())
}

pub async fn checkout(
    state: &AppState,
    account: &Account,
    request: CheckoutRequest,
) -> Result<CheckoutResponse, SubscriptionError> {
    if request.plan == Plan::Basic {
        return Err(SubscriptionError::FreePlan);
    }
    let now = OffsetDateTime::now_utc();
    if let Some(existing) = state.stores.subscriptions.get(account.id).await? {
        if existing.is_entitled(now) {
            return Err(SubscriptionError::AlreadyActive);
        }
    }

    let url = checkout_url(&state.config.payment_page_url, &account.email, request.plan, request.billing_cycle)?;
    let pending = Subscription::pending(account.id, &account.email, request.plan, request.billing_cycle, now);
    state.stores.subscriptions.put(&pending).await?;
    info!(account_id = %account.id, plan = %request.plan.as_str(), cycle = %request.billing_cycle.as_str(), "checkout created");
    Ok(CheckoutResponse { url })
}

pub async fn cancel(state: &AppState, account: &Account) -> Result<Subscription, SubscriptionError> {
    let mut subscription = state
        .stores
        .subscriptions
        .get(account.id)
        .await?
        .ok_or(SubscriptionError::NotFound)?;
    subscription.transition(SubscriptionStatus::Cancelled, OffsetDateTime::now_utc())?;
    state.stores.subscriptions.put(&subscription).await?;
    info!(account_id = %account.id, "subscription cancelled");
    Ok(subscription)
}

// =============================================================================
// PAYMENT WEBHOOK
// =============================================================================

/// The subset of the payment provider's webhook body the service reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhook {
    #[serde(default)]
    pub webhook_key: Option<String>,
    #[serde(default)]
    pub transaction_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_sum")]
    pub payment_sum: f64,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub payer_email: Option<String>,
}

/// The provider sends sums as numbers or numeric strings.
fn lenient_sum<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

impl PaymentWebhook {
    #[must_use]
    pub fn billing_cycle(&self) -> BillingCycle {
        if self.payment_type.as_deref() == Some("yearly") || self.payment_sum >= YEARLY_SUM_THRESHOLD {
            BillingCycle::Yearly
        } else {
            BillingCycle::Monthly
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    pub success: bool,
    pub user_id: uuid::Uuid,
    /// `true` when the transaction had already been applied.
    pub duplicate: bool,
}

/// Shared-key check for webhook calls. No configured key accepts anything.
#[must_use]
pub fn webhook_key_matches(expected: Option<&str>, provided: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => provided.is_some_and(|p| p == expected),
    }
}

/// Amount in minor currency units.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn minor_units(sum: f64) -> i64 {
    (sum * 100.0).round() as i64
}

pub async fn apply_payment(state: &AppState, payload: PaymentWebhook) -> Result<WebhookOutcome, SubscriptionError> {
    let email = payload
        .payer_email
        .as_deref()
        .and_then(normalize_email)
        .ok_or(SubscriptionError::MissingPayerEmail)?;
    let account = state
        .stores
        .accounts
        .upsert_account(&email, &name_from_email(&email))
        .await?;

    let now = OffsetDateTime::now_utc();
    let transaction_id = payload
        .transaction_code
        .clone()
        .unwrap_or_else(|| format!("unknown-{}", uuid::Uuid::new_v4()));
    if state.stores.subscriptions.payment(&transaction_id).await?.is_some() {
        info!(%transaction_id, "payment already applied");
        return Ok(WebhookOutcome { success: true, user_id: account.id, duplicate: true });
    }

    state
        .stores
        .usage
        .set_premium(account.id, &usage::month_key(now), true)
        .await?;

    state
        .stores
        .subscriptions
        .record_payment(&Payment {
            transaction_id: transaction_id.clone(),
            owner_id: account.id,
            owner_email: email.clone(),
            amount: minor_units(payload.payment_sum),
            plan: Plan::Premium,
            status: "completed".to_owned(),
            created_at: now,
        })
        .await?;

    let cycle = payload.billing_cycle();
    let mut subscription = Subscription::pending(account.id, &email, Plan::Premium, cycle, now);
    subscription.transition(SubscriptionStatus::Active, now)?;
    subscription.transaction_id = Some(transaction_id.clone());
    state.stores.subscriptions.put(&subscription).await?;

    info!(
        account_id = %account.id,
        %transaction_id,
        cycle = %cycle.as_str(),
        end_date = %subscription.end_date,
        "subscription activated"
    );
    Ok(WebhookOutcome { success: true, user_id: account.id, duplicate: false })
}

// =============================================================================
// EXPIRY
// =============================================================================

/// Move every lapsed `trial`/`active` subscription to `expired`.
pub async fn expire_due(state: &AppState, now: OffsetDateTime) -> Result<usize, StoreError> {
    let due = state.stores.subscriptions.due_for_expiry(now).await?;
    let mut expired = 0;
    for mut subscription in due {
        if subscription
            .transition(SubscriptionStatus::Expired, now)
            .is_ok()
        {
            state.stores.subscriptions.put(&subscription).await?;
            expired += 1;
        }
    }
    Ok(expired)
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
