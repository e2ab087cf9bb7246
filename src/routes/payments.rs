//! Payment provider webhook.
//!
//! The provider authenticates with a shared key, sent either as the
//! `x-webhook-key` header, a `key` query parameter, or a `webhookKey` body
//! field. With no key configured every call is accepted.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::routes::subscription::subscription_error_response;
use crate::services::subscription::{self as subscription_svc, PaymentWebhook, SubscriptionError, WebhookOutcome};
use crate::state::AppState;

pub const WEBHOOK_KEY_HEADER: &str = "x-webhook-key";

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    key: Option<String>,
}

pub(crate) fn provided_key<'a>(headers: &'a HeaderMap, query: &'a WebhookQuery, body: &'a PaymentWebhook) -> Option<&'a str> {
    headers
        .get(WEBHOOK_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(query.key.as_deref())
        .or(body.webhook_key.as_deref())
}

/// `POST /api/payments/webhook`: activate premium for a completed payment.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WebhookQuery>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<WebhookOutcome>, (StatusCode, Json<Value>)> {
    let provided = provided_key(&headers, &query, &payload);
    if !subscription_svc::webhook_key_matches(state.config.webhook_key.as_deref(), provided) {
        tracing::warn!("payment webhook rejected: bad key");
        return Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid webhook key" }))));
    }

    match subscription_svc::apply_payment(&state, payload).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(SubscriptionError::MissingPayerEmail) => {
            Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "No payer email provided" }))))
        }
        Err(e) => Err(subscription_error_response(&e)),
    }
}

#[cfg(test)]
#[path = "payments_test.rs"]
mod tests;
