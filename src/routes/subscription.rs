//! Subscription routes: status, checkout, cancel, and the activation poll.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{Value, json};
use tutor::subscription::{CheckoutRequest, CheckoutResponse, Subscription, SubscriptionView, VerifyResponse};

use crate::routes::auth::AuthUser;
use crate::services::subscription::{self as subscription_svc, SubscriptionError};
use crate::services::usage;
use crate::state::AppState;

pub(crate) fn subscription_error_to_status(err: &SubscriptionError) -> StatusCode {
    match err {
        SubscriptionError::FreePlan | SubscriptionError::MissingPayerEmail => StatusCode::BAD_REQUEST,
        SubscriptionError::NotFound => StatusCode::NOT_FOUND,
        SubscriptionError::AlreadyActive | SubscriptionError::Transition(_) => StatusCode::CONFLICT,
        SubscriptionError::PaymentUrl(_) | SubscriptionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn subscription_error_response(err: &SubscriptionError) -> (StatusCode, Json<Value>) {
    let status = subscription_error_to_status(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "subscription request failed");
    }
    (status, Json(json!({ "error": err.to_string() })))
}

/// `GET /api/subscription`: current record plus entitlement.
pub async fn subscription_status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<SubscriptionView>, StatusCode> {
    subscription_svc::status(&state, &auth.account)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "subscription status failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// `POST /api/subscription/checkout`: start a purchase.
pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, (StatusCode, Json<Value>)> {
    subscription_svc::checkout(&state, &auth.account, request)
        .await
        .map(Json)
        .map_err(|e| subscription_error_response(&e))
}

/// `POST /api/subscription/cancel`: stop renewal of an active subscription.
pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Subscription>, (StatusCode, Json<Value>)> {
    subscription_svc::cancel(&state, &auth.account)
        .await
        .map(Json)
        .map_err(|e| subscription_error_response(&e))
}

/// `GET /api/subscription/verify`: polled by clients after checkout.
pub async fn verify(State(state): State<AppState>, auth: AuthUser) -> Result<Json<VerifyResponse>, StatusCode> {
    let now = time::OffsetDateTime::now_utc();
    let active = usage::is_premium(&state, auth.account.id, &usage::month_key(now), now)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "subscription verify failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(VerifyResponse { active }))
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
