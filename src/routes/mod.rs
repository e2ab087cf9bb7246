//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API under `/api` plus a `/healthz` probe. The
//! learner client and the CLI talk only to these routes; the payment
//! provider calls the webhook.

pub mod ask;
pub mod auth;
pub mod chatlogs;
pub mod materials;
pub mod payments;
pub mod subscription;

use axum::Router;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// CORS policy: any origin when none are configured, otherwise the list.
pub(crate) fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/api/auth/email/request-code", post(auth::request_email_code))
        .route("/api/auth/email/verify-code", post(auth::verify_email_code))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/ask", post(ask::ask))
        .route(
            "/api/chatlogs",
            get(chatlogs::list_chat_logs).delete(chatlogs::delete_all_chat_logs),
        )
        .route(
            "/api/chatlogs/{session_id}",
            get(chatlogs::get_chat_log).delete(chatlogs::delete_chat_log),
        )
        .route(
            "/api/materials",
            get(materials::lesson_materials).post(materials::upload_materials),
        )
        .route("/api/subscription", get(subscription::subscription_status))
        .route("/api/subscription/checkout", post(subscription::checkout))
        .route("/api/subscription/cancel", post(subscription::cancel))
        .route("/api/subscription/verify", get(subscription::verify))
        .route("/api/payments/webhook", post(payments::payment_webhook))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
