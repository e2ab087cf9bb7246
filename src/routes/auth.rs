//! Auth routes: e-mail access codes, bearer sessions, request extractors.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::services::email_auth::{self, EmailAuthError};
use crate::services::session;
use crate::state::AppState;
use crate::store::Account;

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub(crate) fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated account extracted from the bearer token.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub account: Account,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(StatusCode::UNAUTHORIZED)?
            .to_owned();

        let app_state = AppState::from_ref(state);
        let account = session::validate_session(app_state.stores.accounts.as_ref(), &token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "session lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { account, token })
    }
}

/// Authenticated account whose e-mail is on the admin list.
pub struct AdminUser(pub Account);

impl<S> axum::extract::FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let app_state = AppState::from_ref(state);
        if !app_state.config.is_admin(&auth.account.email) {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(Self(auth.account))
    }
}

pub(crate) fn email_auth_error_to_status(err: &EmailAuthError) -> StatusCode {
    match err {
        EmailAuthError::InvalidEmail | EmailAuthError::InvalidCode => StatusCode::BAD_REQUEST,
        EmailAuthError::VerificationFailed => StatusCode::UNAUTHORIZED,
        EmailAuthError::EmailDelivery(_) => StatusCode::BAD_GATEWAY,
        EmailAuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RequestCodeBody {
    email: String,
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    email: String,
    code: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Account,
}

/// `POST /api/auth/email/request-code`: issue a code and mail it.
pub async fn request_email_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<StatusCode, StatusCode> {
    let code = email_auth::request_access_code(state.stores.accounts.as_ref(), &body.email)
        .await
        .map_err(|e| email_auth_error_to_status(&e))?;

    match &state.config.resend_api_key {
        Some(key) => {
            email_auth::send_access_code_email(key, &state.config.resend_from, body.email.trim(), &code)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "access code delivery failed");
                    email_auth_error_to_status(&e)
                })?;
        }
        None => {
            tracing::warn!(email = %body.email.trim(), "RESEND_API_KEY not set; access code not sent");
            tracing::debug!(email = %body.email.trim(), %code, "access code");
        }
    }
    Ok(StatusCode::ACCEPTED)
}

/// `POST /api/auth/email/verify-code`: exchange a code for a session token.
pub async fn verify_email_code(
    State(state): State<AppState>,
    Json(body): Json<VerifyCodeBody>,
) -> Result<Json<LoginResponse>, StatusCode> {
    let account = email_auth::verify_access_code(state.stores.accounts.as_ref(), &body.email, &body.code)
        .await
        .map_err(|e| email_auth_error_to_status(&e))?;
    let token = session::create_session(state.stores.accounts.as_ref(), account.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    tracing::info!(account_id = %account.id, "signed in");
    Ok(Json(LoginResponse { token, user: account }))
}

/// `GET /api/auth/me`: return current account.
pub async fn me(auth: AuthUser) -> Json<Account> {
    Json(auth.account)
}

/// `POST /api/auth/logout`: delete the session.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(state.stores.accounts.as_ref(), &auth.token).await {
        tracing::warn!(error = %e, "session delete failed");
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
