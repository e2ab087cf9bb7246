//! Chat log routes. Listing and bulk delete are admin-only; a single log is
//! readable and deletable by its owner as well.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{Value, json};
use tutor::Conversation;

use crate::routes::auth::{AdminUser, AuthUser};
use crate::services::chatlog::{self, ChatLogError, ChatLogParams};
use crate::state::AppState;
use crate::store::{ChatLogPage, StoreError};

pub(crate) fn chatlog_error_to_status(err: &ChatLogError) -> StatusCode {
    match err {
        ChatLogError::InvalidDate(_) => StatusCode::BAD_REQUEST,
        ChatLogError::NotFound => StatusCode::NOT_FOUND,
        ChatLogError::Forbidden => StatusCode::FORBIDDEN,
    }
}

fn store_failure(err: &StoreError) -> StatusCode {
    tracing::error!(error = %err, "chat log store failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

fn authorize(state: &AppState, auth: &AuthUser, session_id: &str) -> Result<(), StatusCode> {
    let is_admin = state.config.is_admin(&auth.account.email);
    chatlog::authorize_single(&auth.account, session_id, is_admin).map_err(|e| chatlog_error_to_status(&e))
}

/// `GET /api/chatlogs`: filtered, paginated listing.
pub async fn list_chat_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ChatLogParams>,
) -> Result<Json<ChatLogPage>, StatusCode> {
    let filter = params.into_filter().map_err(|e| chatlog_error_to_status(&e))?;
    let page = state
        .stores
        .chat_logs
        .list(&filter)
        .await
        .map_err(|e| store_failure(&e))?;
    Ok(Json(page))
}

/// `DELETE /api/chatlogs`: remove every stored conversation.
pub async fn delete_all_chat_logs(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Value>, StatusCode> {
    let deleted = state
        .stores
        .chat_logs
        .delete_all()
        .await
        .map_err(|e| store_failure(&e))?;
    tracing::info!(admin = %admin.email, deleted, "all chat logs deleted");
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

/// `GET /api/chatlogs/{session_id}`: one conversation.
pub async fn get_chat_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<Conversation>, StatusCode> {
    authorize(&state, &auth, &session_id)?;
    state
        .stores
        .chat_logs
        .get(&session_id)
        .await
        .map_err(|e| store_failure(&e))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// `DELETE /api/chatlogs/{session_id}`: remove one conversation.
pub async fn delete_chat_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    authorize(&state, &auth, &session_id)?;
    let removed = state
        .stores
        .chat_logs
        .delete(&session_id)
        .await
        .map_err(|e| store_failure(&e))?;
    if !removed {
        return Err(StatusCode::NOT_FOUND);
    }
    tracing::info!(%session_id, account_id = %auth.account.id, "chat log deleted");
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
#[path = "chatlogs_test.rs"]
mod tests;
