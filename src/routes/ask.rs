//! Ask route: one tutoring turn per request.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use tutor::{AskRequest, AskResponse};

use crate::routes::auth::AuthUser;
use crate::services::ask::{self, AskError};
use crate::state::AppState;

pub(crate) fn ask_error_to_status(err: &AskError) -> StatusCode {
    match err {
        AskError::EmptyQuestion => StatusCode::BAD_REQUEST,
        AskError::QuotaExceeded => StatusCode::FORBIDDEN,
        AskError::LlmUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        AskError::Llm(_) => StatusCode::BAD_GATEWAY,
        AskError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /api/ask`: answer a learner question in their conversation.
pub async fn ask(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, Json<serde_json::Value>)> {
    ask::ask(&state, &auth.account, request)
        .await
        .map(Json)
        .map_err(|e| {
            let status = ask_error_to_status(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, account_id = %auth.account.id, "ask failed");
            }
            (status, Json(serde_json::json!({ "error": e.to_string() })))
        })
}

#[cfg(test)]
#[path = "ask_test.rs"]
mod tests;
