//! Material routes: admin bulk upload and per-lesson lookup.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{Value, json};
use tutor::materials::MaterialItem;

use crate::routes::auth::{AdminUser, AuthUser};
use crate::services::materials::{self, LessonParams, MaterialsError};
use crate::state::AppState;

pub(crate) fn materials_error_to_response(err: &MaterialsError) -> (StatusCode, Json<Value>) {
    match err {
        MaterialsError::Invalid(validation) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "errors": validation.messages() })))
        }
        MaterialsError::Store(e) => {
            tracing::error!(error = %e, "material upload failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "errors": ["storage failure"] })))
        }
    }
}

/// `POST /api/materials`: validate and store a batch of items.
pub async fn upload_materials(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let written = materials::upload(state.stores.materials.as_ref(), &body)
        .await
        .map_err(|e| materials_error_to_response(&e))?;
    tracing::info!(admin = %admin.email, written, "material batch stored");
    Ok(Json(json!({ "written": written })))
}

/// `GET /api/materials?level=&week=`: items for one lesson.
pub async fn lesson_materials(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<LessonParams>,
) -> Result<Json<Vec<MaterialItem>>, StatusCode> {
    materials::for_lesson(state.stores.materials.as_ref(), params)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "material lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[cfg(test)]
#[path = "materials_test.rs"]
mod tests;
