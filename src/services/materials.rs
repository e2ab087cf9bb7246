//! Lesson materials: validated bulk upload and lookup by lesson.

use serde::Deserialize;
use tracing::info;
use tutor::materials::{MaterialItem, ValidationError, lesson_key, validate_materials};
use tutor::{ProficiencyLevel, Week};

use crate::store::{MaterialStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum MaterialsError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Query string for `GET /api/materials`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LessonParams {
    #[serde(default)]
    pub level: ProficiencyLevel,
    #[serde(default)]
    pub week: Week,
}

/// Validate the whole batch and write it only if every item passes.
///
/// # Errors
///
/// Returns every validation problem at once, or a store failure.
pub async fn upload(store: &dyn MaterialStore, body: &serde_json::Value) -> Result<usize, MaterialsError> {
    let items = validate_materials(body)?;
    let written = store.upsert_many(&items).await?;
    info!(written, "materials uploaded");
    Ok(written)
}

pub async fn for_lesson(store: &dyn MaterialStore, params: LessonParams) -> Result<Vec<MaterialItem>, StoreError> {
    store.by_prefix(&lesson_key(params.level, params.week)).await
}

#[cfg(test)]
#[path = "materials_test.rs"]
mod tests;
