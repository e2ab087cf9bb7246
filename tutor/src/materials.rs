//! Lesson materials: the record shape and bulk-upload validation.
//!
//! Validation is all-or-nothing. The batch size is checked first; then every
//! item is checked and every problem reported, so an author can fix a file in
//! one pass. Nothing is written unless the whole batch is valid.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prefs::{ProficiencyLevel, Week};

pub const MAX_BATCH_ITEMS: usize = 1000;

const REQUIRED_FIELDS: [&str; 4] = ["id", "hebrew_input", "arabic_response", "pronunciation"];

/// One phrase of lesson material. Ids follow `<level>_week_<NN>_<suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialItem {
    pub id: String,
    pub hebrew_input: String,
    pub arabic_response: String,
    pub pronunciation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid JSON file: {0}")]
    Json(String),
    #[error("Invalid JSON format: Expected an array of items")]
    NotAnArray,
    #[error("Too many items (maximum {max} allowed)", max = MAX_BATCH_ITEMS)]
    TooManyItems { count: usize },
    #[error("{} validation error(s): {}", .0.len(), .0.join("; "))]
    Invalid(Vec<String>),
}

impl ValidationError {
    /// Individual problems, one per line of a report.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Invalid(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Validate a decoded upload.
///
/// # Errors
///
/// `NotAnArray` or `TooManyItems` for batch-level problems, otherwise
/// `Invalid` listing every missing or mistyped field of every item.
pub fn validate_materials(value: &Value) -> Result<Vec<MaterialItem>, ValidationError> {
    let items = value.as_array().ok_or(ValidationError::NotAnArray)?;
    if items.len() > MAX_BATCH_ITEMS {
        return Err(ValidationError::TooManyItems { count: items.len() });
    }

    let mut errors = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let n = i + 1;
        let Some(obj) = item.as_object() else {
            errors.push(format!("Item #{n}: Expected an object"));
            continue;
        };
        for field in REQUIRED_FIELDS {
            match obj.get(field) {
                None | Some(Value::Null) => errors.push(format!("Item #{n}: Missing '{field}' field")),
                Some(Value::String(s)) if s.is_empty() => errors.push(format!("Item #{n}: Missing '{field}' field")),
                Some(Value::String(_)) => {}
                Some(_) => errors.push(format!("Item #{n}: '{field}' must be a string")),
            }
        }
    }
    if !errors.is_empty() {
        return Err(ValidationError::Invalid(errors));
    }

    items
        .iter()
        .map(|item| serde_json::from_value(item.clone()).map_err(|e| ValidationError::Json(e.to_string())))
        .collect()
}

/// Decode and validate an upload file's text.
///
/// # Errors
///
/// `Json` if the text is not JSON, otherwise as [`validate_materials`].
pub fn parse_materials(raw: &str) -> Result<Vec<MaterialItem>, ValidationError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| ValidationError::Json(e.to_string()))?;
    validate_materials(&value)
}

/// Id prefix shared by all items of one lesson, e.g. `beginner_week_03`.
#[must_use]
pub fn lesson_key(level: ProficiencyLevel, week: Week) -> String {
    format!("{}_week_{}", level.as_str(), week.padded())
}

#[cfg(test)]
#[path = "materials_test.rs"]
mod tests;
