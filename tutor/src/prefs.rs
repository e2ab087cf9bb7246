//! Learner preferences and their local store.
//!
//! Preferences are a singleton per user: read once when a session starts and
//! overwritten wholesale on save. A storage failure never reaches the learner;
//! it is logged and the defaults are used instead.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::storage::{Storage, StorageError, load_json, save_json};

pub const PREFERENCES_KEY: &str = "userPreferences";
pub const MAX_WEEK: u8 = 11;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field} value: {value:?}")]
pub struct ParseChoiceError {
    pub field: &'static str,
    pub value: String,
}

impl ParseChoiceError {
    fn new(field: &'static str, value: &str) -> Self {
        Self { field, value: value.to_owned() }
    }
}

// =============================================================================
// CHOICES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProficiencyLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl ProficiencyLevel {
    pub const ALL: [Self; 4] = [Self::Beginner, Self::Intermediate, Self::Advanced, Self::Expert];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }
}

impl FromStr for ProficiencyLevel {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseChoiceError::new("level", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl FromStr for Gender {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            _ => Err(ParseChoiceError::new("gender", s)),
        }
    }
}

/// Which script the tutor answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LanguageMode {
    #[serde(rename = "arabic")]
    Arabic,
    #[default]
    #[serde(rename = "hebrew", alias = "transliteration-hebrew")]
    Hebrew,
    #[serde(rename = "transliteration-english", alias = "english")]
    EnglishTransliteration,
}

impl LanguageMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arabic => "arabic",
            Self::Hebrew => "hebrew",
            Self::EnglishTransliteration => "transliteration-english",
        }
    }

    /// Text direction of replies in this mode.
    #[must_use]
    pub fn direction(self) -> &'static str {
        match self {
            Self::Arabic | Self::Hebrew => "rtl",
            Self::EnglishTransliteration => "ltr",
        }
    }
}

impl FromStr for LanguageMode {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arabic" => Ok(Self::Arabic),
            "hebrew" | "transliteration-hebrew" => Ok(Self::Hebrew),
            "transliteration-english" | "english" => Ok(Self::EnglishTransliteration),
            _ => Err(ParseChoiceError::new("language", s)),
        }
    }
}

impl fmt::Display for LanguageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// WEEK
// =============================================================================

/// Course week, `week01` through `week11`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Week(u8);

impl Week {
    /// # Errors
    ///
    /// Returns an error if `n` is outside `1..=11`.
    pub fn new(n: u8) -> Result<Self, ParseChoiceError> {
        if (1..=MAX_WEEK).contains(&n) {
            Ok(Self(n))
        } else {
            Err(ParseChoiceError::new("week", &n.to_string()))
        }
    }

    #[must_use]
    pub fn number(self) -> u8 {
        self.0
    }

    /// Two-digit form used in lesson keys (`03`).
    #[must_use]
    pub fn padded(self) -> String {
        format!("{:02}", self.0)
    }
}

impl Default for Week {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "week{:02}", self.0)
    }
}

impl FromStr for Week {
    type Err = ParseChoiceError;

    /// Accepts `week03`, `03` and `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("week").unwrap_or(trimmed);
        let n = digits.parse::<u8>().map_err(|_| ParseChoiceError::new("week", s))?;
        Self::new(n).map_err(|_| ParseChoiceError::new("week", s))
    }
}

impl Serialize for Week {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Week {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// PREFERENCES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(rename = "level", default)]
    pub proficiency_level: ProficiencyLevel,
    #[serde(rename = "week", default)]
    pub week: Week,
    #[serde(rename = "gender", default)]
    pub gender: Gender,
    #[serde(rename = "language", default)]
    pub language: LanguageMode,
}

impl Preferences {
    #[must_use]
    pub fn named(display_name: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), ..Self::default() }
    }
}

/// Reads and writes [`Preferences`] under [`PREFERENCES_KEY`].
#[derive(Clone)]
pub struct PreferenceStore {
    storage: Arc<dyn Storage>,
}

impl PreferenceStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Saved preferences, or `None` when nothing usable is stored.
    #[must_use]
    pub fn load(&self) -> Option<Preferences> {
        load_json(self.storage.as_ref(), PREFERENCES_KEY)
    }

    /// Saved preferences, falling back to defaults named after the
    /// authenticated user. A stored empty name is filled the same way.
    #[must_use]
    pub fn load_or_default(&self, auth_name: Option<&str>) -> Preferences {
        let mut prefs = self.load().unwrap_or_default();
        if prefs.display_name.trim().is_empty() {
            if let Some(name) = auth_name.map(str::trim).filter(|n| !n.is_empty()) {
                prefs.display_name = name.to_owned();
            }
        }
        prefs
    }

    /// Persist preferences. A failed write is logged and otherwise ignored.
    pub fn save(&self, prefs: &Preferences) {
        if let Err(e) = self.try_save(prefs) {
            tracing::warn!(error = %e, "preferences not saved; keeping in-memory values");
        }
    }

    /// # Errors
    ///
    /// Returns an error if the preferences cannot be written.
    pub fn try_save(&self, prefs: &Preferences) -> Result<(), StorageError> {
        save_json(self.storage.as_ref(), PREFERENCES_KEY, prefs)
    }
}

#[cfg(test)]
#[path = "prefs_test.rs"]
mod tests;
