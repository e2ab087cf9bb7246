use super::*;
use crate::storage::MemoryStorage;
use serde_json::json;

struct BrokenStorage;

impl Storage for BrokenStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk gone")))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk gone")))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk gone")))
    }
}

// =============================================================================
// choices
// =============================================================================

#[test]
fn defaults_match_new_learner() {
    let prefs = Preferences::default();
    assert_eq!(prefs.proficiency_level, ProficiencyLevel::Beginner);
    assert_eq!(prefs.week.to_string(), "week01");
    assert_eq!(prefs.gender, Gender::Male);
    assert_eq!(prefs.language, LanguageMode::Hebrew);
}

#[test]
fn level_parse_is_case_insensitive() {
    assert_eq!("Advanced".parse::<ProficiencyLevel>().unwrap(), ProficiencyLevel::Advanced);
    assert!("master".parse::<ProficiencyLevel>().is_err());
}

#[test]
fn language_accepts_legacy_english() {
    assert_eq!("english".parse::<LanguageMode>().unwrap(), LanguageMode::EnglishTransliteration);
    let mode: LanguageMode = serde_json::from_value(json!("english")).unwrap();
    assert_eq!(mode, LanguageMode::EnglishTransliteration);
    assert_eq!(serde_json::to_value(mode).unwrap(), json!("transliteration-english"));
}

#[test]
fn language_direction() {
    assert_eq!(LanguageMode::Arabic.direction(), "rtl");
    assert_eq!(LanguageMode::EnglishTransliteration.direction(), "ltr");
}

// =============================================================================
// Week
// =============================================================================

#[test]
fn week_parse_forms() {
    assert_eq!("week03".parse::<Week>().unwrap().number(), 3);
    assert_eq!("03".parse::<Week>().unwrap().number(), 3);
    assert_eq!("11".parse::<Week>().unwrap().number(), 11);
}

#[test]
fn week_out_of_range_rejected() {
    assert!("week00".parse::<Week>().is_err());
    assert!("week12".parse::<Week>().is_err());
    assert!("weekly".parse::<Week>().is_err());
    assert!(Week::new(0).is_err());
}

#[test]
fn week_serializes_padded() {
    let week = Week::new(7).unwrap();
    assert_eq!(serde_json::to_value(week).unwrap(), json!("week07"));
    assert_eq!(week.padded(), "07");
}

// =============================================================================
// PreferenceStore
// =============================================================================

#[test]
fn save_then_load_round_trips() {
    let store = PreferenceStore::new(Arc::new(MemoryStorage::new()));
    let prefs = Preferences {
        display_name: "נועה".into(),
        proficiency_level: ProficiencyLevel::Intermediate,
        week: Week::new(4).unwrap(),
        gender: Gender::Female,
        language: LanguageMode::Arabic,
    };
    store.save(&prefs);
    assert_eq!(store.load(), Some(prefs));
}

#[test]
fn stored_shape_uses_wire_names() {
    let storage = Arc::new(MemoryStorage::new());
    let store = PreferenceStore::new(storage.clone());
    store.save(&Preferences::named("Dana"));
    let raw: serde_json::Value = serde_json::from_str(&storage.get(PREFERENCES_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(
        raw,
        json!({ "name": "Dana", "level": "beginner", "week": "week01", "gender": "male", "language": "hebrew" })
    );
}

#[test]
fn load_missing_is_none() {
    let store = PreferenceStore::new(Arc::new(MemoryStorage::new()));
    assert_eq!(store.load(), None);
}

#[test]
fn load_or_default_fills_name_from_auth() {
    let store = PreferenceStore::new(Arc::new(MemoryStorage::new()));
    let prefs = store.load_or_default(Some("Omar"));
    assert_eq!(prefs.display_name, "Omar");
    assert_eq!(prefs.language, LanguageMode::Hebrew);
}

#[test]
fn load_or_default_keeps_saved_name() {
    let store = PreferenceStore::new(Arc::new(MemoryStorage::new()));
    store.save(&Preferences::named("Saved"));
    assert_eq!(store.load_or_default(Some("Auth")).display_name, "Saved");
}

#[test]
fn broken_storage_degrades_to_defaults() {
    let store = PreferenceStore::new(Arc::new(BrokenStorage));
    store.save(&Preferences::named("x"));
    assert!(store.try_save(&Preferences::default()).is_err());
    assert_eq!(store.load(), None);
    assert_eq!(store.load_or_default(None), Preferences::default());
}
