use super::*;

fn state_dir(root: &tempfile::TempDir) -> PathBuf {
    root.path().join("state")
}

// =============================================================================
// MemoryStorage
// =============================================================================

#[test]
fn memory_get_missing_is_none() {
    let storage = MemoryStorage::new();
    assert_eq!(storage.get("nope").unwrap(), None);
}

#[test]
fn memory_set_then_get() {
    let storage = MemoryStorage::new();
    storage.set("k", "v").unwrap();
    assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
    assert_eq!(storage.len(), 1);
}

#[test]
fn memory_remove_missing_is_ok() {
    let storage = MemoryStorage::new();
    storage.remove("nope").unwrap();
    assert!(storage.is_empty());
}

// =============================================================================
// FileStorage
// =============================================================================

#[test]
fn file_set_get_remove() {
    let root = tempfile::tempdir().unwrap();
    let dir = state_dir(&root);
    let storage = FileStorage::open(&dir).unwrap();

    assert_eq!(storage.get("userPreferences").unwrap(), None);
    storage.set("userPreferences", "{\"a\":1}").unwrap();
    assert_eq!(storage.get("userPreferences").unwrap().as_deref(), Some("{\"a\":1}"));
    assert!(dir.join("userPreferences.json").exists());
    assert!(!dir.join("userPreferences.json.tmp").exists());

    storage.remove("userPreferences").unwrap();
    assert_eq!(storage.get("userPreferences").unwrap(), None);
    storage.remove("userPreferences").unwrap();
}

#[test]
fn file_set_overwrites_wholesale() {
    let root = tempfile::tempdir().unwrap();
    let dir = state_dir(&root);
    let storage = FileStorage::open(&dir).unwrap();
    storage.set("k", "a much longer first value").unwrap();
    storage.set("k", "short").unwrap();
    assert_eq!(storage.get("k").unwrap().as_deref(), Some("short"));
}

#[test]
fn file_rejects_path_like_keys() {
    let root = tempfile::tempdir().unwrap();
    let dir = state_dir(&root);
    let storage = FileStorage::open(&dir).unwrap();
    for key in ["", "../escape", "a/b", ".hidden"] {
        assert!(matches!(storage.set(key, "x"), Err(StorageError::InvalidKey(_))), "{key}");
    }
}

// =============================================================================
// JSON helpers
// =============================================================================

#[test]
fn json_helpers_round_trip() {
    let storage = MemoryStorage::new();
    save_json(&storage, "nums", &vec![1, 2, 3]).unwrap();
    let back: Option<Vec<i32>> = load_json(&storage, "nums");
    assert_eq!(back, Some(vec![1, 2, 3]));
}

#[test]
fn load_json_undecodable_is_none() {
    let storage = MemoryStorage::new();
    storage.set("nums", "not json").unwrap();
    let back: Option<Vec<i32>> = load_json(&storage, "nums");
    assert_eq!(back, None);
}
