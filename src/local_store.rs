//! Persisted client-side key-value store.
//!
//! Replaces the browser localStorage of the original web dashboard with a
//! single JSON file under the app data dir. Holds the session tokens, the
//! serialized user object, the last-selected filename and the last nav
//! section. Writes are whole-file read-then-replace; a missing or corrupt
//! file simply starts the store empty.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// ── Well-known keys ─────────────────────────────────────────

pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
pub const KEY_USER: &str = "user";
pub const KEY_SELECTED_FILENAME: &str = "selected_filename";
pub const KEY_NAV_SECTION: &str = "nav_section";

/// Keys removed on logout. Navigation is intentionally included: a fresh
/// login always lands on the dashboard.
const SESSION_KEYS: &[&str] = &[
    KEY_ACCESS_TOKEN,
    KEY_REFRESH_TOKEN,
    KEY_USER,
    KEY_SELECTED_FILENAME,
    KEY_NAV_SECTION,
];

/// Errors from local store persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to write state file: {0}")]
    Write(#[from] std::io::Error),
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ═══════════════════════════════════════════════════════════
// LocalStore
// ═══════════════════════════════════════════════════════════

/// File-backed key-value store for client-persisted state.
pub struct LocalStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl LocalStore {
    /// Open the store at `path`, loading existing entries if the file
    /// exists and parses. A corrupt file is treated as empty — persisted
    /// client state is never worth failing startup over.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_entries(&path);
        Self { path, entries }
    }

    /// Open the store at the default app data location.
    pub fn open_default() -> Self {
        Self::open(crate::config::local_store_path())
    }

    fn read_entries(path: &Path) -> HashMap<String, String> {
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt state file, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        }
    }

    /// Get a stored value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set a value and persist the whole store.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    /// Remove a single key and persist.
    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Remove every session-scoped key (logout teardown).
    pub fn clear_session_keys(&mut self) -> Result<(), StoreError> {
        for key in SESSION_KEYS {
            self.entries.remove(*key);
        }
        self.flush()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("state.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_starts_empty() {
        let (_dir, store) = temp_store();
        assert!(store.is_empty());
        assert!(store.get(KEY_ACCESS_TOKEN).is_none());
    }

    #[test]
    fn set_then_get_roundtrip() {
        let (_dir, mut store) = temp_store();
        store.set(KEY_ACCESS_TOKEN, "tok-123").unwrap();
        assert_eq!(store.get(KEY_ACCESS_TOKEN), Some("tok-123"));
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = LocalStore::open(&path);
        store.set(KEY_SELECTED_FILENAME, "march_billing.csv").unwrap();
        drop(store);

        let reopened = LocalStore::open(&path);
        assert_eq!(reopened.get(KEY_SELECTED_FILENAME), Some("march_billing.csv"));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not valid json {{{").unwrap();

        let store = LocalStore::open(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_session_keys_removes_all_session_state() {
        let (_dir, mut store) = temp_store();
        store.set(KEY_ACCESS_TOKEN, "a").unwrap();
        store.set(KEY_REFRESH_TOKEN, "r").unwrap();
        store.set(KEY_USER, "{}").unwrap();
        store.set(KEY_SELECTED_FILENAME, "f.csv").unwrap();
        store.set(KEY_NAV_SECTION, "upload").unwrap();

        store.clear_session_keys().unwrap();

        assert!(store.is_empty());
        for key in SESSION_KEYS {
            assert!(store.get(key).is_none(), "key {key} should be cleared");
        }
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let (_dir, mut store) = temp_store();
        assert!(store.remove("nothing").is_ok());
    }

    #[test]
    fn set_overwrites_previous_value() {
        let (_dir, mut store) = temp_store();
        store.set(KEY_NAV_SECTION, "dashboard").unwrap();
        store.set(KEY_NAV_SECTION, "upload").unwrap();
        assert_eq!(store.get(KEY_NAV_SECTION), Some("upload"));
        assert_eq!(store.len(), 1);
    }
}
