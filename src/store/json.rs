//! JSON-file state store.
//!
//! Persists the whole key/value map in a single JSON file. Every write
//! rewrites the file; for the handful of small values this crate stores
//! that is cheap and keeps the format inspectable. Writes are not atomic.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use log::warn;

use crate::errors::PersistenceError;
use crate::store::StateStore;

/// State store backed by one JSON file on disk.
///
/// The file is read once at open; a missing or corrupt file starts empty.
/// Mutations update the in-memory map and then rewrite the file.
pub struct JsonStateStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonStateStore {
    /// Opens (or creates) a store at `path`.
    pub fn open(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("state store at {:?} is corrupt, starting empty: {}", path, e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), PersistenceError> {
        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| PersistenceError::Write(e.to_string()))?;
        fs::write(&self.path, contents).map_err(|e| PersistenceError::Write(e.to_string()))
    }
}

impl StateStore for JsonStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.save(&entries) {
            warn!("dropping state write for {:?}: {}", key, e);
        }
    }

    fn remove(&self, key: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.remove(key).is_some() {
            if let Err(e) = self.save(&entries) {
                warn!("dropping state removal for {:?}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateStoreExt;

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = JsonStateStore::open(path.clone());
            store.set("app_mode", "web_host");
            store.set_bool("has_ever_run", true);
        }

        let store = JsonStateStore::open(path);
        assert_eq!(store.get("app_mode").as_deref(), Some("web_host"));
        assert!(store.get_bool("has_ever_run"));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonStateStore::open(path);
        assert_eq!(store.get("app_mode"), None);

        // And the store is still usable afterwards.
        store.set("app_mode", "fallback");
        assert_eq!(store.get("app_mode").as_deref(), Some("fallback"));
    }

    #[test]
    fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = JsonStateStore::open(path.clone());
        store.set("temp_url", "https://x.example/");
        store.remove("temp_url");
        drop(store);

        let store = JsonStateStore::open(path);
        assert_eq!(store.get("temp_url"), None);
    }
}
