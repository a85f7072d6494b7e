//! Opaque key/value storage used by the persistence plugin.
//!
//! Values are serialized snapshots; the store never interprets them beyond
//! (de)serializing its own state. Writes are best-effort.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Key/value blob storage.
pub trait StorageBackend: Send + Sync {
    /// Read the blob stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous blob.
    fn set(&self, key: &str, value: String);
}

/// In-process storage backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the blob under `key`, returning it.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries().remove(key)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries().insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let storage = MemoryStorage::new();
        assert!(storage.get("profile").is_none());

        storage.set("profile", "{\"name\":\"ada\"}".into());
        storage.set("profile", "{\"name\":\"grace\"}".into());

        assert_eq!(storage.get("profile").as_deref(), Some("{\"name\":\"grace\"}"));
        assert_eq!(storage.len(), 1);
        assert!(storage.remove("profile").is_some());
        assert!(storage.is_empty());
    }
}
