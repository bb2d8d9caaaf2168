//! Key-value persistence used by the record store, offline queue and engine.
//!
//! Every value is a JSON document stored under one of the fixed
//! [`StorageKey`]s. Absent or malformed values read back as `None` so callers
//! can fall back to their defaults.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PersistenceError;

/// Keys the engine persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Records,
    ServerRecordsCache,
    SyncSettings,
    SyncQueue,
    LastSelectedFilter,
}

impl StorageKey {
    pub const ALL: [StorageKey; 5] = [
        StorageKey::Records,
        StorageKey::ServerRecordsCache,
        StorageKey::SyncSettings,
        StorageKey::SyncQueue,
        StorageKey::LastSelectedFilter,
    ];

    /// Returns the backend key name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Records => "records",
            StorageKey::ServerRecordsCache => "serverRecordsCache",
            StorageKey::SyncSettings => "syncSettings",
            StorageKey::SyncQueue => "syncQueue",
            StorageKey::LastSelectedFilter => "lastSelectedFilter",
        }
    }
}

/// Blob store supplied by the host.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Result<Option<String>, PersistenceError>;

    fn set(&self, key: StorageKey, value: &str) -> Result<(), PersistenceError>;

    fn remove(&self, key: StorageKey) -> Result<(), PersistenceError>;
}

/// Reads and decodes a JSON value, treating read errors and malformed data as
/// absent.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: StorageKey) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", key.as_str(), e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", key.as_str(), e);
            None
        }
    }
}

/// Encodes and writes a JSON value.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: StorageKey,
    value: &T,
) -> Result<(), PersistenceError> {
    let json = serde_json::to_string(value).map_err(|source| PersistenceError::Serialize {
        key: key.as_str().to_string(),
        source,
    })?;
    store.set(key, &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(StorageKey::Records.as_str(), "records");
        assert_eq!(StorageKey::ServerRecordsCache.as_str(), "serverRecordsCache");
        assert_eq!(StorageKey::SyncSettings.as_str(), "syncSettings");
        assert_eq!(StorageKey::SyncQueue.as_str(), "syncQueue");
        assert_eq!(StorageKey::LastSelectedFilter.as_str(), "lastSelectedFilter");
    }

    #[test]
    fn test_load_json_missing_is_none() {
        let store = MemoryStore::new();
        let value: Option<Vec<String>> = load_json(&store, StorageKey::Records);
        assert!(value.is_none());
    }

    #[test]
    fn test_load_json_malformed_is_none() {
        let store = MemoryStore::new();
        store.set(StorageKey::Records, "{not json").unwrap();
        let value: Option<Vec<String>> = load_json(&store, StorageKey::Records);
        assert!(value.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        save_json(&store, StorageKey::LastSelectedFilter, "Life").unwrap();
        let value: Option<String> = load_json(&store, StorageKey::LastSelectedFilter);
        assert_eq!(value.as_deref(), Some("Life"));
    }
}
