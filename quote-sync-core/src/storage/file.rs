use std::fs;
use std::io;
use std::path::PathBuf;

use super::{KeyValueStore, StorageKey};
use crate::error::PersistenceError;

/// Stores each key as `<key>.json` inside a data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the full path for a key.
    pub fn path(&self, key: StorageKey) -> PathBuf {
        self.data_dir.join(format!("{}.json", key.as_str()))
    }

    fn io_error(key: StorageKey, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            key: key.as_str().to_string(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    /// Creates the data directory if it doesn't exist.
    fn set(&self, key: StorageKey, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| Self::io_error(key, e))?;

        // Write atomically using temp file + rename
        let path = self.path(key);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, value).map_err(|e| Self::io_error(key, e))?;
        fs::rename(&temp_path, &path).map_err(|e| Self::io_error(key, e))
    }

    fn remove(&self, key: StorageKey) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    #[test]
    fn test_path() {
        let (store, _temp) = test_store();
        assert!(store.path(StorageKey::SyncQueue).ends_with("syncQueue.json"));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (store, _temp) = test_store();
        for key in StorageKey::ALL {
            assert!(store.get(key).unwrap().is_none());
        }
    }

    #[test]
    fn test_set_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("data");
        let store = FileStore::new(nested.clone());

        store.set(StorageKey::Records, "[]").unwrap();

        assert!(nested.exists());
        assert_eq!(store.get(StorageKey::Records).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_set_leaves_no_temp_file() {
        let (store, temp) = test_store();
        store.set(StorageKey::Records, "[1]").unwrap();
        store.set(StorageKey::Records, "[2]").unwrap();

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["records.json".to_string()]);
        assert_eq!(store.get(StorageKey::Records).unwrap().as_deref(), Some("[2]"));
    }

    #[test]
    fn test_overwrite_and_remove() {
        let (store, _temp) = test_store();
        store.set(StorageKey::SyncSettings, "1").unwrap();
        store.set(StorageKey::SyncSettings, "2").unwrap();
        assert_eq!(store.get(StorageKey::SyncSettings).unwrap().as_deref(), Some("2"));

        store.remove(StorageKey::SyncSettings).unwrap();
        assert!(store.get(StorageKey::SyncSettings).unwrap().is_none());
        // Removing again is fine
        store.remove(StorageKey::SyncSettings).unwrap();
    }
}
