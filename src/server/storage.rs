//! File-backed collections for the quote server.
//!
//! Each collection is one JSON array on disk:
//! ```text
//! <DATA_DIR>/
//!   posts.json
//!   quotes.json
//! ```
//!
//! Writes go through a temp file and a rename, serialized by a process-wide
//! lock so concurrent inserts never hand out the same id.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// One stored item, in the shape clients read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user_id: serde_json::Value,
}

/// Body of a create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewItem {
    pub title: Option<String>,
    pub body: Option<String>,
    pub user_id: serde_json::Value,
}

/// Errors that can occur during collection storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// A collection file that is not a JSON array of items.
    CorruptCollection(PathBuf, serde_json::Error),
    /// Collection name that is not a plain identifier.
    InvalidCollection(String),
    /// Create request without usable title.
    MissingTitle,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            StorageError::CorruptCollection(path, e) => {
                write!(f, "Corrupt collection {}: {}", path.display(), e)
            }
            StorageError::InvalidCollection(name) => {
                write!(f, "Invalid collection name: {}", name)
            }
            StorageError::MissingTitle => write!(f, "Item title must not be empty"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(_, e) => Some(e),
            StorageError::CorruptCollection(_, e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct CollectionStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl CollectionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Accepts ASCII letters, digits, `-` and `_` only, which also rules out
    /// path traversal.
    fn validate_collection(name: &str) -> Result<(), StorageError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidCollection(name.to_string()));
        }
        Ok(())
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", collection))
    }

    /// Returns every item in insertion order. A collection never written to
    /// is empty.
    pub fn list(&self, collection: &str) -> Result<Vec<Item>, StorageError> {
        Self::validate_collection(collection)?;
        self.read(collection)
    }

    fn read(&self, collection: &str) -> Result<Vec<Item>, StorageError> {
        let path = self.path(collection);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StorageError::CorruptCollection(path, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::IoError(path, e)),
        }
    }

    /// Appends an item under the next free id and returns it.
    pub fn insert(&self, collection: &str, new_item: NewItem) -> Result<Item, StorageError> {
        Self::validate_collection(collection)?;
        let title = new_item
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(StorageError::MissingTitle)?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut items = self.read(collection)?;
        let item = Item {
            id: items.iter().map(|i| i.id).max().unwrap_or(0) + 1,
            title,
            body: new_item.body.unwrap_or_default(),
            user_id: new_item.user_id,
        };
        items.push(item.clone());
        self.write(collection, &items)?;

        Ok(item)
    }

    fn write(&self, collection: &str, items: &[Item]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StorageError::IoError(self.data_dir.clone(), e))?;

        let path = self.path(collection);
        let bytes = serde_json::to_vec_pretty(items)
            .map_err(|e| StorageError::CorruptCollection(path.clone(), e))?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes).map_err(|e| StorageError::IoError(temp_path.clone(), e))?;
        fs::rename(&temp_path, &path).map_err(|e| StorageError::IoError(path, e))?;

        Ok(())
    }
}
