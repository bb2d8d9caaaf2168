//! Server-side modules for the quote sync server.

pub mod routes;
pub mod storage;

pub use routes::{router, AppState};
pub use storage::{CollectionStore, Item, NewItem, StorageError};
