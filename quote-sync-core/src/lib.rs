//! Quote Sync Core Library
//!
//! Local-first quote replica with conflict detection, an offline mutation
//! queue and a periodic sync engine.

pub mod conflict;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod merge;
pub mod models;
pub mod queue;
pub mod scheduler;
pub mod storage;
pub mod store;

#[cfg(test)]
mod testing;

pub use conflict::{detect, Conflict, ConflictKind};
pub use engine::{
    EngineOptions, MutationOutcome, SyncEngine, SyncEngineBuilder, SyncEvent, SyncReport,
    SyncState,
};
pub use error::{EngineError, NetworkError, PersistenceError, SyncError, ValidationError};
pub use gateway::{check_server, HttpGateway, RemoteGateway, REMOTE_CATEGORY};
pub use ids::{IdGenerator, LocalIdGenerator, SequentialIds};
pub use merge::{auto_resolve, merge, AutoResolution, Resolution};
pub use models::{default_records, RawRecord, Record, RecordSource};
pub use queue::{DrainReport, MutationKind, OfflineQueue, QueueItem};
pub use scheduler::{SchedulerState, SyncScheduler, MAX_INTERVAL_MS, MIN_INTERVAL_MS};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageKey};
pub use store::{QuoteStats, RecordStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
