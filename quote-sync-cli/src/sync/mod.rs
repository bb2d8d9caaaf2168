//! Wiring between the CLI configuration and the sync engine.

mod auto_sync;

pub use auto_sync::try_auto_sync;

use std::sync::Arc;
use std::time::Duration;

use quote_sync_core::{EngineOptions, FileStore, HttpGateway, SyncEngine};

use crate::config::Config;

/// Opens the engine over the configured data directory and remote.
///
/// Must be called inside a tokio runtime so a persisted auto-sync schedule
/// can resume.
pub fn open_engine(config: &Config) -> SyncEngine {
    let gateway = Arc::new(HttpGateway::new(
        config.remote.base_url.value.clone(),
        config.remote.collection.clone(),
        config.remote.owner_ref.value.clone(),
    ));
    let backend = Arc::new(FileStore::new(config.data_dir.value.clone()));

    SyncEngine::builder(gateway, backend)
        .options(EngineOptions {
            request_timeout: Duration::from_secs(config.remote.timeout_secs),
            default_interval_ms: config.sync.interval_secs.saturating_mul(1000),
        })
        .build()
}
