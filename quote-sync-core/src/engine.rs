//! Sync orchestration.
//!
//! [`SyncEngine`] owns the local replica, the offline queue, the persisted
//! sync settings and the scheduler, and is the only thing callers talk to.
//! A cycle fetches the remote replica, detects conflicts, merges or resolves,
//! persists, then drains the queue. Only one cycle runs at a time: a manual
//! [`SyncEngine::run_cycle`] waits for an in-flight one, a timer tick that
//! finds one running is dropped.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::conflict::{detect, Conflict, ConflictKind};
use crate::error::{EngineError, PersistenceError, SyncError, ValidationError};
use crate::gateway::{with_timeout, RemoteGateway};
use crate::ids::{IdGenerator, LocalIdGenerator};
use crate::merge::{auto_resolve, merge, Resolution};
use crate::models::{Record, RecordSource};
use crate::queue::{DrainReport, MutationKind, OfflineQueue, QueueItem};
use crate::scheduler::{
    validate_interval, Callback, SchedulerState, SyncScheduler, DEFAULT_INTERVAL_MS,
};
use crate::storage::{load_json, save_json, KeyValueStore, StorageKey};
use crate::store::RecordStore;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound for every gateway call.
    pub request_timeout: Duration,
    /// Interval used until one has been persisted.
    pub default_interval_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            default_interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

/// Persisted under `syncSettings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SyncSettings {
    auto_sync_enabled: bool,
    interval_ms: u64,
    offline_mode: bool,
    last_sync_at: Option<DateTime<Utc>>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync_enabled: false,
            interval_ms: DEFAULT_INTERVAL_MS,
            offline_mode: false,
            last_sync_at: None,
        }
    }
}

/// Snapshot of the engine's sync state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub auto_sync_enabled: bool,
    pub interval_ms: u64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub online: bool,
    pub offline_mode: bool,
}

/// What one completed cycle did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub fetched: usize,
    pub conflicts: Vec<Conflict>,
    /// True when conflicts were settled by the automatic policy rather than
    /// left pending.
    pub auto_resolved: bool,
    pub records: usize,
    pub drain: DrainReport,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    ConflictsDetected { conflicts: Vec<Conflict> },
    SyncCompleted { report: SyncReport },
    SyncFailed { cause: String },
    QueueDrained { delivered: usize, failed: usize },
}

/// How a recorded mutation left the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Posted straight away; carries the record as the remote stored it.
    Delivered(Record),
    /// Waiting in the offline queue.
    Queued(QueueItem),
}

struct EngineInner {
    gateway: Arc<dyn RemoteGateway>,
    backend: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    options: EngineOptions,
    store: Mutex<RecordStore>,
    queue: tokio::sync::Mutex<OfflineQueue>,
    settings: Mutex<SyncSettings>,
    pending: Mutex<Vec<Conflict>>,
    cycle: tokio::sync::Mutex<()>,
    events: broadcast::Sender<SyncEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl EngineInner {
    fn settings(&self) -> SyncSettings {
        lock(&self.settings).clone()
    }

    fn update_settings(&self, change: impl FnOnce(&mut SyncSettings)) {
        let mut settings = lock(&self.settings);
        change(&mut settings);
        if let Err(e) = save_json(self.backend.as_ref(), StorageKey::SyncSettings, &*settings) {
            tracing::warn!("Failed to persist sync settings: {}", e);
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn run_cycle(&self) -> Result<SyncReport, SyncError> {
        let _cycle = self.cycle.lock().await;
        self.cycle_locked().await
    }

    async fn scheduled_cycle(&self) {
        let Ok(_cycle) = self.cycle.try_lock() else {
            tracing::debug!("Sync already in progress; skipping tick");
            return;
        };

        if let Err(e) = self.cycle_locked().await {
            tracing::warn!("Scheduled sync failed: {}", e);
        }
    }

    async fn cycle_locked(&self) -> Result<SyncReport, SyncError> {
        let remote = match with_timeout(self.options.request_timeout, self.gateway.fetch_all()).await
        {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!("Fetch failed: {}", e);
                self.emit(SyncEvent::SyncFailed {
                    cause: e.to_string(),
                });
                return Err(SyncError::Fetch(e));
            }
        };
        tracing::debug!("Fetched {} remote record(s)", remote.len());

        if let Err(e) = save_json(self.backend.as_ref(), StorageKey::ServerRecordsCache, &remote) {
            tracing::warn!("Failed to cache remote records: {}", e);
        }

        let auto = self.settings().auto_sync_enabled;
        let reconciled = {
            let mut store = lock(&self.store);
            reconcile(&mut store, &remote, auto)
        };
        let (conflicts, kept_local, records) = match reconciled {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Failed to persist synced records: {}", e);
                self.emit(SyncEvent::SyncFailed {
                    cause: e.to_string(),
                });
                return Err(SyncError::Persistence(e));
            }
        };

        *lock(&self.pending) = if auto { Vec::new() } else { conflicts.clone() };
        if !conflicts.is_empty() {
            tracing::info!(
                "{} conflict(s) {}",
                conflicts.len(),
                if auto { "resolved automatically" } else { "need resolution" }
            );
            self.emit(SyncEvent::ConflictsDetected {
                conflicts: conflicts.clone(),
            });
        }

        let completed_at = Utc::now();
        self.update_settings(|s| s.last_sync_at = Some(completed_at));

        let drain = {
            let mut queue = self.queue.lock().await;
            for record in kept_local {
                queue.enqueue_unique(MutationKind::Add, record);
            }
            if self.settings().offline_mode {
                tracing::debug!("Offline mode; leaving {} item(s) queued", queue.len());
                DrainReport::default()
            } else {
                self.drain_locked(&mut queue).await
            }
        };

        let report = SyncReport {
            fetched: remote.len(),
            auto_resolved: auto && !conflicts.is_empty(),
            conflicts,
            records,
            drain,
            completed_at,
        };
        self.emit(SyncEvent::SyncCompleted {
            report: report.clone(),
        });
        Ok(report)
    }

    async fn drain_queue(&self) -> DrainReport {
        let mut queue = self.queue.lock().await;
        self.drain_locked(&mut queue).await
    }

    async fn drain_locked(&self, queue: &mut OfflineQueue) -> DrainReport {
        if queue.is_empty() {
            return DrainReport::default();
        }

        let report = queue
            .drain(self.gateway.as_ref(), self.options.request_timeout)
            .await;
        tracing::info!(
            "Delivered {} queued mutation(s), {} still queued",
            report.delivered.len(),
            report.failed.len()
        );
        self.emit(SyncEvent::QueueDrained {
            delivered: report.delivered.len(),
            failed: report.failed.len(),
        });
        report
    }
}

/// Detects conflicts and folds `remote` into the store. Returns the
/// conflicts, the local records kept for upload, and the resulting replica
/// size.
fn reconcile(
    store: &mut RecordStore,
    remote: &[Record],
    auto: bool,
) -> Result<(Vec<Conflict>, Vec<Record>, usize), PersistenceError> {
    let local = store.records().to_vec();
    let conflicts = detect(&local, remote);

    let kept_local = if conflicts.is_empty() {
        store.replace_all(merge(&local, remote))?;
        Vec::new()
    } else if auto {
        let resolution = auto_resolve(&local, remote, &conflicts);
        store.replace_all(resolution.records)?;
        resolution.kept_local
    } else {
        Vec::new()
    };

    Ok((conflicts, kept_local, store.len()))
}

pub struct SyncEngineBuilder {
    gateway: Arc<dyn RemoteGateway>,
    backend: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    options: EngineOptions,
    online: bool,
}

impl SyncEngineBuilder {
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Initial connectivity. Defaults to online.
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Loads persisted state and assembles the engine.
    ///
    /// If auto-sync was left enabled, the scheduler is restarted; that part
    /// needs a tokio runtime and is skipped with a warning outside one.
    pub fn build(self) -> SyncEngine {
        let mut settings: SyncSettings = load_json(self.backend.as_ref(), StorageKey::SyncSettings)
            .unwrap_or_else(|| SyncSettings {
                interval_ms: self.options.default_interval_ms,
                ..SyncSettings::default()
            });
        if let Err(e) = validate_interval(settings.interval_ms) {
            tracing::warn!("Stored {}; using {} ms", e, self.options.default_interval_ms);
            settings.interval_ms = self.options.default_interval_ms;
        }

        let store = RecordStore::load(self.backend.clone(), self.ids.as_ref());
        let queue = OfflineQueue::load(self.backend.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Arc::new(EngineInner {
            gateway: self.gateway,
            backend: self.backend,
            ids: self.ids,
            options: self.options,
            store: Mutex::new(store),
            queue: tokio::sync::Mutex::new(queue),
            settings: Mutex::new(settings.clone()),
            pending: Mutex::new(Vec::new()),
            cycle: tokio::sync::Mutex::new(()),
            events,
        });

        let scheduler = SyncScheduler::new(
            settings.interval_ms,
            self.online,
            tick_callback(Arc::downgrade(&inner)),
            reconnect_callback(Arc::downgrade(&inner)),
        );

        if settings.auto_sync_enabled {
            if tokio::runtime::Handle::try_current().is_ok() {
                if let Err(e) = scheduler.start(settings.interval_ms) {
                    tracing::warn!("Could not resume auto-sync: {}", e);
                }
            } else {
                tracing::warn!("Auto-sync is enabled but no runtime is running; not scheduling");
            }
        }

        SyncEngine { inner, scheduler }
    }
}

fn tick_callback(target: Weak<EngineInner>) -> Callback {
    Arc::new(move || {
        let target = target.clone();
        async move {
            if let Some(inner) = target.upgrade() {
                inner.scheduled_cycle().await;
            }
        }
        .boxed()
    })
}

fn reconnect_callback(target: Weak<EngineInner>) -> Callback {
    Arc::new(move || {
        let target = target.clone();
        async move {
            if let Some(inner) = target.upgrade() {
                inner.drain_queue().await;
            }
        }
        .boxed()
    })
}

pub struct SyncEngine {
    inner: Arc<EngineInner>,
    scheduler: SyncScheduler,
}

impl SyncEngine {
    pub fn builder(
        gateway: Arc<dyn RemoteGateway>,
        backend: Arc<dyn KeyValueStore>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder {
            gateway,
            backend,
            ids: Arc::new(LocalIdGenerator),
            options: EngineOptions::default(),
            online: true,
        }
    }

    pub fn new(gateway: Arc<dyn RemoteGateway>, backend: Arc<dyn KeyValueStore>) -> Self {
        Self::builder(gateway, backend).build()
    }

    /// Runs one sync cycle, waiting for any cycle already in flight.
    ///
    /// A fetch failure changes nothing. A failure to persist the reconciled
    /// replica leaves the previous replica and `last_sync_at` in place.
    pub async fn run_cycle(&self) -> Result<SyncReport, SyncError> {
        self.inner.run_cycle().await
    }

    /// Starts periodic sync at `interval_ms` and remembers the choice.
    pub fn enable_auto_sync(&self, interval_ms: u64) -> Result<(), EngineError> {
        self.scheduler.start(interval_ms)?;
        self.inner.update_settings(|s| {
            s.auto_sync_enabled = true;
            s.interval_ms = interval_ms;
        });
        Ok(())
    }

    pub fn disable_auto_sync(&self) {
        self.scheduler.stop();
        self.inner.update_settings(|s| s.auto_sync_enabled = false);
    }

    pub fn set_interval(&self, interval_ms: u64) -> Result<(), EngineError> {
        self.scheduler.set_interval(interval_ms)?;
        self.inner.update_settings(|s| s.interval_ms = interval_ms);
        Ok(())
    }

    /// Records connectivity. Coming back online drains the queue once; the
    /// drain is spawned on the current tokio runtime and skipped outside one.
    pub fn set_online(&self, online: bool) -> bool {
        self.scheduler.set_online(online)
    }

    /// While set, mutations are always queued and cycles do not drain.
    pub fn set_offline_mode(&self, offline: bool) {
        self.inner.update_settings(|s| s.offline_mode = offline);
    }

    /// Applies a mutation locally, then delivers it or queues it.
    ///
    /// A missing id is generated. Delivery is attempted straight away when
    /// online and not in offline mode; a failed attempt falls back to the
    /// queue, so the caller only sees local validation or persistence errors.
    pub async fn record_mutation(&self, mut record: Record) -> Result<MutationOutcome, EngineError> {
        if record.id.is_empty() {
            record.id = self.inner.ids.next_id();
        }
        if record.source.is_none() {
            record.source = Some(RecordSource::Local);
        }
        record.last_modified = Some(Utc::now());

        let kind = lock(&self.inner.store).apply_mutation(record.clone())?;

        if self.scheduler.is_online() && !self.inner.settings().offline_mode {
            let posted = with_timeout(
                self.inner.options.request_timeout,
                self.inner.gateway.post_one(&record),
            )
            .await;
            match posted {
                Ok(remote) => {
                    tracing::debug!("Delivered {} as {}", record.id, remote.id);
                    return Ok(MutationOutcome::Delivered(remote));
                }
                Err(e) => tracing::warn!("Delivery of {} failed, queueing: {}", record.id, e),
            }
        }

        let item = self.inner.queue.lock().await.enqueue(kind, record);
        Ok(MutationOutcome::Queued(item))
    }

    /// Records a new locally authored quote.
    pub async fn add_quote(
        &self,
        text: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<MutationOutcome, EngineError> {
        let record = Record::local(self.inner.ids.as_ref(), text, category);
        self.record_mutation(record).await
    }

    /// Settles the pending conflict at `index`.
    pub async fn resolve_conflict(&self, index: usize, choice: Resolution) -> Result<(), EngineError> {
        let conflict = lock(&self.inner.pending)
            .get(index)
            .cloned()
            .ok_or(ValidationError::UnknownConflict(index))?;

        match choice {
            Resolution::KeepLocal => {
                let kept = conflict.local.clone().with_source(RecordSource::LocalKept);
                let kind = match conflict.kind {
                    ConflictKind::LocalOnly => MutationKind::Add,
                    ConflictKind::ContentMismatch => MutationKind::Update,
                };
                lock(&self.inner.store).apply_mutation(kept.clone())?;
                self.inner.queue.lock().await.enqueue_unique(kind, kept);
            }
            Resolution::UseRemote => {
                let remote = conflict
                    .remote
                    .as_ref()
                    .ok_or(ValidationError::NoRemoteRecord(index))?;
                let resolved = conflict
                    .local
                    .overlay(remote)
                    .with_source(RecordSource::ServerResolved);
                let mut store = lock(&self.inner.store);
                if !store.replace(&conflict.local.id, resolved.clone())? {
                    store.apply_mutation(resolved)?;
                }
            }
            Resolution::Remove => {
                lock(&self.inner.store).remove(&conflict.local.id)?;
            }
        }

        let mut pending = lock(&self.inner.pending);
        if let Some(i) = pending.iter().position(|c| *c == conflict) {
            pending.remove(i);
        }
        tracing::info!("Resolved {} with {}", conflict, choice);
        Ok(())
    }

    pub fn sync_state(&self) -> SyncState {
        let settings = self.inner.settings();
        SyncState {
            auto_sync_enabled: settings.auto_sync_enabled,
            interval_ms: settings.interval_ms,
            last_sync_at: settings.last_sync_at,
            online: self.scheduler.is_online(),
            offline_mode: settings.offline_mode,
        }
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn pending_conflicts(&self) -> Vec<Conflict> {
        lock(&self.inner.pending).clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn records(&self) -> Vec<Record> {
        lock(&self.inner.store).records().to_vec()
    }

    /// Runs a read-only query against the replica.
    pub fn with_store<R>(&self, query: impl FnOnce(&RecordStore) -> R) -> R {
        query(&lock(&self.inner.store))
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    pub async fn queued_items(&self) -> Vec<QueueItem> {
        self.inner.queue.lock().await.items().to_vec()
    }

    /// Drains the queue outside a cycle.
    pub async fn drain_queue(&self) -> DrainReport {
        self.inner.drain_queue().await
    }

    /// The category filter the user last picked, if any.
    pub fn selected_filter(&self) -> Option<String> {
        load_json(self.inner.backend.as_ref(), StorageKey::LastSelectedFilter)
    }

    pub fn set_selected_filter(&self, filter: Option<&str>) -> Result<(), PersistenceError> {
        match filter {
            Some(filter) => save_json(
                self.inner.backend.as_ref(),
                StorageKey::LastSelectedFilter,
                filter,
            ),
            None => self.inner.backend.remove(StorageKey::LastSelectedFilter),
        }
    }

    /// Stops the timer. A cycle already running finishes on its own.
    pub fn shutdown(&self) {
        self.scheduler.stop();
    }
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("state", &self.sync_state())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
