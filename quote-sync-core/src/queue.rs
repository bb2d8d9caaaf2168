//! Offline mutation queue.
//!
//! Mutations that could not be delivered wait here, persisted under
//! `syncQueue`, until a drain replays them against the gateway in FIFO order.
//! Enqueueing never fails the caller: the mutation already lives in the record
//! store, so a failed queue write is logged and the in-memory queue still
//! carries the item.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::{with_timeout, RemoteGateway};
use crate::models::Record;
use crate::storage::{load_json, save_json, KeyValueStore, StorageKey};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Add,
    Update,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Add => write!(f, "add"),
            MutationKind::Update => write!(f, "update"),
        }
    }
}

/// A mutation waiting for delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub queue_id: String,
    pub kind: MutationKind,
    pub payload: Record,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(kind: MutationKind, payload: Record) -> Self {
        Self {
            queue_id: Uuid::new_v4().to_string(),
            kind,
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

/// Result of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrainReport {
    pub delivered: Vec<QueueItem>,
    pub failed: Vec<QueueItem>,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.failed.is_empty()
    }
}

pub struct OfflineQueue {
    backend: Arc<dyn KeyValueStore>,
    items: Vec<QueueItem>,
}

impl OfflineQueue {
    /// Loads the persisted queue; missing or malformed data gives an empty
    /// queue.
    pub fn load(backend: Arc<dyn KeyValueStore>) -> Self {
        let items: Vec<QueueItem> =
            load_json(backend.as_ref(), StorageKey::SyncQueue).unwrap_or_default();
        if !items.is_empty() {
            tracing::debug!("Loaded {} queued mutation(s)", items.len());
        }
        Self { backend, items }
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if a queued item carries a record with this id.
    pub fn contains_record(&self, record_id: &str) -> bool {
        self.items.iter().any(|item| item.payload.id == record_id)
    }

    /// Appends a mutation and persists the queue.
    pub fn enqueue(&mut self, kind: MutationKind, payload: Record) -> QueueItem {
        let item = QueueItem::new(kind, payload);
        tracing::debug!("Queued {} of {}", item.kind, item.payload.id);
        self.items.push(item.clone());
        self.persist();
        item
    }

    /// Like [`enqueue`](Self::enqueue), but does nothing when the record is
    /// already queued.
    pub fn enqueue_unique(&mut self, kind: MutationKind, payload: Record) -> Option<QueueItem> {
        if self.contains_record(&payload.id) {
            return None;
        }
        Some(self.enqueue(kind, payload))
    }

    /// Replays queued mutations in FIFO order.
    ///
    /// Each delivered item leaves the queue (and the persisted copy) as soon
    /// as its post succeeds. Failed items stay where they were, so afterwards
    /// the queue holds exactly the failures in their original order.
    pub async fn drain(&mut self, gateway: &dyn RemoteGateway, limit: Duration) -> DrainReport {
        let mut report = DrainReport::default();
        let snapshot = self.items.clone();

        for item in snapshot {
            match with_timeout(limit, gateway.post_one(&item.payload)).await {
                Ok(remote) => {
                    tracing::debug!(
                        "Delivered {} of {} (remote id {})",
                        item.kind,
                        item.payload.id,
                        remote.id
                    );
                    self.items.retain(|queued| queued.queue_id != item.queue_id);
                    self.persist();
                    report.delivered.push(item);
                }
                Err(e) => {
                    tracing::warn!("Delivery of {} failed: {}", item.payload.id, e);
                    report.failed.push(item);
                }
            }
        }

        report
    }

    fn persist(&self) {
        if let Err(e) = save_json(self.backend.as_ref(), StorageKey::SyncQueue, &self.items) {
            tracing::warn!("Failed to persist offline queue: {}", e);
        }
    }
}

impl fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("items", &self.items)
            .finish()
    }
}
