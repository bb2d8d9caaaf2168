//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{NetworkError, PersistenceError};
use crate::gateway::RemoteGateway;
use crate::models::{Record, RecordSource};
use crate::storage::{KeyValueStore, MemoryStore, StorageKey};

/// Memory store whose writes can be switched to fail.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, PersistenceError> {
        self.inner.get(key)
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::WriteRejected(key.as_str().to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: StorageKey) -> Result<(), PersistenceError> {
        self.inner.remove(key)
    }
}

/// In-memory remote with scriptable failures.
///
/// Successful posts are appended to the remote replica under `srv_<n>` ids.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    remote: Mutex<Vec<Record>>,
    posted: Mutex<Vec<Record>>,
    failing_texts: Mutex<Vec<String>>,
    fail_fetch: AtomicBool,
    fail_all_posts: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    fetch_calls: AtomicUsize,
    post_attempts: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(records: Vec<Record>) -> Self {
        let gateway = Self::new();
        *gateway.remote.lock().unwrap() = records;
        gateway
    }

    pub fn set_remote(&self, records: Vec<Record>) {
        *self.remote.lock().unwrap() = records;
    }

    pub fn remote(&self) -> Vec<Record> {
        self.remote.lock().unwrap().clone()
    }

    pub fn fail_posts_for(&self, text: &str) {
        self.failing_texts.lock().unwrap().push(text.to_string());
    }

    pub fn fail_all_posts(&self, fail: bool) {
        self.fail_all_posts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn delay_fetch(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn posted_ids(&self) -> Vec<String> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn post_attempts(&self) -> usize {
        self.post_attempts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.fetch_calls() + self.post_attempts()
    }
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    async fn fetch_all(&self) -> Result<Vec<Record>, NetworkError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(NetworkError::Status(503));
        }
        Ok(self.remote())
    }

    async fn post_one(&self, record: &Record) -> Result<Record, NetworkError> {
        self.post_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self.fail_all_posts.load(Ordering::SeqCst)
            || self.failing_texts.lock().unwrap().contains(&record.text);
        if failing {
            return Err(NetworkError::Http("connection reset".to_string()));
        }

        self.posted.lock().unwrap().push(record.clone());
        let mut remote = self.remote.lock().unwrap();
        let stored = Record::new(
            format!("srv_{}", remote.len() + 1),
            record.text.clone(),
            record.category.clone(),
        )
        .with_source(RecordSource::Server);
        remote.push(stored.clone());
        Ok(stored)
    }
}
