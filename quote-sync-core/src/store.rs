//! Local replica.
//!
//! The record store is the only owner of the in-memory record collection.
//! Every mutation is written to the backend before it becomes visible, and
//! rolled back if that write fails, so memory never runs ahead of what is
//! persisted.

use std::fmt;
use std::sync::Arc;

use rand::seq::IndexedRandom;
use serde::Serialize;

use crate::error::{EngineError, PersistenceError};
use crate::ids::IdGenerator;
use crate::models::{default_records, RawRecord, Record};
use crate::queue::MutationKind;
use crate::storage::{load_json, save_json, KeyValueStore, StorageKey};

/// Summary counts over the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuoteStats {
    pub total: usize,
    pub categories: usize,
}

pub struct RecordStore {
    backend: Arc<dyn KeyValueStore>,
    records: Vec<Record>,
}

impl RecordStore {
    /// Loads the replica from `records`.
    ///
    /// Missing or unreadable data yields the default quotes. Entries that do
    /// not validate are dropped; entries without an id get one from `ids`.
    pub fn load(backend: Arc<dyn KeyValueStore>, ids: &dyn IdGenerator) -> Self {
        let records = match load_json::<Vec<serde_json::Value>>(backend.as_ref(), StorageKey::Records)
        {
            Some(values) => Self::validate_all(values, ids),
            None => default_records(),
        };

        Self { backend, records }
    }

    fn validate_all(values: Vec<serde_json::Value>, ids: &dyn IdGenerator) -> Vec<Record> {
        let mut records = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            match RawRecord::from_value(value).and_then(|raw| raw.into_record(ids)) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Dropping stored record #{}: {}", index, e),
            }
        }
        records
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Writes `records` to the backend without touching memory.
    pub fn save(&self, records: &[Record]) -> Result<(), PersistenceError> {
        save_json(self.backend.as_ref(), StorageKey::Records, records)
    }

    /// Inserts or updates one record and persists the replica.
    ///
    /// A record whose id is already present replaces it in place; anything
    /// else is appended. On a failed write the change is undone.
    pub fn apply_mutation(&mut self, record: Record) -> Result<MutationKind, EngineError> {
        record.validate()?;

        match self.records.iter().position(|r| r.id == record.id) {
            Some(i) => {
                let previous = std::mem::replace(&mut self.records[i], record);
                if let Err(e) = self.save(&self.records) {
                    self.records[i] = previous;
                    return Err(e.into());
                }
                Ok(MutationKind::Update)
            }
            None => {
                self.records.push(record);
                if let Err(e) = self.save(&self.records) {
                    self.records.pop();
                    return Err(e.into());
                }
                Ok(MutationKind::Add)
            }
        }
    }

    /// Persists a whole replica, then swaps it in.
    pub fn replace_all(&mut self, records: Vec<Record>) -> Result<(), PersistenceError> {
        self.save(&records)?;
        self.records = records;
        Ok(())
    }

    /// Swaps the record stored under `id` for `record`, which may carry a
    /// different id. Returns false when `id` is not present.
    pub fn replace(&mut self, id: &str, record: Record) -> Result<bool, EngineError> {
        record.validate()?;
        let Some(i) = self.records.iter().position(|r| r.id == id) else {
            return Ok(false);
        };

        let previous = std::mem::replace(&mut self.records[i], record);
        if let Err(e) = self.save(&self.records) {
            self.records[i] = previous;
            return Err(e.into());
        }
        Ok(true)
    }

    /// Removes a record by id. Returns `None` if there was nothing to remove.
    pub fn remove(&mut self, id: &str) -> Result<Option<Record>, PersistenceError> {
        let Some(i) = self.records.iter().position(|r| r.id == id) else {
            return Ok(None);
        };

        let removed = self.records.remove(i);
        if let Err(e) = self.save(&self.records) {
            self.records.insert(i, removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for record in &self.records {
            if !categories.contains(&record.category) {
                categories.push(record.category.clone());
            }
        }
        categories
    }

    /// Records whose category contains `term`, ignoring case.
    pub fn filter_by_category(&self, term: &str) -> Vec<Record> {
        let term = term.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.category.to_lowercase().contains(&term))
            .cloned()
            .collect()
    }

    /// Records whose text contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> Vec<Record> {
        let term = term.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.text.to_lowercase().contains(&term))
            .cloned()
            .collect()
    }

    pub fn random(&self) -> Option<Record> {
        self.records.choose(&mut rand::rng()).cloned()
    }

    pub fn random_from_category(&self, term: &str) -> Option<Record> {
        self.filter_by_category(term)
            .choose(&mut rand::rng())
            .cloned()
    }

    pub fn stats(&self) -> QuoteStats {
        QuoteStats {
            total: self.records.len(),
            categories: self.categories().len(),
        }
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("records", &self.records)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::ids::SequentialIds;
    use crate::storage::MemoryStore;
    use crate::testing::FailingStore;

    fn load(backend: Arc<dyn KeyValueStore>) -> RecordStore {
        RecordStore::load(backend, &SequentialIds::new("legacy"))
    }

    #[test]
    fn test_load_missing_gives_defaults() {
        let store = load(Arc::new(MemoryStore::new()));
        assert_eq!(store.records(), default_records().as_slice());
    }

    #[test]
    fn test_load_corrupt_gives_defaults() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(StorageKey::Records, "not json at all").unwrap();
        let store = load(backend);
        assert_eq!(store.len(), default_records().len());
    }

    #[test]
    fn test_load_drops_malformed_entries() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(
                StorageKey::Records,
                r#"[{"id":"a","text":"Ok","category":"C"},{"text":"No category"},{"text":"Legacy","category":"Old"},7]"#,
            )
            .unwrap();

        let store = load(backend);
        let ids: Vec<&str> = store.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "legacy_1"]);
    }

    #[test]
    fn test_apply_mutation_survives_reload() {
        let backend = Arc::new(MemoryStore::new());
        let mut store = load(backend.clone());
        let before = store.len();

        let kind = store
            .apply_mutation(Record::new("local_1", "New quote", "Fresh"))
            .unwrap();
        assert_eq!(kind, MutationKind::Add);

        let reloaded = load(backend);
        assert_eq!(reloaded.len(), before + 1);
        assert_eq!(reloaded.records(), store.records());
    }

    #[test]
    fn test_apply_mutation_updates_in_place() {
        let backend = Arc::new(MemoryStore::new());
        let mut store = load(backend);
        let first_id = store.records()[0].id.clone();

        let kind = store
            .apply_mutation(Record::new(first_id.clone(), "Edited", "Motivation"))
            .unwrap();

        assert_eq!(kind, MutationKind::Update);
        assert_eq!(store.records()[0].text, "Edited");
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn test_apply_mutation_rolls_back_on_failed_write() {
        let backend = Arc::new(FailingStore::new());
        let mut store = load(backend.clone());
        let before = store.records().to_vec();

        backend.fail_writes(true);
        let result = store.apply_mutation(Record::new("local_1", "Lost", "C"));

        assert!(matches!(result, Err(EngineError::Persistence(_))));
        assert_eq!(store.records(), before.as_slice());

        let update = store.apply_mutation(Record::new(before[0].id.clone(), "Lost", "C"));
        assert!(update.is_err());
        assert_eq!(store.records(), before.as_slice());
    }

    #[test]
    fn test_apply_mutation_rejects_invalid_record() {
        let mut store = load(Arc::new(MemoryStore::new()));
        let result = store.apply_mutation(Record::new("x", "", "C"));
        assert!(matches!(
            result,
            Err(EngineError::Validation(ValidationError::EmptyText))
        ));
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn test_replace_all_and_remove_roll_back() {
        let backend = Arc::new(FailingStore::new());
        let mut store = load(backend.clone());

        backend.fail_writes(true);
        assert!(store.replace_all(Vec::new()).is_err());
        assert_eq!(store.len(), 8);
        assert!(store.remove("default_1").is_err());
        assert!(store.get("default_1").is_some());

        backend.fail_writes(false);
        let removed = store.remove("default_1").unwrap();
        assert_eq!(removed.map(|r| r.id), Some("default_1".to_string()));
        assert!(store.remove("default_1").unwrap().is_none());
    }

    #[test]
    fn test_replace_swaps_id() {
        let mut store = load(Arc::new(MemoryStore::new()));
        let replaced = store
            .replace("default_2", Record::new("77", "Swapped", "Server"))
            .unwrap();

        assert!(replaced);
        assert!(store.get("default_2").is_none());
        assert_eq!(store.records()[1].id, "77");
        assert!(!store.replace("missing", Record::new("x", "y", "z")).unwrap());
    }

    #[test]
    fn test_filter_and_search_ignore_case() {
        let store = load(Arc::new(MemoryStore::new()));
        let life = store.filter_by_category("LIF");
        assert_eq!(life.len(), 1);
        assert_eq!(life[0].category, "Life");

        let found = store.search("great");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_random_from_category() {
        let store = load(Arc::new(MemoryStore::new()));
        let quote = store.random_from_category("hope").unwrap();
        assert_eq!(quote.category, "Hope");
        assert!(store.random_from_category("nothing").is_none());
        assert!(store.random().is_some());
    }

    #[test]
    fn test_stats() {
        let mut store = load(Arc::new(MemoryStore::new()));
        store
            .apply_mutation(Record::new("local_1", "Another", "Life"))
            .unwrap();
        assert_eq!(
            store.stats(),
            QuoteStats {
                total: 9,
                categories: 8
            }
        );
    }
}
