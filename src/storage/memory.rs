//! In-memory storage backend.
//!
//! Thread-safe reference implementation of [`RecordStore`], intended for
//! embedded usage and tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::storage::traits::{RecordKind, RecordStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Thread-safe in-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<(RecordKind, String), serde_json::Value>>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of a kind.
    pub fn count(&self, kind: RecordKind) -> Result<usize, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("record.count"))?;
        Ok(records.keys().filter(|(k, _)| *k == kind).count())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn put(&self, kind: RecordKind, id: &str, value: serde_json::Value) -> Result<(), StorageError> {
        if id.trim().is_empty() {
            return Err(StorageError::BackendError(format!(
                "empty record id for kind {kind}"
            )));
        }
        let mut records = self.records.write().map_err(|_| lock_err("record.put"))?;
        records.insert((kind, id.to_string()), value);
        Ok(())
    }

    fn get(&self, kind: RecordKind, id: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("record.get"))?;
        Ok(records.get(&(kind, id.to_string())).cloned())
    }

    fn list(&self, kind: RecordKind) -> Result<Vec<(String, serde_json::Value)>, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("record.list"))?;
        Ok(records
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, id), v)| (id.clone(), v.clone()))
            .collect())
    }
}
