//! In-memory metadata store

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{MetadataStore, StreamRecord};
use crate::registry::StreamId;

/// Metadata store backed by a map, mutable at runtime
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, StreamRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a set of records
    pub fn from_records(records: impl IntoIterator<Item = StreamRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Insert or replace a record
    pub fn insert(&self, record: StreamRecord) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.id.clone(), record);
    }

    /// Remove a record
    pub fn remove(&self, id: &StreamId) -> Option<StreamRecord> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id.as_str())
    }
}

impl MetadataStore for MemoryStore {
    fn lookup(&self, id: &StreamId) -> Option<StreamRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id.as_str())
            .cloned()
    }

    fn list(&self) -> Vec<StreamRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}
