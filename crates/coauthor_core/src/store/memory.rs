//! In-memory storage implementation for testing.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::changes::ChangeRecord;
use crate::error::EngineError;

use super::storage::{DocumentStore, StoreResult};
use super::types::{DocumentRecord, VersionInfo, VersionSnapshot};

/// In-memory document store.
///
/// Thread-safe via `RwLock`; data is lost when dropped. Used in unit tests
/// and as the default backend for hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, DocumentRecord>>,
    snapshots: RwLock<HashMap<String, Vec<VersionSnapshot>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn load_document(&self, document_id: &str) -> StoreResult<Option<DocumentRecord>> {
        let documents = self.documents.read().unwrap();
        Ok(documents.get(document_id).cloned())
    }

    fn save_document(&self, record: &DocumentRecord) -> StoreResult<()> {
        let mut documents = self.documents.write().unwrap();
        documents.insert(record.document_id.clone(), record.clone());
        Ok(())
    }

    fn mark_deleted(&self, document_id: &str) -> StoreResult<()> {
        let mut documents = self.documents.write().unwrap();
        match documents.get_mut(document_id) {
            Some(record) => {
                record.deleted = true;
                Ok(())
            }
            None => Err(EngineError::NotFound(document_id.to_string())),
        }
    }

    fn list_documents(&self) -> StoreResult<Vec<String>> {
        let documents = self.documents.read().unwrap();
        Ok(documents.keys().cloned().collect())
    }

    fn append_changes(&self, document_id: &str, records: &[ChangeRecord]) -> StoreResult<()> {
        let mut documents = self.documents.write().unwrap();
        match documents.get_mut(document_id) {
            Some(record) => {
                record.change_log.extend_from_slice(records);
                Ok(())
            }
            None => Err(EngineError::NotFound(document_id.to_string())),
        }
    }

    fn insert_snapshot(&self, document_id: &str, snapshot: &VersionSnapshot) -> StoreResult<()> {
        let mut snapshots = self.snapshots.write().unwrap();
        let entry = snapshots.entry(document_id.to_string()).or_default();
        entry.push(snapshot.clone());
        entry.sort_by_key(|s| s.id);
        Ok(())
    }

    fn load_snapshot(
        &self,
        document_id: &str,
        snapshot_id: i64,
    ) -> StoreResult<Option<VersionSnapshot>> {
        let snapshots = self.snapshots.read().unwrap();
        Ok(snapshots
            .get(document_id)
            .and_then(|list| list.iter().find(|s| s.id == snapshot_id).cloned()))
    }

    fn list_snapshots(&self, document_id: &str) -> StoreResult<Vec<VersionInfo>> {
        let snapshots = self.snapshots.read().unwrap();
        Ok(snapshots
            .get(document_id)
            .map(|list| list.iter().map(VersionInfo::from).collect())
            .unwrap_or_default())
    }

    fn prune_snapshots(&self, document_id: &str, keep: usize) -> StoreResult<usize> {
        let mut snapshots = self.snapshots.write().unwrap();
        let Some(list) = snapshots.get_mut(document_id) else {
            return Ok(0);
        };
        if list.len() <= keep {
            return Ok(0);
        }
        let drop_count = list.len() - keep;
        list.drain(0..drop_count);
        Ok(drop_count)
    }
}
