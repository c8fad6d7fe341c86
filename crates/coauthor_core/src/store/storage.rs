//! Storage abstraction for document persistence.
//!
//! [`DocumentStore`] abstracts over storage backends (SQLite, in-memory) for
//! the durable document record and the per-document snapshot collection.

use crate::changes::ChangeRecord;
use crate::error::EngineError;

use super::types::{DocumentRecord, VersionInfo, VersionSnapshot};

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, EngineError>;

/// Trait for document storage backends.
///
/// # Storage model
///
/// Two kinds of data per document:
/// 1. **Document record**: identity, timestamps, change log, and the
///    authoritative encoded replica state.
/// 2. **Snapshot collection**: bounded, immutable copies of the replica
///    state for version history and pre-overwrite safety.
pub trait DocumentStore: Send + Sync {
    /// Load a document record.
    ///
    /// Returns `None` if the document was never created. Soft-deleted
    /// documents are still returned; callers decide how to treat the
    /// tombstone.
    fn load_document(&self, document_id: &str) -> StoreResult<Option<DocumentRecord>>;

    /// Save a document record, overwriting any existing one.
    fn save_document(&self, record: &DocumentRecord) -> StoreResult<()>;

    /// Set the soft-deletion tombstone. The record itself is never removed.
    fn mark_deleted(&self, document_id: &str) -> StoreResult<()>;

    /// List all document ids, including soft-deleted ones.
    fn list_documents(&self) -> StoreResult<Vec<String>>;

    /// Append change records to a document's log without touching the rest
    /// of the record. Atomic: concurrent appends never overwrite prior
    /// entries.
    fn append_changes(&self, document_id: &str, records: &[ChangeRecord]) -> StoreResult<()>;

    /// Insert an immutable snapshot.
    fn insert_snapshot(&self, document_id: &str, snapshot: &VersionSnapshot) -> StoreResult<()>;

    /// Load one snapshot with its state payload.
    fn load_snapshot(
        &self,
        document_id: &str,
        snapshot_id: i64,
    ) -> StoreResult<Option<VersionSnapshot>>;

    /// List snapshots, oldest first.
    fn list_snapshots(&self, document_id: &str) -> StoreResult<Vec<VersionInfo>>;

    /// The newest snapshot's listing entry, if any.
    fn latest_snapshot(&self, document_id: &str) -> StoreResult<Option<VersionInfo>> {
        Ok(self.list_snapshots(document_id)?.into_iter().last())
    }

    /// Delete oldest snapshots until at most `keep` remain. Returns the
    /// number pruned.
    fn prune_snapshots(&self, document_id: &str, keep: usize) -> StoreResult<usize>;
}
