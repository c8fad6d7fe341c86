//! The engine façade: load/store hooks, the suggestion pipeline, external
//! overwrites, and version history.
//!
//! One instance serves every document, with per-document isolation. The
//! collaboration host calls [`CollabEngine::on_load`] / [`CollabEngine::on_store`]
//! around its sessions; request handlers call the remaining operations
//! directly.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::changes::{ChangeRecord, build_suggestions, normalize};
use crate::config::EngineConfig;
use crate::doc::DocTree;
use crate::error::{EngineError, Result};
use crate::protocol::SyncMessage;
use crate::registry::ReplicaRegistry;
use crate::store::{
    DocumentRecord, DocumentStore, SnapshotManager, SnapshotPolicy, VersionInfo,
};

/// Result of a suggestion run or a change-log read.
///
/// A run that finds nothing is a success with `changes_count: 0`, never an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChangeBatch {
    /// Number of records in `changes`
    pub changes_count: usize,

    /// The records, in diff-hunk order
    pub changes: Vec<ChangeRecord>,
}

impl ChangeBatch {
    fn empty() -> Self {
        Self {
            changes_count: 0,
            changes: Vec::new(),
        }
    }
}

/// The document synchronization engine.
pub struct CollabEngine {
    store: Arc<dyn DocumentStore>,
    registry: ReplicaRegistry,
    snapshots: SnapshotManager,
}

impl CollabEngine {
    /// Create an engine with default configuration.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, &EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(store: Arc<dyn DocumentStore>, config: &EngineConfig) -> Self {
        let snapshots = SnapshotManager::new(Arc::clone(&store), SnapshotPolicy::from_config(config));
        Self {
            store,
            registry: ReplicaRegistry::new(),
            snapshots,
        }
    }

    /// The live replica registry, for hosts that need lifecycle visibility.
    pub fn registry(&self) -> &ReplicaRegistry {
        &self.registry
    }

    /// Register a listener invoked when a document's replicas are evicted,
    /// so the host can sever its live connections at that moment.
    pub fn on_evict<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.registry.on_evict(listener);
    }

    // ==================== Document CRUD ====================

    /// Create a document. Fails if the id is taken or not filesystem-safe.
    pub fn create_document(&self, document_id: &str, title: &str) -> Result<()> {
        validate_document_id(document_id)?;
        if self.store.load_document(document_id)?.is_some() {
            return Err(EngineError::InvalidInput(format!(
                "document '{}' already exists",
                document_id
            )));
        }
        self.store
            .save_document(&DocumentRecord::new(document_id, title, now_ms()))
    }

    /// Soft-delete a document and evict its replicas. The record and its
    /// snapshots remain on disk.
    pub fn delete_document(&self, document_id: &str) -> Result<()> {
        self.store.mark_deleted(document_id)?;
        self.registry.evict(document_id);
        Ok(())
    }

    // ==================== Collaboration-host hooks ====================

    /// Load hook: hydrate (or return) the document's live replica.
    ///
    /// A missing record is a brand-new empty document, not an error. The
    /// persisted change log is replayed into CRDT space idempotently.
    pub fn on_load(&self, document_id: &str) -> Result<Arc<DocTree>> {
        let store = Arc::clone(&self.store);
        let id = document_id.to_string();
        self.registry.get_or_hydrate(document_id, move || {
            let record = store.load_document(&id)?;
            let Some(record) = record else {
                return Ok(DocTree::new());
            };
            if record.deleted {
                return Err(EngineError::NotFound(id));
            }

            let tree = if record.replica_state.is_empty() {
                DocTree::new()
            } else {
                match DocTree::hydrate(&record.replica_state) {
                    Ok(tree) => tree,
                    Err(e) => {
                        log::warn!("Failed to hydrate document '{}': {}", id, e);
                        DocTree::new()
                    }
                }
            };
            tree.replay_changes(&record.change_log)?;
            Ok(tree)
        })
    }

    /// Store hook: persist the live replica and conditionally snapshot.
    pub fn on_store(&self, document_id: &str) -> Result<()> {
        let Some(tree) = self.registry.get(document_id) else {
            return Err(EngineError::NotFound(document_id.to_string()));
        };
        let now = now_ms();

        let mut record = self
            .store
            .load_document(document_id)?
            .unwrap_or_else(|| DocumentRecord::new(document_id, document_id, now));
        record.replica_state = tree.encode();
        record.change_log = tree.changes();
        record.updated_at = now;
        self.store.save_document(&record)?;

        self.snapshots
            .maybe_snapshot(document_id, &record.replica_state, now)?;
        Ok(())
    }

    /// Apply a remote update delta to the document's replica.
    pub fn apply_remote_update(&self, document_id: &str, update: &[u8]) -> Result<()> {
        let tree = self.on_load(document_id)?;
        tree.apply_update(update)
    }

    /// Handle one frame from the live channel.
    ///
    /// Returns the reply frame, if the message calls for one. Transport
    /// noise is absorbed here: malformed frames produce `Ok(None)`.
    pub fn handle_sync_message(
        &self,
        document_id: &str,
        frame: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let message = match SyncMessage::decode(frame) {
            Ok(Some(message)) => message,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::debug!("Discarding undecodable frame for '{}': {}", document_id, e);
                return Ok(None);
            }
        };

        let tree = self.on_load(document_id)?;
        match message {
            SyncMessage::SyncStep1(state_vector) => {
                let diff = tree.encode_diff(&state_vector)?;
                Ok(Some(SyncMessage::SyncStep2(diff).encode()))
            }
            SyncMessage::SyncStep2(update) | SyncMessage::Update(update) => {
                tree.apply_update(&update)?;
                Ok(None)
            }
        }
    }

    // ==================== Suggestions ====================

    /// Diff an externally supplied candidate against the document's current
    /// text and append the resulting change records.
    ///
    /// Additive only: the document's merged text is untouched. Re-submitting
    /// the same candidate before records are reviewed re-diffs the unchanged
    /// baseline and appends a duplicate batch; see DESIGN.md.
    pub fn suggest_changes(
        &self,
        document_id: &str,
        candidate: &str,
        source: &str,
    ) -> Result<ChangeBatch> {
        self.load_live_record(document_id)?;
        let tree = self.on_load(document_id)?;

        let current = tree.export_text();
        if normalize(&current) == normalize(candidate) {
            return Ok(ChangeBatch::empty());
        }

        let records = build_suggestions(&current, candidate, source);
        if records.is_empty() {
            return Ok(ChangeBatch::empty());
        }

        tree.append_changes(&records)?;
        self.store.append_changes(document_id, &records)?;

        Ok(ChangeBatch {
            changes_count: records.len(),
            changes: records,
        })
    }

    /// Read the document's change log.
    pub fn get_change_log(&self, document_id: &str) -> Result<ChangeBatch> {
        let record = self.load_live_record(document_id)?;
        // A hydrated replica may hold records not yet flushed by a store event.
        let changes = match self.registry.get(document_id) {
            Some(tree) => tree.changes(),
            None => record.change_log,
        };
        Ok(ChangeBatch {
            changes_count: changes.len(),
            changes,
        })
    }

    // ==================== External overwrite & versions ====================

    /// Replace the document's content from markup, bypassing collaborative
    /// merge.
    ///
    /// The imported tree shares no causal history with live replicas, so it
    /// is never merged: the pre-overwrite state is snapshotted, the new
    /// encoding is persisted as sole truth, and every live replica is evicted
    /// in the same unit so the next access rehydrates from the new bytes.
    pub fn overwrite_content(&self, document_id: &str, markup: &str) -> Result<()> {
        let mut record = self.load_live_record(document_id)?;
        let now = now_ms();

        if !record.replica_state.is_empty() {
            self.snapshots
                .force_snapshot(document_id, &record.replica_state, now)?;
        }

        let tree = DocTree::new();
        tree.import_html(markup);
        tree.replay_changes(&record.change_log)?;

        record.replica_state = tree.encode();
        record.updated_at = now;

        let store = Arc::clone(&self.store);
        self.registry
            .replace_evicting(document_id, move || store.save_document(&record))
    }

    /// Replace the document's content from markdown (rendered to markup
    /// first).
    #[cfg(feature = "markdown")]
    pub fn overwrite_markdown(&self, document_id: &str, markdown: &str) -> Result<()> {
        self.overwrite_content(document_id, &crate::markdown::markdown_to_html(markdown))
    }

    /// List the document's version snapshots, oldest first.
    pub fn list_versions(&self, document_id: &str) -> Result<Vec<VersionInfo>> {
        self.load_live_record(document_id)?;
        self.snapshots.list(document_id)
    }

    /// Restore a version snapshot as the document's state.
    ///
    /// The current state is snapshotted first (undo-of-undo), then the
    /// chosen snapshot's bytes become sole truth and live replicas are
    /// evicted; a forced reload, not a merge.
    pub fn restore_version(&self, document_id: &str, version_id: i64) -> Result<()> {
        let mut record = self.load_live_record(document_id)?;
        let snapshot = self
            .store
            .load_snapshot(document_id, version_id)?
            .ok_or_else(|| {
                EngineError::NotFound(format!("{}/versions/{}", document_id, version_id))
            })?;

        let now = now_ms();
        if !record.replica_state.is_empty() {
            self.snapshots
                .force_snapshot(document_id, &record.replica_state, now)?;
        }

        record.replica_state = snapshot.state;
        record.updated_at = now;

        let store = Arc::clone(&self.store);
        self.registry
            .replace_evicting(document_id, move || store.save_document(&record))
    }

    /// Load a record, mapping missing or soft-deleted documents to NotFound.
    fn load_live_record(&self, document_id: &str) -> Result<DocumentRecord> {
        let record = self
            .store
            .load_document(document_id)?
            .ok_or_else(|| EngineError::NotFound(document_id.to_string()))?;
        if record.deleted {
            return Err(EngineError::NotFound(document_id.to_string()));
        }
        Ok(record)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Document ids name durable records, so they must be filesystem-safe.
fn validate_document_id(document_id: &str) -> Result<()> {
    let valid = !document_id.is_empty()
        && document_id != "."
        && document_id != ".."
        && document_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(EngineError::InvalidInput(format!(
            "'{}' is not a valid document id",
            document_id
        )));
    }
    Ok(())
}
