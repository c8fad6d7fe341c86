//! Durable record types for documents and version snapshots.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::changes::ChangeRecord;

/// The durable record for one document.
///
/// `replica_state` is the authoritative encoded structural tree. The change
/// log is mirrored here from CRDT space so it survives even when no replica
/// is hydrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Filesystem-safe document identifier
    pub document_id: String,

    /// Display title
    pub title: String,

    /// Unix timestamp (milliseconds) of creation
    pub created_at: i64,

    /// Unix timestamp (milliseconds) of the last store event
    pub updated_at: i64,

    /// Soft deletion tombstone
    pub deleted: bool,

    /// Suggested-change log, in append order
    pub change_log: Vec<ChangeRecord>,

    /// Encoded CRDT state of the structural tree
    pub replica_state: Vec<u8>,
}

impl DocumentRecord {
    /// Create a fresh record with empty state.
    pub fn new(document_id: &str, title: &str, now_ms: i64) -> Self {
        Self {
            document_id: document_id.to_string(),
            title: title.to_string(),
            created_at: now_ms,
            updated_at: now_ms,
            deleted: false,
            change_log: Vec::new(),
            replica_state: Vec::new(),
        }
    }
}

/// An immutable snapshot of a document's encoded replica state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSnapshot {
    /// Monotonic, timestamp-derived snapshot id
    pub id: i64,

    /// Unix timestamp (milliseconds) of creation
    pub created_at: i64,

    /// Encoded replica state at snapshot time
    pub state: Vec<u8>,
}

/// Snapshot listing entry, without the state payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VersionInfo {
    /// Snapshot id, usable with restore
    pub id: i64,

    /// Unix timestamp (milliseconds) of creation
    pub created_at: i64,
}

impl From<&VersionSnapshot> for VersionInfo {
    fn from(snapshot: &VersionSnapshot) -> Self {
        Self {
            id: snapshot.id,
            created_at: snapshot.created_at,
        }
    }
}
