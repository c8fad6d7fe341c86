//! Attributable change records: the reviewable suggestion log.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Color assigned to synthetic sync authors.
const SYNC_AUTHOR_COLOR: &str = "#8b5cf6";

/// Who produced a change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum AuthorKind {
    /// A person editing through a client
    Human,
    /// An AI assistant acting on the document
    Ai,
    /// The external-write reconciliation path
    Sync,
}

/// Author attribution carried on every change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Author {
    /// Stable author id
    pub id: String,

    /// Attribution category
    pub kind: AuthorKind,

    /// Display name
    pub name: String,

    /// Display color (CSS hex)
    pub color: String,
}

impl Author {
    /// The synthetic author shared by all records of one sync batch.
    pub fn sync(source: &str) -> Self {
        Self {
            id: format!("sync:{}", source),
            kind: AuthorKind::Sync,
            name: source.to_string(),
            color: SYNC_AUTHOR_COLOR.to_string(),
        }
    }
}

/// Whether a record suggests inserting or deleting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[allow(missing_docs)]
pub enum ChangeKind {
    Insert,
    Delete,
}

/// A location in the pre-diff text.
///
/// Tracked by walking original characters: unchanged and removed text
/// advances the cursor, insertions do not (they consume no original text).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// One-based line
    pub line: u32,

    /// Zero-based column within the line
    pub column: u32,

    /// Absolute character offset
    pub offset: u32,
}

/// One attributable suggested change.
///
/// Records are additive review material; they never mutate the document's
/// merged text until a client accepts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChangeRecord {
    /// Unique record id
    pub id: Uuid,

    /// Insert or delete
    pub kind: ChangeKind,

    /// Anchor position in the pre-diff text
    pub anchor: Position,

    /// Text to insert (Insert records)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Text being removed (Delete records)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,

    /// Attribution
    pub author: Author,

    /// Unix timestamp (milliseconds), shared by all records of one batch
    pub timestamp: i64,
}
