//! The suggest-changes pipeline: candidate text in, change records out.
//!
//! Diffs the document's exported text against an externally supplied
//! candidate and emits position-anchored, attributable records. The pipeline
//! is additive: it never touches the document's merged text, so the records
//! are pure review material.

use chrono::Utc;
use uuid::Uuid;

use super::record::{Author, ChangeKind, ChangeRecord, Position};
use super::word_diff::{HunkKind, diff_words};

/// Normalize line endings and surrounding whitespace before comparison.
pub fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Cursor over the original text, advanced by unchanged and removed hunks
/// only. Insertions consume no original characters and leave it in place.
/// Lines are 1-based; columns and offsets are 0-based.
#[derive(Debug)]
struct PositionCursor {
    line: u32,
    column: u32,
    offset: u32,
}

impl PositionCursor {
    fn new() -> Self {
        Self {
            line: 1,
            column: 0,
            offset: 0,
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
            self.offset += 1;
        }
    }
}

/// Build the change records turning `current` into `candidate`.
///
/// Returns an empty batch when the normalized texts agree. All records share
/// one synthetic sync author and one timestamp.
pub fn build_suggestions(current: &str, candidate: &str, source: &str) -> Vec<ChangeRecord> {
    let current = normalize(current);
    let candidate = normalize(candidate);
    if current == candidate {
        return Vec::new();
    }

    let author = Author::sync(source);
    let timestamp = Utc::now().timestamp_millis();
    let mut cursor = PositionCursor::new();
    let mut records = Vec::new();

    for hunk in diff_words(&current, &candidate) {
        match hunk.kind {
            HunkKind::Unchanged => cursor.advance(&hunk.text),
            HunkKind::Added => {
                records.push(ChangeRecord {
                    id: Uuid::new_v4(),
                    kind: ChangeKind::Insert,
                    anchor: cursor.position(),
                    content: Some(hunk.text),
                    old_content: None,
                    author: author.clone(),
                    timestamp,
                });
            }
            HunkKind::Removed => {
                let anchor = cursor.position();
                cursor.advance(&hunk.text);
                records.push(ChangeRecord {
                    id: Uuid::new_v4(),
                    kind: ChangeKind::Delete,
                    anchor,
                    content: None,
                    old_content: Some(hunk.text),
                    author: author.clone(),
                    timestamp,
                });
            }
        }
    }
    records
}
