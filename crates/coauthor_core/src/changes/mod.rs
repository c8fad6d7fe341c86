//! Change-diff pipeline: word-level diffing of candidate text into
//! attributable, position-anchored suggestion records.

mod record;
mod suggest;
mod word_diff;

pub use record::{Author, AuthorKind, ChangeKind, ChangeRecord, Position};
pub use suggest::{build_suggestions, normalize};
pub use word_diff::{DiffHunk, HunkKind, diff_words};
