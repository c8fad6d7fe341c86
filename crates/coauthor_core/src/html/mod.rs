//! Bidirectional conversion between markup and the structural tree.
//!
//! The importer tokenizes markup and builds tree nodes (side effect only);
//! the exporter walks a tree and serializes markup back out. For the
//! supported tag subset the pair round-trips: same tag structure, same mark
//! sets. Implicit normalizations (paragraph wrapping, thead/tbody splicing)
//! are applied on import and therefore visible after a round trip.

mod entities;
mod export;
mod import;
mod text;
mod tokens;

pub use entities::{escape_attr, escape_text, unescape};
pub use export::export_fragment;
pub(crate) use export::text_run_string;
pub use import::import_into;
pub use text::export_plain_text;
pub use tokens::{Token, tokenize};
