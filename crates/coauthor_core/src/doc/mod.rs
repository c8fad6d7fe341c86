//! Structural tree model: the CRDT-backed representation of a rich-text
//! document and its closed node/mark schema.

mod schema;
mod tree;

pub use schema::{
    BlockKind, BlockTag, LEVEL_ATTR, Mark, TagClass, classify_markup, is_void_markup,
    marks_from_attrs, marks_to_attrs,
};
pub use tree::{CHANGES_ARRAY_NAME, CONTENT_FRAGMENT_NAME, DocTree};
