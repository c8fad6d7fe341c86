#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Configuration options
pub mod config;

/// Structural tree model (CRDT-backed rich text)
pub mod doc;

/// Error (common error types)
pub mod error;

/// Markup import/export and plain-text rendering
pub mod html;

/// Suggested-change pipeline (word diff, change records)
pub mod changes;

/// Markdown rendering (feature `markdown`)
#[cfg(feature = "markdown")]
pub mod markdown;

/// Live-channel framing boundary
pub mod protocol;

/// Live replica registry
pub mod registry;

/// Durable document and snapshot storage
pub mod store;

/// The engine façade
pub mod engine;

pub use engine::{ChangeBatch, CollabEngine};
pub use error::{EngineError, Result};
