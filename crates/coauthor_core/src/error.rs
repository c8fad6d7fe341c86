use serde::Serialize;
use thiserror::Error;

/// Unified error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown document id on a read or update operation
    #[error("document '{0}' not found")]
    NotFound(String),

    /// Caller-supplied input that the engine cannot act on
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// CRDT decode/apply failure
    #[error("CRDT error: {0}")]
    Crdt(String),

    /// Durable state could not be read or written
    #[error("persistence error: {0}")]
    Persistence(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// A serializable representation of EngineError for IPC (e.g., Tauri, WASM hosts)
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
}

impl From<&EngineError> for SerializableError {
    fn from(err: &EngineError) -> Self {
        let kind = match err {
            EngineError::NotFound(_) => "NotFound",
            EngineError::InvalidInput(_) => "InvalidInput",
            EngineError::Crdt(_) => "Crdt",
            EngineError::Persistence(_) => "Persistence",
            EngineError::Io(_) => "Io",
            #[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
            EngineError::Sqlite(_) => "Sqlite",
            EngineError::ConfigParse(_) => "ConfigParse",
            EngineError::ConfigSerialize(_) => "ConfigSerialize",
            EngineError::NoConfigDir => "NoConfigDir",
        }
        .to_string();

        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<EngineError> for SerializableError {
    fn from(err: EngineError) -> Self {
        SerializableError::from(&err)
    }
}

impl EngineError {
    /// Convert to a serializable representation for IPC
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}
