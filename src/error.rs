//! Error types for consul_loader

use thiserror::Error;

/// Result type alias for consul_loader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while moving configuration around
///
/// Every variant is fatal for a CLI run; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to connect to KV backend: {0}")]
    BackendConnection(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Failed to find any data under key: {0}")]
    SourceNotFound(String),

    #[error("Failed to decode JSON: {0}")]
    JsonDecode(String),

    #[error("Conflicting key depth: {0} passes through or replaces an existing entry")]
    ConflictingKeyDepth(String),

    #[error("Unsupported value type at {path}: {kind}")]
    UnsupportedValueType { path: String, kind: &'static str },

    #[error("Failed to write key {key}: {reason}")]
    BackendWrite { key: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),
}
