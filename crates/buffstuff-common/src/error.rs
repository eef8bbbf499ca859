//! Error types for persisted buff state.

use thiserror::Error;

use crate::version::SchemaVersion;

/// Errors raised while reading or writing persisted snapshots.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Blob does not start with the expected magic bytes
    #[error("Invalid snapshot format")]
    InvalidFormat,

    /// Schema version mismatch
    #[error("Incompatible snapshot version: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build writes
        expected: SchemaVersion,
        /// Version found in the blob
        found: SchemaVersion,
    },

    /// Header was valid but the payload could not be decoded
    #[error("Snapshot corrupted: {0}")]
    Corrupted(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
