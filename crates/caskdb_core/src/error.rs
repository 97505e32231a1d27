//! Error types for CaskDB core.

use crate::segment::record::ValueType;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in CaskDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] caskdb_storage::StorageError),

    /// The key is not present in the store.
    #[error("record does not exist: {key}")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// The stored value has a different type than the read requested.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The type the caller asked for.
        expected: ValueType,
        /// The type of the stored record.
        actual: ValueType,
    },

    /// The segment is corrupted or ends in a partial record.
    #[error("corrupt segment: {message}")]
    CorruptSegment {
        /// Description of the corruption.
        message: String,
    },

    /// A record's stored checksum does not match its value bytes.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Stored digest, hex-encoded.
        expected: String,
        /// Computed digest, hex-encoded.
        actual: String,
    },

    /// Segment rotation failed.
    #[error("rotation failed: {message}")]
    Rotation {
        /// Description of the failure.
        message: String,
    },

    /// Keys must be non-empty.
    #[error("key must not be empty")]
    EmptyKey,

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

impl CoreError {
    /// Creates a not-found error for the given key.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a corrupt-segment error.
    pub fn corrupt_segment(message: impl Into<String>) -> Self {
        Self::CorruptSegment {
            message: message.into(),
        }
    }

    /// Creates a rotation error.
    pub fn rotation(message: impl Into<String>) -> Self {
        Self::Rotation {
            message: message.into(),
        }
    }
}
