//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entity not found. Often benign: deleting an already-deleted row
    /// during a race reports this and callers swallow it.
    #[error("{kind} {id:?} not found")]
    NotFound {
        /// Entity kind, e.g. `"auth request"`.
        kind: &'static str,
        /// Entity ID.
        id: String,
    },

    /// Create-time ID collision. IDs carry 128 bits of entropy, so a
    /// collision indicates a fatal server error, not a retry.
    #[error("{kind} {id:?} already exists")]
    AlreadyExists {
        /// Entity kind.
        kind: &'static str,
        /// Entity ID.
        id: String,
    },

    /// The backend does not implement the operation.
    #[error("storage backend does not support {0}")]
    Unsupported(&'static str),

    /// Backend failure: lost connection, serialization problem, or a
    /// mutator violating its contract.
    #[error("storage failure: {0}")]
    Internal(String),
}

impl StorageError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates an already-exists error.
    #[must_use]
    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    /// Whether this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is an already-exists error.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
