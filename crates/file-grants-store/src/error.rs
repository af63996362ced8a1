//! Error types for the store module.

use file_grants_core::{CoreError, GrantKey};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Column serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(#[from] CoreError),

    /// A mutation tried to change a field that is fixed at creation.
    #[error("grant {key:?}: field `{field}` is immutable")]
    ImmutableField { key: GrantKey, field: &'static str },

    /// Could not allocate a fresh key.
    #[error("failed to allocate a unique grant key")]
    KeyExhausted,

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Lock poisoned or blocking task failed.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
