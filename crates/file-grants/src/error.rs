//! Error types for the grant engine.
//!
//! Denials are not errors: a denied access is a normal [`Decision`] value.
//! This type only covers infrastructure failures and grant creation.
//!
//! [`Decision`]: crate::Decision

use std::path::PathBuf;

use file_grants_core::{CoreError, FsError};
use file_grants_store::StoreError;
use thiserror::Error;

/// Errors that can occur during grant operations.
#[derive(Debug, Error)]
pub enum GrantsError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// File system collaborator error during an access check.
    #[error("file system error: {0}")]
    FileSystem(#[from] FsError),

    /// A blocking file system call could not be completed.
    #[error("file system task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Core value error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The picked file could not be given a stable identity.
    #[error("file identity unavailable for {path}: {source}")]
    IdentityUnavailable {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for grant operations.
pub type Result<T> = std::result::Result<T, GrantsError>;
