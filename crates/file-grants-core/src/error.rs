//! Error types for the File Grants Core.

use thiserror::Error;

/// Errors raised while constructing or parsing core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("invalid grant key: {0}")]
    InvalidKey(String),

    #[error("unknown access mode tag: {0}")]
    UnknownMode(u8),

    #[error("unknown grant state tag: {0}")]
    UnknownState(u8),

    #[error("illegal state transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: crate::GrantState,
        to: crate::GrantState,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
