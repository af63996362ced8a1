//! Operations and denial reasons.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grant::GrantState;

/// The kind of I/O a caller wants to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
}

/// Why an access was denied.
///
/// Unknown keys and keys owned by another origin both produce
/// `NoSuchGrant`, so a denial never reveals whether a key exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    #[error("no such grant")]
    NoSuchGrant,

    #[error("grant has been revoked")]
    Revoked,

    #[error("file was moved or deleted")]
    FileNotFound,

    #[error("grant does not permit writing")]
    ReadOnlyViolation,

    #[error("file changed since it was last read")]
    StaleRead,

    #[error("file changed on disk since it was last accessed")]
    FileChanged,
}

impl DenyReason {
    /// The denial a grant in a terminal state produces.
    pub fn for_state(state: GrantState) -> Option<Self> {
        match state {
            GrantState::Active => None,
            GrantState::Revoked => Some(DenyReason::Revoked),
            GrantState::Invalid => Some(DenyReason::FileNotFound),
        }
    }
}
