//! Grant records.
//!
//! A grant binds one origin to one file object with a fixed access mode.
//! Everything a validation needs lives on the record; nothing is cached
//! elsewhere between calls.

use serde::{Deserialize, Serialize};

use crate::decision::Operation;
use crate::error::{CoreError, Result};
use crate::identity::{FileIdentity, FileLocation, FileSignature};
use crate::key::{GrantKey, Origin};

/// What a grant allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    /// Whether this mode permits the operation.
    pub fn allows(self, op: Operation) -> bool {
        match op {
            Operation::Read => true,
            Operation::Write => self == AccessMode::ReadWrite,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            AccessMode::ReadOnly => 0,
            AccessMode::ReadWrite => 1,
        }
    }

    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(AccessMode::ReadOnly),
            1 => Ok(AccessMode::ReadWrite),
            other => Err(CoreError::UnknownMode(other)),
        }
    }
}

/// Lifecycle state of a grant.
///
/// `Revoked` and `Invalid` are terminal: a grant never returns to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    Active,
    /// Revoked by the user.
    Revoked,
    /// The file was moved or deleted.
    Invalid,
}

impl GrantState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GrantState::Active)
    }

    pub fn as_u8(self) -> u8 {
        match self {
            GrantState::Active => 0,
            GrantState::Revoked => 1,
            GrantState::Invalid => 2,
        }
    }

    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(GrantState::Active),
            1 => Ok(GrantState::Revoked),
            2 => Ok(GrantState::Invalid),
            other => Err(CoreError::UnknownState(other)),
        }
    }
}

/// Input to grant creation, produced by the file picker path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    pub origin: Origin,
    pub identity: FileIdentity,
    pub location: FileLocation,
    pub signature: FileSignature,
    pub mode: AccessMode,
}

/// A persisted grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// The capability token.
    pub key: GrantKey,

    /// The origin allowed to use this grant.
    pub origin: Origin,

    /// Identity of the target file at creation time. Never changes.
    pub identity: FileIdentity,

    /// Where the file was last seen.
    pub location: FileLocation,

    pub mode: AccessMode,

    /// Signature recorded at the most recent successful access.
    pub last_known_signature: FileSignature,

    /// Set when the file changed and the origin has not re-observed it.
    pub dirty: bool,

    pub state: GrantState,

    /// Number of allowed accesses so far.
    pub access_count: u64,

    /// Creation time (Unix milliseconds).
    pub created_at: i64,

    /// When the grant left `Active` (Unix milliseconds).
    pub state_changed_at: Option<i64>,
}

impl Grant {
    /// Build an `Active` grant from creation input.
    pub fn from_new(key: GrantKey, new: NewGrant, now: i64) -> Self {
        Self {
            key,
            origin: new.origin,
            identity: new.identity,
            location: new.location,
            mode: new.mode,
            last_known_signature: new.signature,
            dirty: false,
            state: GrantState::Active,
            access_count: 0,
            created_at: now,
            state_changed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == GrantState::Active
    }

    /// Whether `origin` owns this grant.
    pub fn owned_by(&self, origin: &Origin) -> bool {
        self.origin.ct_matches(origin)
    }

    /// Move to a new lifecycle state.
    ///
    /// Returns `Ok(true)` if the state changed, `Ok(false)` for a no-op
    /// (already there, or `Revoked` asked to become `Invalid`). Leaving a
    /// terminal state for `Active` is an error.
    pub fn transition(&mut self, to: GrantState, now: i64) -> Result<bool> {
        let from = self.state;
        let apply = match (from, to) {
            (a, b) if a == b => false,
            (GrantState::Active, _) => true,
            (GrantState::Invalid, GrantState::Revoked) => true,
            (GrantState::Revoked, GrantState::Invalid) => false,
            _ => return Err(CoreError::IllegalTransition { from, to }),
        };

        if apply {
            self.state = to;
            self.state_changed_at = Some(now);
        }
        Ok(apply)
    }

    /// Record a successful observation of the file at `signature`.
    pub fn observe(&mut self, signature: FileSignature) {
        self.last_known_signature = signature;
        self.dirty = false;
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Whether a terminal grant is old enough to be destroyed.
    pub fn is_collectable(&self, cutoff: i64) -> bool {
        self.state.is_terminal() && self.state_changed_at.is_some_and(|at| at <= cutoff)
    }

    /// Projection for the settings surface.
    pub fn summary(&self) -> GrantSummary {
        GrantSummary {
            key: self.key,
            display_name: self.location.display_name().to_string(),
            mode: self.mode,
            state: self.state,
        }
    }
}

/// What the per-origin settings surface shows for a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSummary {
    pub key: GrantKey,
    pub display_name: String,
    pub mode: AccessMode,
    pub state: GrantState,
}
