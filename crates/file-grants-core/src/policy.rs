//! Dirty-bit policies.

use serde::{Deserialize, Serialize};

use crate::grant::Grant;
use crate::identity::FileSignature;

/// Strategy for flagging a granted file as changed behind the origin's back.
///
/// Selected once, when the store is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyPolicy {
    /// Every access after the first is flagged.
    AlwaysDirty,
    /// Never flag reads; writes are still checked against the signature.
    NeverDirty,
    /// Flag iff the current signature differs from the last observed one.
    #[default]
    ChangedSinceLastAccess,
}

impl DirtyPolicy {
    /// Whether a read that currently sees `current` should be treated as stale.
    pub fn is_dirty(self, grant: &Grant, current: &FileSignature) -> bool {
        match self {
            DirtyPolicy::AlwaysDirty => grant.access_count > 0,
            DirtyPolicy::NeverDirty => false,
            DirtyPolicy::ChangedSinceLastAccess => *current != grant.last_known_signature,
        }
    }

    /// Whether a write that currently sees `current` would clobber changes
    /// the origin has not observed.
    ///
    /// Independent of the policy: the policy only shapes the read-side flag.
    pub fn write_conflicts(self, grant: &Grant, current: &FileSignature) -> bool {
        *current != grant.last_known_signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessMode, FileIdentity, FileLocation, GrantKey, NewGrant, Origin};

    fn grant_at(signature: FileSignature) -> Grant {
        let new = NewGrant {
            origin: Origin::new("https://a.example").unwrap(),
            identity: FileIdentity::new(1, 1),
            location: FileLocation::new("/d", "f"),
            signature,
            mode: AccessMode::ReadWrite,
        };
        Grant::from_new(GrantKey::from_bytes([1; 32]), new, 0)
    }

    #[test]
    fn test_changed_since_last_access() {
        let s0 = FileSignature::from_metadata(1, 1);
        let s1 = FileSignature::from_metadata(2, 1);
        let grant = grant_at(s0);

        let policy = DirtyPolicy::ChangedSinceLastAccess;
        assert!(!policy.is_dirty(&grant, &s0));
        assert!(policy.is_dirty(&grant, &s1));
        assert!(policy.write_conflicts(&grant, &s1));
    }

    #[test]
    fn test_always_dirty_after_first_access() {
        let s0 = FileSignature::from_metadata(1, 1);
        let mut grant = grant_at(s0);

        let policy = DirtyPolicy::AlwaysDirty;
        assert!(!policy.is_dirty(&grant, &s0));

        grant.observe(s0);
        assert!(policy.is_dirty(&grant, &s0));
        assert!(!policy.write_conflicts(&grant, &s0));
    }

    #[test]
    fn test_never_dirty() {
        let s0 = FileSignature::from_metadata(1, 1);
        let s1 = FileSignature::from_metadata(2, 5);
        let grant = grant_at(s0);

        let policy = DirtyPolicy::NeverDirty;
        assert!(!policy.is_dirty(&grant, &s1));
        assert!(policy.write_conflicts(&grant, &s1));
        assert!(!policy.write_conflicts(&grant, &s0));
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(DirtyPolicy::default(), DirtyPolicy::ChangedSinceLastAccess);
    }
}
