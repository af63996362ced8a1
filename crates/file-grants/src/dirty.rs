//! Identity and dirty tracking.
//!
//! At access time the validator asks the file system where the grant's
//! identity lives now and what its signature is. The tracker classifies that
//! answer, then applies the configured [`DirtyPolicy`] to decide whether the
//! access sees unobserved changes.
//!
//! The tracker never touches the disk and only mutates the grant it is
//! handed. Persisting the result is the store's job, inside the same atomic
//! section.

use file_grants_core::{DenyReason, DirtyPolicy, FileLocation, FileSignature, Grant, Resolution};

/// What the file system reports for a grant right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    /// The identity no longer resolves (deleted, or moved out of its
    /// directory).
    Gone,
    /// The file is still reachable.
    Observed(Observation),
}

/// A successful identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Whether the current signature equals `last_known_signature`.
    pub signature_matches: bool,
    /// The signature on disk now.
    pub new_signature: FileSignature,
    /// New location if the file was renamed within its directory.
    pub renamed_to: Option<FileLocation>,
}

/// Applies a [`DirtyPolicy`] to grants at access time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyTracker {
    policy: DirtyPolicy,
}

impl DirtyTracker {
    pub fn new(policy: DirtyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DirtyPolicy {
        self.policy
    }

    /// Compare what the file system resolved for the grant's identity with
    /// what the grant remembers.
    ///
    /// A same-directory rename is reported as an observation with
    /// `renamed_to` set. Finding the identity in another directory counts
    /// as a move, which is reported as `Gone`.
    pub fn classify(&self, grant: &Grant, resolution: Resolution) -> Refresh {
        let (location, signature) = match resolution {
            Resolution::Gone => return Refresh::Gone,
            Resolution::Found {
                location,
                signature,
            } => (location, signature),
        };

        let renamed_to = if location == grant.location {
            None
        } else if location.is_rename_of(&grant.location) {
            tracing::debug!(key = ?grant.key, "granted file renamed in place");
            Some(location)
        } else {
            tracing::debug!(key = ?grant.key, "granted file moved to another directory");
            return Refresh::Gone;
        };

        Refresh::Observed(Observation {
            signature_matches: signature == grant.last_known_signature,
            new_signature: signature,
            renamed_to,
        })
    }

    /// Freshness check for a read.
    ///
    /// Denies `StaleRead` when the policy flags the grant dirty and the
    /// caller did not accept stale data; the dirty bit is left set. An
    /// allowed read re-observes the file and clears the bit.
    pub fn check_read(
        &self,
        grant: &mut Grant,
        observation: Observation,
        accept_stale: bool,
    ) -> Result<FileSignature, DenyReason> {
        if let Some(location) = observation.renamed_to {
            grant.location = location;
        }

        let current = observation.new_signature;
        if self.policy.is_dirty(grant, &current) && !accept_stale {
            grant.dirty = true;
            return Err(DenyReason::StaleRead);
        }

        grant.observe(current);
        Ok(current)
    }

    /// Freshness check for a write.
    ///
    /// Denies `FileChanged` when the file differs from what the origin last
    /// observed, unless `force` is set. An allowed write records the current
    /// signature; the post-write signature is recorded when the caller
    /// finishes the write.
    pub fn check_write(
        &self,
        grant: &mut Grant,
        observation: Observation,
        force: bool,
    ) -> Result<FileSignature, DenyReason> {
        if let Some(location) = observation.renamed_to {
            grant.location = location;
        }

        let current = observation.new_signature;
        if self.policy.write_conflicts(grant, &current) && !force {
            grant.dirty = true;
            return Err(DenyReason::FileChanged);
        }

        grant.observe(current);
        Ok(current)
    }
}
