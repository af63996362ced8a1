//! The access validator.
//!
//! Every read or write re-enters the same pipeline:
//!
//! ```text
//! LookupGrant -> CheckState -> CheckMode -> CheckFreshness -> Decide
//! ```
//!
//! The whole pipeline runs under the key's store lock, so it is atomic with
//! respect to every other validation or revocation on the same key, and any
//! state it changes is durable before the decision is returned. Identity
//! resolution touches the disk, so it runs on the blocking pool while the
//! lock is held.

use std::path::PathBuf;
use std::sync::Arc;

use file_grants_core::{
    now_millis, DenyReason, FileIdentity, FileLocation, FileSignature, FileSystem, Grant,
    GrantKey, Operation, Origin, Resolution,
};
use file_grants_store::GrantStore;

use crate::dirty::{DirtyTracker, Refresh};
use crate::error::Result;
use crate::revocation::invalidate_moved;

/// Outcome of a validation.
#[derive(Debug)]
pub enum Decision {
    /// The operation may proceed, exactly once.
    Allow(AccessTicket),
    /// The operation is refused.
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow(_) => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }

    /// The ticket, if allowed.
    pub fn into_ticket(self) -> Option<AccessTicket> {
        match self {
            Decision::Allow(ticket) => Some(ticket),
            Decision::Deny(_) => None,
        }
    }
}

/// Permission for a single I/O operation on a granted file.
///
/// Deliberately not `Clone`: a ticket is consumed by the operation it
/// authorizes.
#[derive(Debug)]
pub struct AccessTicket {
    key: GrantKey,
    origin: Origin,
    operation: Operation,
    identity: FileIdentity,
    location: FileLocation,
    signature: FileSignature,
    issued_at: i64,
}

impl AccessTicket {
    fn issue(grant: &Grant, operation: Operation, signature: FileSignature, now: i64) -> Self {
        Self {
            key: grant.key,
            origin: grant.origin.clone(),
            operation,
            identity: grant.identity,
            location: grant.location.clone(),
            signature,
            issued_at: now,
        }
    }

    pub fn key(&self) -> &GrantKey {
        &self.key
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Path the file system collaborator should perform the I/O on.
    pub fn path(&self) -> PathBuf {
        self.location.path()
    }

    /// Signature observed when the ticket was issued.
    pub fn signature(&self) -> FileSignature {
        self.signature
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }
}

/// Decides whether `(origin, key, operation)` is currently permitted.
pub struct AccessValidator<S, F> {
    store: Arc<S>,
    fs: Arc<F>,
    tracker: DirtyTracker,
}

impl<S: GrantStore, F: FileSystem + 'static> AccessValidator<S, F> {
    pub fn new(store: Arc<S>, fs: Arc<F>, tracker: DirtyTracker) -> Self {
        Self { store, fs, tracker }
    }

    pub fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    /// Validate a read. With `accept_stale`, a dirty grant is allowed and
    /// re-observes the file.
    pub async fn validate_read(
        &self,
        origin: &Origin,
        key: &GrantKey,
        accept_stale: bool,
    ) -> Result<Decision> {
        self.validate(origin, key, Operation::Read, accept_stale)
            .await
    }

    /// Validate a write. With `force`, a write over unobserved changes is
    /// allowed (overwrite semantics).
    pub async fn validate_write(
        &self,
        origin: &Origin,
        key: &GrantKey,
        force: bool,
    ) -> Result<Decision> {
        self.validate(origin, key, Operation::Write, force).await
    }

    /// Record the post-write signature after the collaborator performed the
    /// write a ticket authorized.
    ///
    /// Returns `false` if the grant is gone, no longer active, or the file
    /// can no longer be found (in which case the grant is invalidated).
    pub async fn finish_write(&self, ticket: AccessTicket) -> Result<bool> {
        if ticket.operation != Operation::Write {
            return Ok(false);
        }

        let guard = self.store.lock(&ticket.key).await;
        let current = self.store.load_locked(&guard).await?;
        let Some(grant) = current.filter(|g| g.is_active() && g.owned_by(&ticket.origin)) else {
            return Ok(false);
        };

        let resolution = self.resolve(&grant).await?;
        let tracker = self.tracker;
        let now = now_millis();
        let outcome = self
            .store
            .update_locked(&guard, |grant| -> Result<bool> {
                match tracker.classify(grant, resolution) {
                    Refresh::Observed(observation) => {
                        if let Some(location) = observation.renamed_to {
                            grant.location = location;
                        }
                        grant.last_known_signature = observation.new_signature;
                        grant.dirty = false;
                        Ok(true)
                    }
                    Refresh::Gone => {
                        invalidate_moved(grant, now)?;
                        Ok(false)
                    }
                }
            })
            .await?;
        drop(guard);

        let recorded = outcome.transpose()?.unwrap_or(false);
        tracing::debug!(key = ?ticket.key, recorded, "write finished");
        Ok(recorded)
    }

    async fn validate(
        &self,
        origin: &Origin,
        key: &GrantKey,
        operation: Operation,
        override_freshness: bool,
    ) -> Result<Decision> {
        let guard = self.store.lock(key).await;

        let decision = match self.store.load_locked(&guard).await? {
            None => Decision::Deny(DenyReason::NoSuchGrant),
            Some(grant) => match admit(&grant, origin, operation) {
                Some(reason) => Decision::Deny(reason),
                None => {
                    let resolution = self.resolve(&grant).await?;
                    let tracker = self.tracker;
                    let now = now_millis();
                    self.store
                        .update_locked(&guard, |grant| {
                            decide(grant, operation, override_freshness, &tracker, resolution, now)
                        })
                        .await?
                        .transpose()?
                        .unwrap_or(Decision::Deny(DenyReason::NoSuchGrant))
                }
            },
        };
        drop(guard);

        match &decision {
            Decision::Allow(_) => {
                tracing::debug!(%origin, ?key, ?operation, "access allowed");
            }
            Decision::Deny(reason) => {
                tracing::info!(%origin, ?key, ?operation, %reason, "access denied");
            }
        }

        Ok(decision)
    }

    /// Where the grant's identity lives now, asked on the blocking pool.
    async fn resolve(&self, grant: &Grant) -> Result<Resolution> {
        let fs = Arc::clone(&self.fs);
        let identity = grant.identity;
        let location = grant.location.clone();
        let resolution =
            tokio::task::spawn_blocking(move || fs.resolve(&identity, &location)).await??;
        Ok(resolution)
    }
}

/// The checks that need no disk access.
fn admit(grant: &Grant, origin: &Origin, operation: Operation) -> Option<DenyReason> {
    // LookupGrant: a foreign key looks exactly like a missing one.
    if !grant.owned_by(origin) {
        return Some(DenyReason::NoSuchGrant);
    }

    // CheckState
    if let Some(reason) = DenyReason::for_state(grant.state) {
        return Some(reason);
    }

    // CheckMode
    if !grant.mode.allows(operation) {
        return Some(DenyReason::ReadOnlyViolation);
    }

    None
}

/// Freshness and decision, inside the key's atomic section.
fn decide(
    grant: &mut Grant,
    operation: Operation,
    override_freshness: bool,
    tracker: &DirtyTracker,
    resolution: Resolution,
    now: i64,
) -> Result<Decision> {
    // CheckFreshness
    let observation = match tracker.classify(grant, resolution) {
        Refresh::Gone => {
            invalidate_moved(grant, now)?;
            return Ok(Decision::Deny(DenyReason::FileNotFound));
        }
        Refresh::Observed(observation) => observation,
    };

    let checked = match operation {
        Operation::Read => tracker.check_read(grant, observation, override_freshness),
        Operation::Write => tracker.check_write(grant, observation, override_freshness),
    };

    // Decide
    Ok(match checked {
        Ok(signature) => Decision::Allow(AccessTicket::issue(grant, operation, signature, now)),
        Err(reason) => Decision::Deny(reason),
    })
}
