//! Revocation and cleanup.
//!
//! Every path here either moves a grant to a terminal state or destroys
//! records. State only moves forward: nothing in this module can make a
//! grant `Active` again.

use std::sync::Arc;

use file_grants_core::{Grant, GrantKey, GrantState, Origin};
use file_grants_store::GrantStore;

use crate::error::Result;

/// Invalidate a grant whose file no longer resolves where it was granted.
///
/// Every invalidation goes through here, whether the validator noticed the
/// move or [`RevocationManager::revoke_on_move`] was told about it. Returns
/// whether the state changed.
pub(crate) fn invalidate_moved(grant: &mut Grant, now: i64) -> Result<bool> {
    let changed = grant.transition(GrantState::Invalid, now)?;
    if changed {
        tracing::warn!(key = ?grant.key, "granted file no longer resolves, grant invalidated");
    }
    Ok(changed)
}

/// Applies revocation, invalidation and garbage collection to a store.
pub struct RevocationManager<S> {
    store: Arc<S>,
}

impl<S: GrantStore> RevocationManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The origin revokes one of its own grants.
    ///
    /// Idempotent. Returns `false` if `origin` holds no grant under `key`,
    /// so a foreign key cannot be probed or revoked.
    pub async fn revoke_by_user(&self, origin: &Origin, key: &GrantKey, now: i64) -> Result<bool> {
        let outcome = self
            .store
            .update(key, |grant| {
                if !grant.owned_by(origin) {
                    return Ok(None);
                }
                grant.transition(GrantState::Revoked, now).map(Some)
            })
            .await?;

        match outcome.transpose()?.flatten() {
            Some(changed) => {
                if changed {
                    tracing::info!(%origin, ?key, "grant revoked");
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The granted file was moved out of its directory or deleted.
    ///
    /// Access checks detect this on their own. This is the entry point for
    /// move notifications from outside the access path, such as a file
    /// system watcher. Returns whether the grant changed state.
    pub async fn revoke_on_move(&self, key: &GrantKey, now: i64) -> Result<bool> {
        let outcome = self
            .store
            .update(key, |grant| invalidate_moved(grant, now))
            .await?;
        Ok(outcome.transpose()?.unwrap_or(false))
    }

    /// The origin's storage was cleared: destroy all of its grants.
    pub async fn purge_on_storage_clear(&self, origin: &Origin) -> Result<usize> {
        let removed = self.store.purge(origin).await?;
        tracing::info!(%origin, removed, "origin storage cleared");
        Ok(removed)
    }

    /// The origin acknowledged a revoked or invalid grant; drop the record.
    ///
    /// Active grants and grants of other origins are left alone.
    pub async fn confirm_revocation(&self, origin: &Origin, key: &GrantKey) -> Result<bool> {
        let terminal = self
            .store
            .lookup(origin, key)
            .await?
            .is_some_and(|grant| grant.state.is_terminal());
        if !terminal {
            return Ok(false);
        }

        // States never leave the terminal set, so the check above still holds.
        let removed = self.store.remove(key).await?;
        tracing::debug!(%origin, ?key, removed, "revocation confirmed");
        Ok(removed)
    }

    /// Destroy terminal grants older than `retention_ms`.
    pub async fn collect_expired(&self, now: i64, retention_ms: i64) -> Result<usize> {
        let cutoff = now.saturating_sub(retention_ms);
        let removed = self.store.collect_garbage(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, cutoff, "expired grants collected");
        }
        Ok(removed)
    }
}
