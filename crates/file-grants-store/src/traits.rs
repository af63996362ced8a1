//! GrantStore trait: the abstract interface for grant persistence.
//!
//! This trait allows the engine to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use file_grants_core::{Grant, GrantKey, GrantState, NewGrant, Origin};

use crate::error::{Result, StoreError};
use crate::locks::KeyGuard;

/// Attempts at drawing a key that is neither live nor retired.
pub(crate) const KEY_ATTEMPTS: usize = 8;

/// The GrantStore trait: async interface for grant persistence.
///
/// # Design Notes
///
/// - **Origin-scoped reads**: `lookup` and `list_page` never return a grant
///   to an origin that does not own it.
/// - **Atomic updates**: `update` runs the mutator under the key's lock and
///   persists the result before returning. Callers that must await between
///   reading and mutating (e.g. blocking file system work) take the lock
///   with `lock` and use `load_locked` and `update_locked`. Key, origin, identity and
///   creation time cannot be changed, and state cannot leave a terminal
///   value for `Active`.
/// - **Key retirement**: `remove`, `purge` and `collect_garbage` retire the
///   keys they destroy; `create` never returns a live or retired key.
#[async_trait]
pub trait GrantStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new `Active` grant and return its freshly allocated key.
    async fn create(&self, new: NewGrant, now: i64) -> Result<GrantKey>;

    /// Destroy one grant, retiring its key.
    ///
    /// Returns whether a grant was removed.
    async fn remove(&self, key: &GrantKey) -> Result<bool>;

    /// Destroy every grant owned by `origin`.
    ///
    /// Returns the number of grants removed.
    async fn purge(&self, origin: &Origin) -> Result<usize>;

    /// Destroy terminal grants whose state changed at or before `cutoff`.
    async fn collect_garbage(&self, cutoff: i64) -> Result<usize>;

    /// Make every committed write durable (teardown).
    async fn flush(&self) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a grant, only if `origin` owns it.
    async fn lookup(&self, origin: &Origin, key: &GrantKey) -> Result<Option<Grant>>;

    /// One page of `origin`'s grants, ordered by key, strictly after `after`.
    async fn list_page(
        &self,
        origin: &Origin,
        after: Option<GrantKey>,
        limit: usize,
    ) -> Result<Vec<Grant>>;

    /// Whether `key` belonged to a grant that has been destroyed.
    async fn is_retired(&self, key: &GrantKey) -> Result<bool>;

    /// Number of stored (non-destroyed) grants.
    async fn count(&self) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Take `key`'s lock for an atomic section spanning several calls.
    async fn lock(&self, key: &GrantKey) -> KeyGuard;

    /// Get the grant locked by `guard`, whatever its owner.
    ///
    /// `guard` must come from this store's [`lock`](GrantStore::lock).
    async fn load_locked(&self, guard: &KeyGuard) -> Result<Option<Grant>>;

    /// [`update`](GrantStore::update) for a caller already holding the
    /// key's lock.
    ///
    /// `guard` must come from this store's [`lock`](GrantStore::lock).
    async fn update_locked<F, T>(&self, guard: &KeyGuard, mutator: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Grant) -> T + Send,
        T: Send;

    /// Atomically apply `mutator` to the grant stored under `key`.
    ///
    /// Returns `None` if no grant exists. The mutator sees the latest
    /// committed record; if it changes the record, the change is durable
    /// before this call returns.
    async fn update<F, T>(&self, key: &GrantKey, mutator: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Grant) -> T + Send,
        T: Send,
    {
        let guard = self.lock(key).await;
        self.update_locked(&guard, mutator).await
    }
}

/// Reject mutations of fields fixed at creation, and resurrection.
pub(crate) fn check_mutation(before: &Grant, after: &Grant) -> Result<()> {
    let immutable = |field: &'static str| StoreError::ImmutableField {
        key: before.key,
        field,
    };

    if after.key != before.key {
        return Err(immutable("key"));
    }
    if after.origin != before.origin {
        return Err(immutable("origin"));
    }
    if after.identity != before.identity {
        return Err(immutable("identity"));
    }
    if after.created_at != before.created_at {
        return Err(immutable("created_at"));
    }
    if before.state.is_terminal() && after.state == GrantState::Active {
        return Err(immutable("state"));
    }
    Ok(())
}

/// State transitions expressed through [`GrantStore::update`].
pub trait GrantStoreExt: GrantStore {
    /// Move `key` to `to`.
    ///
    /// Returns `None` if the grant does not exist, otherwise whether the
    /// state actually changed.
    fn transition(
        &self,
        key: &GrantKey,
        to: GrantState,
        now: i64,
    ) -> impl std::future::Future<Output = Result<Option<bool>>> + Send;

    /// Set `state = Revoked`.
    fn revoke(
        &self,
        key: &GrantKey,
        now: i64,
    ) -> impl std::future::Future<Output = Result<Option<bool>>> + Send;

    /// Set `state = Invalid`.
    fn invalidate(
        &self,
        key: &GrantKey,
        now: i64,
    ) -> impl std::future::Future<Output = Result<Option<bool>>> + Send;
}

impl<S: GrantStore> GrantStoreExt for S {
    async fn transition(&self, key: &GrantKey, to: GrantState, now: i64) -> Result<Option<bool>> {
        let outcome = self
            .update(key, move |grant| grant.transition(to, now))
            .await?;
        Ok(outcome.transpose()?)
    }

    async fn revoke(&self, key: &GrantKey, now: i64) -> Result<Option<bool>> {
        self.transition(key, GrantState::Revoked, now).await
    }

    async fn invalidate(&self, key: &GrantKey, now: i64) -> Result<Option<bool>> {
        self.transition(key, GrantState::Invalid, now).await
    }
}
