//! In-memory implementation of the GrantStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use file_grants_core::{Grant, GrantKey, NewGrant, Origin};

use crate::error::{Result, StoreError};
use crate::locks::{KeyGuard, KeyLocks};
use crate::traits::{check_mutation, GrantStore, KEY_ATTEMPTS};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; the
/// RwLock is never held across an await.
pub struct MemoryGrantStore {
    inner: RwLock<MemoryStoreInner>,
    locks: KeyLocks,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Grants ordered by key, for stable paging.
    grants: BTreeMap<GrantKey, Grant>,

    /// Keys of destroyed grants.
    retired: HashSet<GrantKey>,
}

impl MemoryStoreInner {
    fn destroy(&mut self, key: &GrantKey) -> bool {
        if self.grants.remove(key).is_some() {
            self.retired.insert(*key);
            true
        } else {
            false
        }
    }
}

impl MemoryGrantStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
            locks: KeyLocks::new(),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryGrantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn create(&self, new: NewGrant, now: i64) -> Result<GrantKey> {
        let mut inner = self.write()?;

        for _ in 0..KEY_ATTEMPTS {
            let key = GrantKey::generate();
            if inner.grants.contains_key(&key) || inner.retired.contains(&key) {
                continue;
            }
            inner.grants.insert(key, Grant::from_new(key, new, now));
            return Ok(key);
        }

        Err(StoreError::KeyExhausted)
    }

    async fn remove(&self, key: &GrantKey) -> Result<bool> {
        let _guard = self.locks.lock(*key).await;
        Ok(self.write()?.destroy(key))
    }

    async fn purge(&self, origin: &Origin) -> Result<usize> {
        let keys: Vec<GrantKey> = self
            .read()?
            .grants
            .values()
            .filter(|g| g.owned_by(origin))
            .map(|g| g.key)
            .collect();

        let _guards = self.locks.lock_all(&keys).await;

        let mut inner = self.write()?;
        let mut removed = 0;
        for key in &keys {
            let owned = inner.grants.get(key).is_some_and(|g| g.owned_by(origin));
            if owned && inner.destroy(key) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn collect_garbage(&self, cutoff: i64) -> Result<usize> {
        let keys: Vec<GrantKey> = self
            .read()?
            .grants
            .values()
            .filter(|g| g.is_collectable(cutoff))
            .map(|g| g.key)
            .collect();

        let _guards = self.locks.lock_all(&keys).await;

        let mut inner = self.write()?;
        let mut removed = 0;
        for key in &keys {
            let collectable = inner
                .grants
                .get(key)
                .is_some_and(|g| g.is_collectable(cutoff));
            if collectable && inner.destroy(key) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn lookup(&self, origin: &Origin, key: &GrantKey) -> Result<Option<Grant>> {
        let inner = self.read()?;
        Ok(inner
            .grants
            .get(key)
            .filter(|g| g.owned_by(origin))
            .cloned())
    }

    async fn list_page(
        &self,
        origin: &Origin,
        after: Option<GrantKey>,
        limit: usize,
    ) -> Result<Vec<Grant>> {
        let inner = self.read()?;
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };

        Ok(inner
            .grants
            .range((lower, Bound::Unbounded))
            .map(|(_, g)| g)
            .filter(|g| g.owned_by(origin))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn is_retired(&self, key: &GrantKey) -> Result<bool> {
        Ok(self.read()?.retired.contains(key))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.grants.len())
    }

    async fn lock(&self, key: &GrantKey) -> KeyGuard {
        self.locks.lock(*key).await
    }

    async fn load_locked(&self, guard: &KeyGuard) -> Result<Option<Grant>> {
        Ok(self.read()?.grants.get(guard.key()).cloned())
    }

    async fn update_locked<F, T>(&self, guard: &KeyGuard, mutator: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Grant) -> T + Send,
        T: Send,
    {
        let key = guard.key();
        let Some(before) = self.read()?.grants.get(key).cloned() else {
            return Ok(None);
        };

        let mut after = before.clone();
        let output = mutator(&mut after);

        if after != before {
            check_mutation(&before, &after)?;
            if let Some(slot) = self.write()?.grants.get_mut(key) {
                *slot = after;
            }
        }

        Ok(Some(output))
    }
}
