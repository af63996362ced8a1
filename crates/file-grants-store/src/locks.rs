//! Per-key async locks.
//!
//! Every read-modify-write on a grant holds that grant's lock. The registry
//! mutex is only held long enough to look up or create the lock, never across
//! an await, so unrelated keys proceed in parallel.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use file_grants_core::GrantKey;

const MIN_PRUNE_AT: usize = 64;

/// Registry of per-key locks, created on demand and dropped when unused.
pub struct KeyLocks {
    inner: Mutex<Registry>,
}

struct Registry {
    slots: HashMap<GrantKey, Weak<AsyncMutex<()>>>,
    prune_at: usize,
}

/// Held for the duration of one atomic section on a key.
pub struct KeyGuard {
    key: GrantKey,
    _held: OwnedMutexGuard<()>,
}

impl KeyGuard {
    /// The key this guard locks.
    pub fn key(&self) -> &GrantKey {
        &self.key
    }
}

impl fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}

impl KeyLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry {
                slots: HashMap::new(),
                prune_at: MIN_PRUNE_AT,
            }),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: GrantKey) -> KeyGuard {
        let held = self.slot(key).lock_owned().await;
        KeyGuard { key, _held: held }
    }

    /// Lock several keys, in key order.
    pub async fn lock_all(&self, keys: &[GrantKey]) -> Vec<KeyGuard> {
        let mut sorted = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Number of keys with a live lock (held or awaited).
    pub fn live(&self) -> usize {
        let registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry
            .slots
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn slot(&self, key: GrantKey) -> Arc<AsyncMutex<()>> {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = registry.slots.get(&key).and_then(Weak::upgrade) {
            return existing;
        }

        if registry.slots.len() >= registry.prune_at {
            registry.slots.retain(|_, w| w.strong_count() > 0);
            registry.prune_at = (registry.slots.len() * 2).max(MIN_PRUNE_AT);
        }

        let fresh = Arc::new(AsyncMutex::new(()));
        registry.slots.insert(key, Arc::downgrade(&fresh));
        fresh
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let key = GrantKey::from_bytes([1; 32]);

        let guard = locks.lock(key).await;

        let locks2 = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _g = locks2.lock(key).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock(GrantKey::from_bytes([1; 32])).await;

        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.lock(GrantKey::from_bytes([2; 32])),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_unused_locks_are_released() {
        let locks = KeyLocks::new();
        {
            let _g = locks.lock(GrantKey::from_bytes([3; 32])).await;
            assert_eq!(locks.live(), 1);
        }
        assert_eq!(locks.live(), 0);
    }

    #[tokio::test]
    async fn test_lock_all_dedups() {
        let locks = KeyLocks::new();
        let k = GrantKey::from_bytes([4; 32]);
        let guards = locks.lock_all(&[GrantKey::from_bytes([5; 32]), k, k]).await;
        assert_eq!(guards.len(), 2);
        assert_eq!(guards[0].key(), &k);
    }
}
