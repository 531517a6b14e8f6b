//! Keyed mutual exclusion for workspace allocation.
//!
//! One async mutex per key, created on first use. The registry only keeps
//! weak references: once no caller holds a key's lock (or a clone of it),
//! the entry is dead and gets pruned, so the map tracks live contention
//! rather than every key ever seen.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-key async locks.
#[derive(Debug)]
pub struct LockRegistry<K> {
    locks: Mutex<HashMap<K, Weak<AsyncMutex<()>>>>,
}

impl<K> Default for LockRegistry<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> LockRegistry<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `key`.
    ///
    /// Every call made while some caller still references the lock returns
    /// the same instance. Dead entries are swept on the way.
    pub fn lock_for(&self, key: &K) -> Arc<AsyncMutex<()>> {
        let mut locks = self.entries();

        if let Some(lock) = locks.get(key).and_then(Weak::upgrade) {
            return lock;
        }

        locks.retain(|_, weak| weak.strong_count() > 0);

        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(key.clone(), Arc::downgrade(&lock));
        lock
    }

    /// Acquires the lock for `key`, suspending the task until it is free.
    ///
    /// Not reentrant: awaiting this twice for the same key from one task
    /// deadlocks.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        self.lock_for(key).lock_owned().await
    }

    /// Drops entries nobody references any more. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut locks = self.entries();
        let before = locks.len();
        locks.retain(|_, weak| weak.strong_count() > 0);
        before - locks.len()
    }

    /// Number of entries currently tracked, live or not yet pruned.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when no entries are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<K, Weak<AsyncMutex<()>>>> {
        // The map holds no invariants a panicking holder could break.
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_same_key_returns_same_lock() {
        let registry = LockRegistry::new();
        let a = registry.lock_for(&1_i64);
        let b = registry.lock_for(&1_i64);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_different_keys_are_independent() {
        let registry = LockRegistry::new();
        let a = registry.lock_for(&1_i64);
        let b = registry.lock_for(&2_i64);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unreferenced_locks_are_pruned() {
        let registry = LockRegistry::new();
        let held = registry.lock_for(&1_i64);
        drop(registry.lock_for(&2_i64));
        drop(registry.lock_for(&3_i64));

        assert_eq!(registry.prune(), 2);
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&held, &registry.lock_for(&1_i64)));
    }

    #[test]
    fn test_lock_for_sweeps_dead_entries() {
        let registry = LockRegistry::new();
        for key in 0..100_i64 {
            drop(registry.lock_for(&key));
        }
        assert!(registry.len() <= 1);
    }

    #[tokio::test]
    async fn test_lock_serializes_same_key() {
        let registry = Arc::new(LockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock(&42_i64).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(registry.prune(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_held_guard_keeps_entry_alive() {
        let registry = LockRegistry::new();
        let guard = registry.lock(&7_i64).await;
        assert_eq!(registry.prune(), 0);
        assert!(registry.lock_for(&7_i64).try_lock().is_err());
        drop(guard);
        assert_eq!(registry.prune(), 1);
    }
}
