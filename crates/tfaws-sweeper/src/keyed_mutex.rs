//! Named async locks keyed by region, account or any other string
//!
//! Locks are created on first use and never removed; the key space (regions,
//! accounts) is small and bounded for the lifetime of a process.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Registry of named locks.
///
/// Cloning is cheap and clones share the same registry, so one instance can
/// be handed to every component that needs to serialize on the same keys.
#[derive(Clone, Default)]
pub struct KeyedMutex {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it if absent.
    ///
    /// The lock is released when the returned guard is dropped. Acquiring the
    /// same key again from inside its own critical section deadlocks.
    pub async fn lock(&self, key: &str) -> KeyedMutexGuard {
        let lock = self.entry(key);
        trace!(key = %key, "Waiting for keyed lock");
        let guard = lock.lock_owned().await;
        trace!(key = %key, "Acquired keyed lock");
        KeyedMutexGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Number of distinct keys observed so far
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.registry();
        match locks.get(key) {
            Some(lock) => Arc::clone(lock),
            None => {
                let lock = Arc::new(AsyncMutex::new(()));
                locks.insert(key.to_string(), Arc::clone(&lock));
                lock
            }
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        // The map is only ever inserted into, so a panic elsewhere cannot
        // leave it half-updated
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for KeyedMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedMutex")
            .field("keys", &self.len())
            .finish()
    }
}

/// Exclusive ownership of one key; dropping it unlocks the key.
pub struct KeyedMutexGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyedMutexGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock explicitly
    pub fn unlock(self) {
        trace!(key = %self.key, "Released keyed lock");
    }
}

impl fmt::Debug for KeyedMutexGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedMutexGuard")
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_creates_entries_lazily() {
        let locks = KeyedMutex::new();
        assert!(locks.is_empty());

        drop(locks.lock("us-west-2").await);
        drop(locks.lock("us-west-2").await);
        let guard = locks.lock("us-east-1").await;

        assert_eq!(guard.key(), "us-east-1");
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_registry() {
        let locks = KeyedMutex::new();
        let clone = locks.clone();

        let guard = locks.lock("us-west-2").await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), clone.lock("us-west-2")).await;
        assert!(blocked.is_err(), "clone should wait on the same lock");

        guard.unlock();
        let reacquired =
            tokio::time::timeout(Duration::from_millis(50), clone.lock("us-west-2")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exclusive_per_key() {
        let locks = KeyedMutex::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let locks = locks.clone();
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                tokio::spawn(async move {
                    let _guard = locks.lock("us-west-2").await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedMutex::new();
        let _west = locks.lock("us-west-2").await;

        let east = tokio::time::timeout(Duration::from_millis(50), locks.lock("us-east-1")).await;
        assert!(east.is_ok(), "different key must not wait");
    }
}
