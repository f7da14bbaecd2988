use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes fetches that share a key.
///
/// Holders re-check the cache after `acquire` returns, so a caller that waited
/// behind an in-flight fetch reuses its result instead of issuing another.
/// A key's lock is dropped from the map once its last holder or waiter is
/// gone.
pub struct RequestCoalescer<K> {
    inflight: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

/// Exclusive hold on one key; releasing it may prune the key.
pub struct InflightGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    coalescer: &'a RequestCoalescer<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> RequestCoalescer<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, key: &K) -> InflightGuard<'_, K> {
        let lock = {
            let mut inflight = self.lock_map();
            Arc::clone(
                inflight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        let guard = lock.lock_owned().await;
        InflightGuard {
            coalescer: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    fn release(&self, key: &K) {
        let mut inflight = self.lock_map();
        if inflight
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            inflight.remove(key);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.lock_map().len()
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<K, Arc<AsyncMutex<()>>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K> Drop for InflightGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        drop(self.guard.take());
        self.coalescer.release(&self.key);
    }
}

impl<K> Default for RequestCoalescer<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
