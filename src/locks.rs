use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

/// Map of per-key async mutexes.
///
/// Operations on the same key serialize; operations on different keys never
/// contend beyond the short map lookup.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<RwLock<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        {
            let guard = self.locks.read().await;
            if let Some(lock) = guard.get(key) {
                return lock.clone();
            }
        }

        let mut guard = self.locks.write().await;
        guard
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Waits for exclusive access to `key`
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        self.lock_for(key).await.lock_owned().await
    }

    /// Acquires several keys at once. Keys are deduplicated and taken in
    /// sorted order so two callers with overlapping sets cannot deadlock.
    pub async fn acquire_all<I, S>(&self, keys: I) -> Vec<OwnedMutexGuard<()>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ordered: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            guards.push(self.acquire(&key).await);
        }
        guards
    }

    /// Drops the entry for `key` once nobody holds or waits on it.
    /// Callers must release their own guard first.
    pub async fn clear(&self, key: &str) {
        let mut guard = self.locks.write().await;
        if guard
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            guard.remove(key);
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_keys(&self) -> usize {
        self.locks.read().await.len()
    }
}
