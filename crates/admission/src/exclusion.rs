//! Per-key mutual exclusion for async critical sections.
//!
//! Each active key owns a fair `tokio::sync::Mutex`, so waiters on one key are
//! served in the order they started waiting while distinct keys never contend.
//! A key's slot is dropped from the map once nobody holds or awaits it.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::Mutex as AsyncMutex;

struct Slot {
    lock: Arc<AsyncMutex<()>>,
    holders: usize,
}

#[derive(Default)]
struct Slots {
    by_key: Mutex<HashMap<String, Slot>>,
}

impl Slots {
    fn acquire(self: &Arc<Self>, key: &str) -> SlotLease {
        let mut by_key = self.by_key.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = by_key.entry(key.to_string()).or_insert_with(|| Slot {
            lock: Arc::new(AsyncMutex::new(())),
            holders: 0,
        });
        slot.holders += 1;
        SlotLease {
            slots: Arc::clone(self),
            key: key.to_string(),
            lock: Arc::clone(&slot.lock),
        }
    }

    fn release(&self, key: &str) {
        let mut by_key = self.by_key.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = by_key.get_mut(key) {
            slot.holders = slot.holders.saturating_sub(1);
            if slot.holders == 0 {
                by_key.remove(key);
            }
        }
    }
}

/// Interest in one key, registered before waiting and withdrawn on drop.
///
/// Dropping a lease while its owner is still queued (a cancelled request)
/// withdraws the waiter without disturbing the others.
struct SlotLease {
    slots: Arc<Slots>,
    key: String,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.slots.release(&self.key);
    }
}

/// Serializes operations that share a key.
///
/// Cloning is cheap and clones share state; independent instances never
/// exclude each other.
#[derive(Clone, Default)]
pub struct ExclusionQueue {
    slots: Arc<Slots>,
}

impl ExclusionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation` once every earlier operation on `key` has finished.
    ///
    /// The exclusion is released on every exit path, including an `Err`
    /// result, a panic inside `operation`, or the returned future being
    /// dropped mid-wait.
    pub async fn run_exclusive<F, Fut, T>(&self, key: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = self.slots.acquire(key);
        let _guard = Arc::clone(&lease.lock).lock_owned().await;
        operation().await
    }

    /// Number of keys with a running or queued operation.
    pub fn active_keys(&self) -> usize {
        self.slots
            .by_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
#[path = "tests/exclusion_tests.rs"]
mod tests;
