// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Keyed async locks serialising work on the same identity or repository.
//! Different keys never contend. An entry lives only while someone holds or
//! waits for it.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

#[derive(Debug, Default, Clone)]
pub struct KeyedLocks {
    locks: Arc<LockMap>,
}

/// Exclusive access to one key, released on drop
#[derive(Debug)]
pub struct KeyedGuard {
    key: String,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn acquire(&self, key: &str) -> KeyedGuard {
        // Cloned under the shard lock, so pruning never sees a waiter as idle.
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        KeyedGuard {
            key: key.to_string(),
            locks: self.locks.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
