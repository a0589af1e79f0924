// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user async lock pools.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A pool of per-user mutexes.
///
/// Each service owns its own pool. A task may hold locks from different
/// pools at once, but never two locks from the same pool. The connection
/// flow's account lock is always taken before the credential lock.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<DashMap<u64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock for `user_id`.
    pub async fn lock(&self, user_id: u64) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the DashMap shard is not held across the await.
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }
}
