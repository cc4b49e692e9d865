//! Per-user mutual exclusion
//!
//! Every read-modify-write of a user document (tap, boost, claims and
//! referral credit) runs under that user's lock, so double submissions are
//! applied one after the other instead of racing at the persistence layer.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let mutex = Arc::clone(&self.locks.entry(user_id.to_string()).or_default());
        mutex.lock_owned().await
    }

    /// Drop lock entries nobody is holding or waiting on
    pub fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Spawn a task that periodically prunes idle lock entries
pub fn spawn_lock_prune_task(
    locks: Arc<UserLocks>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        loop {
            interval_timer.tick().await;
            let removed = locks.prune_idle();
            if removed > 0 {
                debug!(removed = removed, "Pruned idle user locks");
            }
        }
    })
}
