//! # Keyed Locks
//!
//! Serializes work per key (appointment id, cancellation record id) inside
//! one process. Cross-process exclusion comes from the compare-and-set
//! updates and unique indexes in aura-db; this lock only keeps concurrent
//! requests in one process from racing to the gateway.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct KeyedLocks {
    entries: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = self.entries.lock().await;
            // Drop entries nobody holds or waits on.
            entries.retain(|_, lock| Arc::strong_count(lock) > 1);
            entries.entry(key.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }

    pub async fn active_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}
