use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per vault identifier.
///
/// Entries no caller holds or waits on are pruned on the next acquire.
#[derive(Default)]
pub struct VaultLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl VaultLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, identifier: &str) -> OwnedMutexGuard<()> {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let lock = self
            .locks
            .entry(identifier.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
