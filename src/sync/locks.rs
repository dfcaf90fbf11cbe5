//! Per-leaf sync serialization
//!
//! Different leaves sync concurrently; two sync operations on the same leaf
//! never interleave. Tree mutations never take these locks. An entry lives
//! only while some task holds or waits on it.

use crate::types::NodeId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct LeafLockManager {
    locks: RwLock<HashMap<NodeId, Arc<Mutex<()>>>>,
}

impl LeafLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, leaf: &str) -> Arc<Mutex<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(leaf) {
                return lock.clone();
            }
        }

        // Double-check under the write lock; another task may have inserted it
        let mut map = self.locks.write();
        map.entry(leaf.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for exclusive sync access to `leaf`
    pub async fn acquire(&self, leaf: &str) -> LeafGuard<'_> {
        let lock = self.lock_for(leaf);
        // Built before waiting so a cancelled waiter still releases the entry
        let mut guard = LeafGuard {
            manager: self,
            leaf: leaf.to_string(),
            guard: None,
        };
        guard.guard = Some(lock.lock_owned().await);
        guard
    }

    /// Remove the entry for `leaf` if nobody else holds or waits on it
    fn release(&self, leaf: &str) {
        let mut map = self.locks.write();
        // Clones are only taken under the map lock, so the count is stable here
        if map.get(leaf).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(leaf);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}

/// Exclusive sync access to one leaf, released on drop
pub struct LeafGuard<'a> {
    manager: &'a LeafLockManager,
    leaf: NodeId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LeafGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.manager.release(&self.leaf);
    }
}
