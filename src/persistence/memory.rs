//! In-memory snapshot store for tests and ephemeral sessions.

use super::PersistenceGateway;
use crate::error::StorageError;
use crate::tree::Tree;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Keeps the serialized snapshot in memory
///
/// Stores the JSON bytes rather than the `Tree` so a round trip exercises the
/// same serialization as the sled store.
#[derive(Default)]
pub struct MemoryPersistence {
    snapshot: RwLock<Option<Vec<u8>>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `snapshot` calls fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `load` calls fail
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful snapshot writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl PersistenceGateway for MemoryPersistence {
    fn snapshot(&self, tree: &Tree) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("write failure injected".to_string()));
        }
        let bytes = serde_json::to_vec(tree)?;
        *self.snapshot.write() = Some(bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self) -> Result<Option<Tree>, StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("read failure injected".to_string()));
        }
        match self.snapshot.read().as_deref() {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }
}
