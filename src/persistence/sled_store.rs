//! Sled-backed snapshot store
//!
//! One sled tree, one key. The value is the JSON-encoded `Tree`.

use super::PersistenceGateway;
use crate::error::StorageError;
use crate::tree::Tree;
use std::path::Path;
use tracing::debug;

const SNAPSHOT_TREE: &str = "grove_snapshot";
const SNAPSHOT_KEY: &[u8] = b"tree";

pub struct SledPersistence {
    tree: sled::Tree,
}

impl SledPersistence {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree(SNAPSHOT_TREE)?,
        })
    }
}

impl PersistenceGateway for SledPersistence {
    fn snapshot(&self, tree: &Tree) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(tree)?;
        let len = bytes.len();
        self.tree.insert(SNAPSHOT_KEY, bytes)?;
        self.tree.flush()?;
        debug!(bytes = len, nodes = tree.len(), "Wrote tree snapshot");
        Ok(())
    }

    fn load(&self) -> Result<Option<Tree>, StorageError> {
        match self.tree.get(SNAPSHOT_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
