//! Persistence Gateway
//!
//! Durable local snapshot of the whole tree. Every committed mutation replaces
//! the previous snapshot wholesale; there are no partial patches.

pub mod memory;
pub mod sled_store;

pub use memory::MemoryPersistence;
pub use sled_store::SledPersistence;

use crate::error::StorageError;
use crate::tree::{Component, Node, NodeBody, Tree};
use crate::types::new_node_id;
use serde_json::json;
use tracing::{info, warn};

/// Snapshot store interface
pub trait PersistenceGateway: Send + Sync {
    /// Replace the stored snapshot with `tree`
    fn snapshot(&self, tree: &Tree) -> Result<(), StorageError>;

    /// Last stored snapshot, if any
    fn load(&self) -> Result<Option<Tree>, StorageError>;
}

/// Outcome of a startup load
#[derive(Debug)]
pub struct LoadedTree {
    pub tree: Tree,
    /// True when the tree came from the seed rather than storage
    pub seeded: bool,
    /// Storage failure encountered while loading, if any
    pub error: Option<StorageError>,
}

/// Default tree for a fresh workspace
pub fn seed_tree() -> Tree {
    let mut tree = Tree::new();
    let folder_id = new_node_id();
    let project_id = new_node_id();

    let mut project = Node::leaf(project_id, "Welcome", Some(folder_id.clone()));
    if let NodeBody::Leaf { components, .. } = &mut project.body {
        components.push(Component::new(
            "text",
            json!({ "text": "Drag projects between folders to organize your workspace." }),
        ));
    }

    // Insertion into a fresh tree under a fresh folder cannot fail
    let _ = tree.insert_node(Node::folder(folder_id, "Getting Started", None), None);
    let _ = tree.insert_node(project, None);
    tree
}

/// Load the last snapshot, falling back to the seed tree
///
/// A read failure or a snapshot that violates tree invariants is logged and
/// replaced by the seed; the caller decides how to surface `error`.
pub fn load_or_seed(gateway: &dyn PersistenceGateway) -> LoadedTree {
    match gateway.load() {
        Ok(Some(tree)) => match tree.check_invariants() {
            Ok(()) => {
                info!(nodes = tree.len(), "Loaded tree snapshot");
                LoadedTree {
                    tree,
                    seeded: false,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Stored tree snapshot is corrupt, starting from seed");
                LoadedTree {
                    tree: seed_tree(),
                    seeded: true,
                    error: Some(StorageError::Unavailable(e.to_string())),
                }
            }
        },
        Ok(None) => {
            info!("No tree snapshot found, seeding default tree");
            LoadedTree {
                tree: seed_tree(),
                seeded: true,
                error: None,
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to load tree snapshot, starting from seed");
            LoadedTree {
                tree: seed_tree(),
                seeded: true,
                error: Some(e),
            }
        }
    }
}
