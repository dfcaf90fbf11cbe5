//! Tree Store
//!
//! Owns the authoritative in-memory tree and is its only writer. Every
//! mutation runs against a working copy that replaces the committed tree in
//! one step, is written through to the persistence gateway, and is announced
//! to subscribers together with the leaves it affected.

pub mod clock;
pub mod components;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use status::{LeafStatus, PersistenceStatus, StatusBoard, StatusSnapshot, SyncStatus};

use crate::error::TreeError;
use crate::persistence::{load_or_seed, PersistenceGateway};
use crate::tree::{LeafSnapshot, Node, NodeKind, Tree};
use crate::types::{new_node_id, Millis, NodeId};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 256;

/// What a committed change did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Moved,
    Deleted,
    Renamed,
    ComponentsChanged,
    /// Remote state applied by the sync engine
    RemoteApplied,
}

/// Change notification broadcast after every commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEvent {
    pub kind: ChangeKind,
    pub node_id: NodeId,
    /// Leaves whose sync state should be revisited
    pub affected_leaves: Vec<NodeId>,
    /// Committed tree version after this change
    pub version: u64,
}

impl TreeEvent {
    /// Whether the change originated from a local edit
    pub fn is_local(&self) -> bool {
        self.kind != ChangeKind::RemoteApplied
    }
}

struct Committed {
    tree: Tree,
    version: u64,
    /// Highest stamp handed out so far; stamps are strictly increasing
    last_stamp: Millis,
}

pub struct TreeStore {
    state: RwLock<Committed>,
    persistence: Arc<dyn PersistenceGateway>,
    status: Arc<StatusBoard>,
    events: broadcast::Sender<TreeEvent>,
    clock: Arc<dyn Clock>,
}

impl TreeStore {
    /// Create a store over an already loaded tree
    pub fn new(tree: Tree, persistence: Arc<dyn PersistenceGateway>, status: Arc<StatusBoard>) -> Self {
        let last_stamp = tree
            .items
            .values()
            .filter_map(Node::last_modified)
            .max()
            .unwrap_or(0);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(Committed {
                tree,
                version: 0,
                last_stamp,
            }),
            persistence,
            status,
            events,
            clock: Arc::new(SystemClock),
        }
    }

    /// Load the last snapshot (or the seed tree) from `persistence`
    ///
    /// Load failures are reported on the status board; the store always
    /// comes up usable.
    pub fn load(persistence: Arc<dyn PersistenceGateway>, status: Arc<StatusBoard>) -> Self {
        let loaded = load_or_seed(persistence.as_ref());
        if let Some(e) = &loaded.error {
            status.set_persistence(PersistenceStatus::Error(e.to_string()));
        }
        let store = Self::new(loaded.tree, persistence, status);
        if loaded.seeded && loaded.error.is_none() {
            store.persist(&store.state.read().tree);
        }
        store
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    // --- reads ---

    /// Clone of the committed tree
    pub fn tree(&self) -> Tree {
        self.state.read().tree.clone()
    }

    /// Run `f` against the committed tree without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        f(&self.state.read().tree)
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn node(&self, id: &str) -> Option<Node> {
        self.state.read().tree.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().tree.contains(id)
    }

    /// Ordered children of `parent` (`None` = root level)
    pub fn children_of(&self, parent: Option<&str>) -> Result<Vec<Node>, TreeError> {
        let state = self.state.read();
        let ids = state
            .tree
            .siblings(parent)
            .ok_or_else(|| TreeError::InvalidParent(parent.unwrap_or_default().to_string()))?;
        Ok(ids.iter().filter_map(|id| state.tree.get(id).cloned()).collect())
    }

    pub fn leaf_ids(&self) -> Vec<NodeId> {
        self.state.read().tree.leaf_ids()
    }

    pub fn is_descendant(&self, ancestor: &str, node: &str) -> bool {
        self.state.read().tree.is_descendant(ancestor, node)
    }

    /// Current snapshot and local commit time of a leaf
    pub fn leaf_snapshot(&self, id: &str) -> Result<(LeafSnapshot, Millis), TreeError> {
        let state = self.state.read();
        let node = state
            .tree
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        let snapshot = LeafSnapshot::of(node).ok_or_else(|| TreeError::NotALeaf(id.to_string()))?;
        Ok((snapshot, node.last_modified().unwrap_or_default()))
    }

    /// Local commit time of a leaf, if it still exists
    /// Current time on the store's clock
    pub fn now_millis(&self) -> Millis {
        self.clock.now_millis()
    }

    pub fn leaf_modified(&self, id: &str) -> Option<Millis> {
        self.state.read().tree.get(id).and_then(Node::last_modified)
    }

    // --- mutations ---

    /// Add a folder or project; returns the new id
    pub fn add_node(
        &self,
        kind: NodeKind,
        name: &str,
        parent_id: Option<&str>,
        index: Option<usize>,
    ) -> Result<NodeId, TreeError> {
        let id = new_node_id();
        let parent = parent_id.map(str::to_string);
        let node = match kind {
            NodeKind::Folder => Node::folder(id.clone(), name, parent),
            NodeKind::Leaf => Node::leaf(id.clone(), name, parent),
        };
        let affected = if kind == NodeKind::Leaf {
            vec![id.clone()]
        } else {
            Vec::new()
        };

        self.commit(ChangeKind::Added, &id, |tree, _| {
            tree.insert_node(node, index)?;
            Ok(((), affected))
        })?;
        Ok(id)
    }

    pub fn add_folder(&self, name: &str, parent_id: Option<&str>) -> Result<NodeId, TreeError> {
        self.add_node(NodeKind::Folder, name, parent_id, None)
    }

    pub fn add_project(&self, name: &str, parent_id: Option<&str>) -> Result<NodeId, TreeError> {
        self.add_node(NodeKind::Leaf, name, parent_id, None)
    }

    /// Reparent and/or reorder a node
    ///
    /// Fails with `CycleError` when `new_parent` is the node itself or one of
    /// its descendants. Every leaf in the moved subtree is reported as
    /// affected.
    pub fn move_node(&self, id: &str, new_parent: Option<&str>, index: usize) -> Result<(), TreeError> {
        self.commit(ChangeKind::Moved, id, |tree, _| {
            tree.move_node(id, new_parent, index)?;
            Ok(((), tree.leaves_under(id)))
        })
    }

    /// Delete a node and its whole subtree; returns the removed ids
    ///
    /// Remote records of removed leaves are left in place.
    pub fn delete_node(&self, id: &str) -> Result<Vec<NodeId>, TreeError> {
        let removed = self.commit(ChangeKind::Deleted, id, |tree, _| {
            let removed = tree.remove_subtree(id)?;
            let leaves = removed
                .iter()
                .filter(|n| n.is_leaf())
                .map(|n| n.id.clone())
                .collect();
            let ids: Vec<NodeId> = removed.into_iter().map(|n| n.id).collect();
            Ok((ids, leaves))
        })?;
        for gone in &removed {
            self.status.forget_leaf(gone);
        }
        Ok(removed)
    }

    pub fn rename_node(&self, id: &str, name: &str) -> Result<(), TreeError> {
        self.commit(ChangeKind::Renamed, id, |tree, _| {
            tree.rename(id, name)?;
            let affected = tree.leaves_under(id).into_iter().filter(|l| l == id).collect();
            Ok(((), affected))
        })
    }

    /// Apply `f` to a working copy and swap it in on success
    ///
    /// `f` receives the stamp this commit will use and returns its output plus
    /// the affected leaves. Leaves whose snapshot changed (or that are new) get
    /// their `last_modified` set to the stamp. A commit that changes nothing is
    /// dropped without persisting or notifying.
    pub(crate) fn commit<T>(
        &self,
        kind: ChangeKind,
        node_id: &str,
        f: impl FnOnce(&mut Tree, Millis) -> Result<(T, Vec<NodeId>), TreeError>,
    ) -> Result<T, TreeError> {
        let mut state = self.state.write();
        let stamp = self.clock.now_millis().max(state.last_stamp.saturating_add(1));

        let mut working = state.tree.clone();
        let (output, affected) = f(&mut working, stamp)?;

        if working == state.tree {
            debug!(node_id, ?kind, "Commit changed nothing");
            return Ok(output);
        }

        let mut stamped = false;
        for leaf in &affected {
            let changed = match (state.tree.get(leaf), working.get(leaf)) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(before), Some(after)) => LeafSnapshot::of(before) != LeafSnapshot::of(after),
            };
            if changed {
                if let Some(crate::tree::NodeBody::Leaf { last_modified, .. }) =
                    working.items.get_mut(leaf).map(|n| &mut n.body)
                {
                    *last_modified = stamp;
                    stamped = true;
                }
            }
        }

        debug_assert!(
            working.check_invariants().is_ok(),
            "commit produced an invalid tree: {:?}",
            working.check_invariants()
        );

        state.tree = working;
        state.version += 1;
        if stamped {
            state.last_stamp = stamp;
        }
        let version = state.version;
        self.persist(&state.tree);
        drop(state);

        debug!(node_id, ?kind, version, affected = affected.len(), "Committed tree change");
        // No receivers is fine
        let _ = self.events.send(TreeEvent {
            kind,
            node_id: node_id.to_string(),
            affected_leaves: affected,
            version,
        });
        Ok(output)
    }

    /// Apply remote content to a leaf if its local stamp is still `expected_local`
    ///
    /// This is the compare-and-set the sync engine uses: name and components
    /// are taken from the remote snapshot, the leaf's stamp becomes
    /// `remote_modified`, and structure (parent, position) stays local.
    /// Returns `Ok(false)` when the leaf moved on since `expected_local`.
    pub fn apply_remote(
        &self,
        id: &str,
        remote: &LeafSnapshot,
        remote_modified: Millis,
        expected_local: Millis,
    ) -> Result<bool, TreeError> {
        let mut state = self.state.write();
        let node = state
            .tree
            .items
            .get_mut(id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        let crate::tree::NodeBody::Leaf { components, last_modified } = &mut node.body else {
            return Err(TreeError::NotALeaf(id.to_string()));
        };
        if *last_modified != expected_local {
            debug!(
                node_id = id,
                expected_local,
                current = *last_modified,
                "Remote apply lost the race with a local edit"
            );
            return Ok(false);
        }

        *components = remote.component_list.clone();
        *last_modified = remote_modified;
        node.name = remote.name.clone();

        state.version += 1;
        state.last_stamp = state.last_stamp.max(remote_modified);
        let version = state.version;
        self.persist(&state.tree);
        drop(state);

        let _ = self.events.send(TreeEvent {
            kind: ChangeKind::RemoteApplied,
            node_id: id.to_string(),
            affected_leaves: vec![id.to_string()],
            version,
        });
        Ok(true)
    }

    /// Write-through to the gateway; failures only touch the status board
    fn persist(&self, tree: &Tree) {
        match self.persistence.snapshot(tree) {
            Ok(()) => self.status.set_persistence(PersistenceStatus::Ok),
            Err(e) => {
                warn!(error = %e, "Failed to persist tree snapshot");
                self.status.set_persistence(PersistenceStatus::Error(e.to_string()));
            }
        }
    }
}
