//! Project Tree
//!
//! Arena model of folders and projects: an id → node map plus the ordered
//! root list. Sibling order is defined solely by position in `root_ids` or a
//! folder's `children`.

pub mod node;
pub mod ops;
pub mod snapshot;

pub use node::{Component, Node, NodeBody, NodeKind};
pub use snapshot::LeafSnapshot;

use crate::error::TreeError;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tree: the whole folder/project hierarchy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    pub items: BTreeMap<NodeId, Node>,
    pub root_ids: Vec<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ordering list for a parent (`None` = root level)
    pub fn siblings(&self, parent: Option<&str>) -> Option<&[NodeId]> {
        match parent {
            None => Some(&self.root_ids),
            Some(pid) => match self.items.get(pid) {
                Some(node) if node.is_folder() => Some(node.children()),
                _ => None,
            },
        }
    }

    /// Whether `node` sits somewhere below `ancestor`
    ///
    /// Walks the parent chain of `node`; the walk is bounded by the node count
    /// so a corrupt chain cannot loop forever.
    pub fn is_descendant(&self, ancestor: &str, node: &str) -> bool {
        let mut current = self.items.get(node).and_then(|n| n.parent_id.as_deref());
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.items.len() {
                return false;
            }
            current = self.items.get(id).and_then(|n| n.parent_id.as_deref());
        }
        false
    }

    /// Ids of `root` and everything below it, pre-order
    pub fn subtree_ids(&self, root: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_string()];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.items.get(&id) {
                // Reverse so the stack pops children in sibling order
                stack.extend(node.children().iter().rev().cloned());
                out.push(id);
            }
        }
        out
    }

    /// Leaf ids within the subtree rooted at `root` (inclusive)
    pub fn leaves_under(&self, root: &str) -> Vec<NodeId> {
        self.subtree_ids(root)
            .into_iter()
            .filter(|id| self.items.get(id).map(Node::is_leaf).unwrap_or(false))
            .collect()
    }

    /// All leaf ids in display order
    pub fn leaf_ids(&self) -> Vec<NodeId> {
        self.root_ids
            .iter()
            .flat_map(|root| self.leaves_under(root))
            .collect()
    }

    /// Depth of a node (roots are depth 0)
    pub fn depth(&self, id: &str) -> Option<usize> {
        let mut depth = 0;
        let mut current = self.items.get(id)?.parent_id.as_deref();
        while let Some(pid) = current {
            depth += 1;
            if depth > self.items.len() {
                return None;
            }
            current = self.items.get(pid)?.parent_id.as_deref();
        }
        Some(depth)
    }

    /// Verify the structural invariants
    ///
    /// 1. every referenced id exists in `items`
    /// 2. parent links and child lists agree
    /// 3. parent chains are acyclic
    /// 4. each node is referenced by exactly one ordering list, once
    pub fn check_invariants(&self) -> Result<(), TreeError> {
        let mut referenced: HashMap<&str, Option<&str>> = HashMap::new();

        for id in &self.root_ids {
            if referenced.insert(id.as_str(), None).is_some() {
                return Err(TreeError::Corrupt(format!("{} referenced twice", id)));
            }
        }
        for (owner, node) in &self.items {
            for child in node.children() {
                if referenced.insert(child.as_str(), Some(owner.as_str())).is_some() {
                    return Err(TreeError::Corrupt(format!("{} referenced twice", child)));
                }
            }
        }

        for (id, owner) in &referenced {
            let node = self
                .items
                .get(*id)
                .ok_or_else(|| TreeError::Corrupt(format!("dangling reference to {}", id)))?;
            if node.parent_id.as_deref() != *owner {
                return Err(TreeError::Corrupt(format!(
                    "{} has parent {:?} but is listed under {:?}",
                    id, node.parent_id, owner
                )));
            }
        }

        for (id, node) in &self.items {
            if !referenced.contains_key(id.as_str()) {
                return Err(TreeError::Corrupt(format!("{} is not in any ordering list", id)));
            }
            if let Some(pid) = &node.parent_id {
                match self.items.get(pid) {
                    Some(parent) if parent.is_folder() => {}
                    _ => return Err(TreeError::Corrupt(format!("{} has invalid parent {}", id, pid))),
                }
            }
        }

        let mut acyclic: HashSet<&str> = HashSet::new();
        for id in self.items.keys() {
            let mut chain = Vec::new();
            let mut current = Some(id.as_str());
            while let Some(cid) = current {
                if acyclic.contains(cid) {
                    break;
                }
                if chain.contains(&cid) {
                    return Err(TreeError::Corrupt(format!("cycle through {}", cid)));
                }
                chain.push(cid);
                current = self.items.get(cid).and_then(|n| n.parent_id.as_deref());
            }
            acyclic.extend(chain);
        }

        Ok(())
    }
}
