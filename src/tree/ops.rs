//! Structural tree operations
//!
//! Every operation validates before it touches anything, so an `Err` leaves
//! the tree exactly as it was. The store additionally runs these against a
//! working copy and swaps it in only on success.

use super::{Node, Tree};
use crate::error::TreeError;
use crate::types::NodeId;

/// Clamp an optional insertion index into `[0, len]`; `None` appends
pub fn clamp_index(index: Option<usize>, len: usize) -> usize {
    index.map(|i| i.min(len)).unwrap_or(len)
}

impl Tree {
    /// Ensure `parent` is the root (`None`) or an existing folder
    fn require_parent(&self, parent: Option<&str>) -> Result<(), TreeError> {
        match parent {
            None => Ok(()),
            Some(pid) => match self.items.get(pid) {
                Some(node) if node.is_folder() => Ok(()),
                _ => Err(TreeError::InvalidParent(pid.to_string())),
            },
        }
    }

    fn ordering_list_mut(&mut self, parent: Option<&str>) -> Result<&mut Vec<NodeId>, TreeError> {
        match parent {
            None => Ok(&mut self.root_ids),
            Some(pid) => self
                .items
                .get_mut(pid)
                .and_then(Node::children_mut)
                .ok_or_else(|| TreeError::InvalidParent(pid.to_string())),
        }
    }

    /// Insert a freshly built node under `parent` at `index` (clamped, default append)
    ///
    /// Returns the position the node was inserted at.
    pub fn insert_node(&mut self, mut node: Node, index: Option<usize>) -> Result<usize, TreeError> {
        let parent = node.parent_id.clone();
        self.require_parent(parent.as_deref())?;
        if self.items.contains_key(&node.id) {
            return Err(TreeError::Corrupt(format!("duplicate id {}", node.id)));
        }

        if let Some(children) = node.children_mut() {
            children.clear();
        }
        let id = node.id.clone();
        let list = self.ordering_list_mut(parent.as_deref())?;
        let position = clamp_index(index, list.len());
        list.insert(position, id.clone());
        self.items.insert(id, node);
        Ok(position)
    }

    /// Reparent and/or reorder `id` under `new_parent` at `index`
    ///
    /// The index is interpreted against the target list after `id` has been
    /// detached, and clamped into `[0, len]`.
    pub fn move_node(&mut self, id: &str, new_parent: Option<&str>, index: usize) -> Result<(), TreeError> {
        let old_parent = self
            .items
            .get(id)
            .map(|node| node.parent_id.clone())
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;

        if let Some(target) = new_parent {
            if target == id || self.is_descendant(id, target) {
                return Err(TreeError::CycleError {
                    node: id.to_string(),
                    target: target.to_string(),
                });
            }
        }
        self.require_parent(new_parent)?;

        self.ordering_list_mut(old_parent.as_deref())?
            .retain(|child| child != id);

        let list = self.ordering_list_mut(new_parent)?;
        let position = index.min(list.len());
        list.insert(position, id.to_string());

        if let Some(node) = self.items.get_mut(id) {
            node.parent_id = new_parent.map(str::to_string);
        }
        Ok(())
    }

    /// Remove `id` and every descendant
    ///
    /// Collects the subtree with an explicit worklist, detaches `id` from its
    /// parent (or the root list), then drops every collected id. Returns the
    /// removed nodes in pre-order.
    pub fn remove_subtree(&mut self, id: &str) -> Result<Vec<Node>, TreeError> {
        let parent = self
            .items
            .get(id)
            .map(|node| node.parent_id.clone())
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;

        let doomed = self.subtree_ids(id);
        self.ordering_list_mut(parent.as_deref())?
            .retain(|child| child != id);

        Ok(doomed
            .iter()
            .filter_map(|victim| self.items.remove(victim))
            .collect())
    }

    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> Result<(), TreeError> {
        let node = self
            .items
            .get_mut(id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        node.name = name.into();
        Ok(())
    }
}
