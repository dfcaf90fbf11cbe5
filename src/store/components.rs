//! Component data store
//!
//! Per-project ordered component payloads. Each operation is an ordinary
//! tree commit, so payload edits persist, stamp and notify exactly like
//! structural edits. Payloads are opaque JSON.

use super::{ChangeKind, TreeStore};
use crate::error::TreeError;
use crate::tree::{Component, NodeBody, Tree};
use crate::types::Millis;

fn leaf_components<'a>(tree: &'a mut Tree, id: &str) -> Result<&'a mut Vec<Component>, TreeError> {
    let node = tree
        .items
        .get_mut(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    match &mut node.body {
        NodeBody::Leaf { components, .. } => Ok(components),
        NodeBody::Folder { .. } => Err(TreeError::NotALeaf(id.to_string())),
    }
}

impl TreeStore {
    pub fn components(&self, id: &str) -> Result<Vec<Component>, TreeError> {
        self.read(|tree| {
            let node = tree.get(id).ok_or_else(|| TreeError::NotFound(id.to_string()))?;
            if !node.is_leaf() {
                return Err(TreeError::NotALeaf(id.to_string()));
            }
            Ok(node.components().to_vec())
        })
    }

    /// Replace the whole component list
    pub fn set_components(&self, id: &str, list: Vec<Component>) -> Result<(), TreeError> {
        self.commit(ChangeKind::ComponentsChanged, id, |tree, _| {
            *leaf_components(tree, id)? = list;
            Ok(((), vec![id.to_string()]))
        })
    }

    /// Append a component; returns its index
    pub fn push_component(
        &self,
        id: &str,
        component_type: &str,
        payload: serde_json::Value,
    ) -> Result<usize, TreeError> {
        self.commit(ChangeKind::ComponentsChanged, id, |tree, stamp| {
            let components = leaf_components(tree, id)?;
            components.push(stamped(Component::new(component_type, payload), stamp));
            Ok((components.len() - 1, vec![id.to_string()]))
        })
    }

    /// Replace the payload of one component
    pub fn update_component(
        &self,
        id: &str,
        index: usize,
        payload: serde_json::Value,
    ) -> Result<(), TreeError> {
        self.commit(ChangeKind::ComponentsChanged, id, |tree, stamp| {
            let components = leaf_components(tree, id)?;
            let len = components.len();
            let component = components.get_mut(index).ok_or_else(|| TreeError::ComponentIndex {
                node: id.to_string(),
                index,
                len,
            })?;
            if component.payload != payload {
                component.payload = payload;
                component.last_modified = Some(stamp);
            }
            Ok(((), vec![id.to_string()]))
        })
    }

    /// Remove one component and return it
    pub fn remove_component(&self, id: &str, index: usize) -> Result<Component, TreeError> {
        self.commit(ChangeKind::ComponentsChanged, id, |tree, _| {
            let components = leaf_components(tree, id)?;
            if index >= components.len() {
                return Err(TreeError::ComponentIndex {
                    node: id.to_string(),
                    index,
                    len: components.len(),
                });
            }
            Ok((components.remove(index), vec![id.to_string()]))
        })
    }
}

fn stamped(mut component: Component, stamp: Millis) -> Component {
    component.last_modified = Some(stamp);
    component
}
