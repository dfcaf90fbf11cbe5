//! Leaf snapshot: the unit a project syncs as.

use super::{Component, Node, NodeBody, NodeKind};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};

/// Serialized view of one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafSnapshot {
    pub id: NodeId,
    pub name: String,
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    #[serde(default)]
    pub component_list: Vec<Component>,
}

impl LeafSnapshot {
    /// Snapshot of a leaf node; `None` for folders
    pub fn of(node: &Node) -> Option<Self> {
        match &node.body {
            NodeBody::Leaf { components, .. } => Some(Self {
                id: node.id.clone(),
                name: node.name.clone(),
                parent_id: node.parent_id.clone(),
                kind: NodeKind::Leaf,
                component_list: components.clone(),
            }),
            NodeBody::Folder { .. } => None,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        // A struct of strings and JSON values always serializes
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Content equality on the parsed form
    ///
    /// Compares `serde_json::Value`s rather than serialized strings, so object
    /// key order inside payloads cannot produce a false difference.
    pub fn same_content(&self, data: &serde_json::Value) -> bool {
        &self.to_value() == data
    }
}
