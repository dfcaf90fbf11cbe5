//! Tree node types

use crate::types::{Millis, NodeId};
use serde::{Deserialize, Serialize};

/// Node kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Leaf,
}

/// One opaque component payload held by a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(rename = "type")]
    pub component_type: String,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Millis>,
}

impl Component {
    pub fn new(component_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            component_type: component_type.into(),
            payload,
            last_modified: None,
        }
    }
}

/// Kind-specific node contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeBody {
    Folder {
        #[serde(default)]
        children: Vec<NodeId>,
    },
    Leaf {
        #[serde(default, rename = "componentList")]
        components: Vec<Component>,
        #[serde(default, rename = "lastModified")]
        last_modified: Millis,
    },
}

/// A folder or project in the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub parent_id: Option<NodeId>,
    #[serde(flatten)]
    pub body: NodeBody,
}

impl Node {
    pub fn folder(id: NodeId, name: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            body: NodeBody::Folder {
                children: Vec::new(),
            },
        }
    }

    pub fn leaf(id: NodeId, name: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            body: NodeBody::Leaf {
                components: Vec::new(),
                last_modified: 0,
            },
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::Folder { .. } => NodeKind::Folder,
            NodeBody::Leaf { .. } => NodeKind::Leaf,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.body, NodeBody::Folder { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf { .. })
    }

    /// Child ids; empty for leaves
    pub fn children(&self) -> &[NodeId] {
        match &self.body {
            NodeBody::Folder { children } => children,
            NodeBody::Leaf { .. } => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.body {
            NodeBody::Folder { children } => Some(children),
            NodeBody::Leaf { .. } => None,
        }
    }

    /// Components; empty for folders
    pub fn components(&self) -> &[Component] {
        match &self.body {
            NodeBody::Leaf { components, .. } => components,
            NodeBody::Folder { .. } => &[],
        }
    }

    /// Last local commit time; None for folders
    pub fn last_modified(&self) -> Option<Millis> {
        match self.body {
            NodeBody::Leaf { last_modified, .. } => Some(last_modified),
            NodeBody::Folder { .. } => None,
        }
    }
}
