//! Drag gesture tracking and drop resolution.

use super::layout::{DropTarget, Point, TreeLayout};
use super::MoveInstruction;
use crate::tree::Tree;
use crate::types::NodeId;
use tracing::debug;

/// Resolved insertion position: `(target_parent, index)`
pub type DropPosition = (Option<NodeId>, usize);

/// Maps drop targets to insertion positions
pub struct DropZoneResolver;

impl DropZoneResolver {
    /// Gap targets are used verbatim; a folder header places the item first
    /// inside that folder; no target is a no-op.
    pub fn resolve(target: Option<&DropTarget>) -> Option<DropPosition> {
        match target? {
            DropTarget::Gap { parent, index } => Some((parent.clone(), *index)),
            DropTarget::FolderHeader { folder } => Some((Some(folder.clone()), 0)),
        }
    }

    /// Resolve the target under `point` in `layout`
    pub fn resolve_point(layout: &TreeLayout, point: Point) -> Option<DropPosition> {
        Self::resolve(layout.hit_test(point).as_ref())
    }
}

/// One pointer-down → move* → up interaction
#[derive(Debug, Clone)]
pub struct DragGesture {
    source: NodeId,
    origin: Point,
    active: bool,
    hover: Option<DropTarget>,
    activation_distance: f32,
}

impl DragGesture {
    /// Start tracking if the pointer went down on a row
    pub fn pointer_down(layout: &TreeLayout, at: Point, activation_distance: f32) -> Option<Self> {
        let row = layout.row_at(at)?;
        Some(Self {
            source: row.node_id.clone(),
            origin: at,
            active: false,
            hover: None,
            activation_distance,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the pointer moved far enough to count as a drag
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Target currently under the pointer, for drop indicators
    pub fn hovered(&self) -> Option<&DropTarget> {
        self.hover.as_ref()
    }

    pub fn pointer_move(&mut self, layout: &TreeLayout, at: Point) {
        if !self.active && self.origin.distance(&at) >= self.activation_distance {
            self.active = true;
            debug!(node_id = %self.source, "Drag activated");
        }
        if self.active {
            self.hover = layout.hit_test(at);
        }
    }

    /// Finish the gesture
    ///
    /// Returns `None` for a click (never activated), a release over nothing,
    /// or a release that would put the node inside itself.
    pub fn pointer_up(mut self, layout: &TreeLayout, tree: &Tree, at: Point) -> Option<MoveInstruction> {
        self.pointer_move(layout, at);
        if !self.active {
            return None;
        }
        let (parent, index) = DropZoneResolver::resolve(self.hover.as_ref())?;
        if let Some(target) = parent.as_deref() {
            if target == self.source || tree.is_descendant(&self.source, target) {
                debug!(node_id = %self.source, target, "Ignoring drop into own subtree");
                return None;
            }
        }
        Some(MoveInstruction {
            node_id: self.source,
            parent,
            index,
        })
    }
}
