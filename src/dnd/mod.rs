//! Drop-zone resolution
//!
//! Turns a pointer drag over the rendered tree into a `(target_parent, index)`
//! move. Structural violations that slip past the gesture guard are rejected
//! by the store and silently dropped here.

pub mod gesture;
pub mod layout;

pub use gesture::{DragGesture, DropPosition, DropZoneResolver};
pub use layout::{DropTarget, GapZone, Point, Row, TreeLayout};

use crate::store::TreeStore;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Layout metrics and drag thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragConfig {
    #[serde(default = "default_row_height")]
    pub row_height: f32,
    #[serde(default = "default_indent_width")]
    pub indent_width: f32,
    /// Height of the band around a row boundary that counts as a gap
    #[serde(default = "default_gap_height")]
    pub gap_height: f32,
    /// Pointer travel before a press becomes a drag
    #[serde(default = "default_activation_distance")]
    pub activation_distance: f32,
}

fn default_row_height() -> f32 {
    28.0
}

fn default_indent_width() -> f32 {
    16.0
}

fn default_gap_height() -> f32 {
    8.0
}

fn default_activation_distance() -> f32 {
    5.0
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            row_height: default_row_height(),
            indent_width: default_indent_width(),
            gap_height: default_gap_height(),
            activation_distance: default_activation_distance(),
        }
    }
}

/// A resolved drop, ready for `TreeStore::move_node`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveInstruction {
    pub node_id: NodeId,
    pub parent: Option<NodeId>,
    pub index: usize,
}

/// Commit a drop; structural errors are swallowed
///
/// Returns whether the move was applied.
pub fn apply_drop(store: &TreeStore, instruction: &MoveInstruction) -> bool {
    match store.move_node(&instruction.node_id, instruction.parent.as_deref(), instruction.index) {
        Ok(()) => true,
        Err(e) => {
            debug!(
                node_id = %instruction.node_id,
                error = %e,
                "Dropped invalid move"
            );
            false
        }
    }
}
