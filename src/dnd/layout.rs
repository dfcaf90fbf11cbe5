//! Visible tree layout and drop-target hit testing
//!
//! Rows are laid out top to bottom in pre-order with a fixed row height.
//! Every ordering list that is visible contributes `len + 1` gap targets,
//! one per boundary between its rows, and every visible folder row is a
//! header target.

use super::DragConfig;
use crate::tree::{NodeKind, Tree};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;

/// Pointer position in tree-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One rendered node row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub node_id: NodeId,
    pub kind: NodeKind,
    pub depth: usize,
    pub expanded: bool,
}

/// Insertion point between siblings
#[derive(Debug, Clone, PartialEq)]
pub struct GapZone {
    pub parent: Option<NodeId>,
    pub index: usize,
    pub depth: usize,
    /// Row boundary the gap sits on (0 = above the first row)
    pub boundary: usize,
}

/// Something a drag can be released over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Gap { parent: Option<NodeId>, index: usize },
    FolderHeader { folder: NodeId },
}

#[derive(Debug, Clone)]
pub struct TreeLayout {
    rows: Vec<Row>,
    gaps: Vec<GapZone>,
    metrics: DragConfig,
}

impl TreeLayout {
    /// Lay out the visible part of `tree`; folders not in `expanded` show
    /// only their header row
    pub fn build(tree: &Tree, expanded: &HashSet<NodeId>, metrics: &DragConfig) -> Self {
        let mut layout = TreeLayout {
            rows: Vec::new(),
            gaps: Vec::new(),
            metrics: metrics.clone(),
        };
        layout.push_list(tree, None, &tree.root_ids, 0, expanded);
        layout
    }

    fn push_list(
        &mut self,
        tree: &Tree,
        parent: Option<&str>,
        ids: &[NodeId],
        depth: usize,
        expanded: &HashSet<NodeId>,
    ) {
        for (index, id) in ids.iter().enumerate() {
            let Some(node) = tree.get(id) else { continue };
            self.gaps.push(GapZone {
                parent: parent.map(str::to_string),
                index,
                depth,
                boundary: self.rows.len(),
            });
            let open = node.is_folder() && expanded.contains(id);
            self.rows.push(Row {
                node_id: id.clone(),
                kind: node.kind(),
                depth,
                expanded: open,
            });
            if open {
                self.push_list(tree, Some(id), node.children(), depth + 1, expanded);
            }
        }
        self.gaps.push(GapZone {
            parent: parent.map(str::to_string),
            index: ids.len(),
            depth,
            boundary: self.rows.len(),
        });
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn gaps(&self) -> &[GapZone] {
        &self.gaps
    }

    /// Height of the rendered tree
    pub fn height(&self) -> f32 {
        self.rows.len() as f32 * self.metrics.row_height
    }

    /// Row under the pointer, if any
    pub fn row_at(&self, point: Point) -> Option<&Row> {
        if point.y < 0.0 || self.metrics.row_height <= 0.0 {
            return None;
        }
        self.rows.get((point.y / self.metrics.row_height) as usize)
    }

    /// Drop target under the pointer
    ///
    /// Gap bands win over header rows. When several gaps share a boundary
    /// (the end of nested lists), the one whose depth is closest to the
    /// pointer's indent level is chosen, deeper on ties.
    pub fn hit_test(&self, point: Point) -> Option<DropTarget> {
        let half_band = self.metrics.gap_height / 2.0;
        let pointer_depth = if self.metrics.indent_width > 0.0 {
            (point.x / self.metrics.indent_width).max(0.0) as usize
        } else {
            0
        };

        let gap = self
            .gaps
            .iter()
            .filter(|gap| {
                let y = gap.boundary as f32 * self.metrics.row_height;
                (point.y - y).abs() <= half_band
            })
            .min_by_key(|gap| (gap.depth.abs_diff(pointer_depth), Reverse(gap.depth)));
        if let Some(gap) = gap {
            return Some(DropTarget::Gap {
                parent: gap.parent.clone(),
                index: gap.index,
            });
        }

        match self.row_at(point) {
            Some(row) if row.kind == NodeKind::Folder => Some(DropTarget::FolderHeader {
                folder: row.node_id.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    fn metrics() -> DragConfig {
        DragConfig {
            row_height: 20.0,
            indent_width: 16.0,
            gap_height: 8.0,
            activation_distance: 4.0,
        }
    }

    /// A{B, C{D}}, E
    fn sample() -> Tree {
        let mut tree = Tree::new();
        tree.insert_node(Node::folder("A".into(), "A", None), None).unwrap();
        tree.insert_node(Node::leaf("B".into(), "B", Some("A".into())), None).unwrap();
        tree.insert_node(Node::folder("C".into(), "C", Some("A".into())), None).unwrap();
        tree.insert_node(Node::leaf("D".into(), "D", Some("C".into())), None).unwrap();
        tree.insert_node(Node::leaf("E".into(), "E", None), None).unwrap();
        tree
    }

    fn expanded(ids: &[&str]) -> HashSet<NodeId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rows_follow_expansion() {
        let tree = sample();
        let all = TreeLayout::build(&tree, &expanded(&["A", "C"]), &metrics());
        let ids: Vec<&str> = all.rows().iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(all.rows()[3].depth, 2);

        let collapsed = TreeLayout::build(&tree, &expanded(&["A"]), &metrics());
        let ids: Vec<&str> = collapsed.rows().iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "E"]);
    }

    #[test]
    fn test_gap_count_per_visible_list() {
        let tree = sample();
        let layout = TreeLayout::build(&tree, &expanded(&["A", "C"]), &metrics());
        // root: 3 gaps, A: 3 gaps, C: 2 gaps
        assert_eq!(layout.gaps().len(), 8);

        let collapsed = TreeLayout::build(&tree, &expanded(&["A"]), &metrics());
        assert!(collapsed.gaps().iter().all(|g| g.parent.as_deref() != Some("C")));
    }

    #[test]
    fn test_hit_gap_between_siblings() {
        let tree = sample();
        let layout = TreeLayout::build(&tree, &expanded(&["A", "C"]), &metrics());
        // Boundary between B (row 1) and C (row 2) at y=40, inside A at depth 1
        let hit = layout.hit_test(Point::new(20.0, 41.0));
        assert_eq!(
            hit,
            Some(DropTarget::Gap {
                parent: Some("A".into()),
                index: 1
            })
        );
    }

    #[test]
    fn test_shared_boundary_uses_indent() {
        let tree = sample();
        let layout = TreeLayout::build(&tree, &expanded(&["A", "C"]), &metrics());
        // Boundary after D (row 3) at y=80 is the end of C, end of A and
        // before E at the root
        let deep = layout.hit_test(Point::new(40.0, 80.0));
        assert_eq!(
            deep,
            Some(DropTarget::Gap {
                parent: Some("C".into()),
                index: 1
            })
        );
        let middle = layout.hit_test(Point::new(20.0, 80.0));
        assert_eq!(
            middle,
            Some(DropTarget::Gap {
                parent: Some("A".into()),
                index: 2
            })
        );
        let root = layout.hit_test(Point::new(2.0, 80.0));
        assert_eq!(root, Some(DropTarget::Gap { parent: None, index: 1 }));
    }

    #[test]
    fn test_hit_folder_header_and_leaf_row() {
        let tree = sample();
        let layout = TreeLayout::build(&tree, &expanded(&["A"]), &metrics());
        // Middle of C's row (row 2)
        assert_eq!(
            layout.hit_test(Point::new(30.0, 50.0)),
            Some(DropTarget::FolderHeader { folder: "C".into() })
        );
        // Middle of B's row is a leaf: nothing
        assert_eq!(layout.hit_test(Point::new(30.0, 30.0)), None);
        // Far below the tree: nothing
        assert_eq!(layout.hit_test(Point::new(0.0, 500.0)), None);
    }

    #[test]
    fn test_empty_tree_has_single_root_gap() {
        let layout = TreeLayout::build(&Tree::new(), &HashSet::new(), &metrics());
        assert_eq!(
            layout.hit_test(Point::new(0.0, 1.0)),
            Some(DropTarget::Gap { parent: None, index: 0 })
        );
    }
}
