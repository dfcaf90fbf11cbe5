//! Human-readable rendering of the tree and sync state.

use crate::store::{LeafStatus, PersistenceStatus, SyncStatus};
use crate::tree::{Node, Tree};
use crate::types::{Millis, NodeId};
use chrono::{TimeZone, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Render the tree as an indented outline
pub fn format_tree_text(tree: &Tree, color: bool) -> String {
    if tree.is_empty() {
        return "Tree is empty.\n".to_string();
    }
    let mut out = String::new();
    let mut stack: Vec<(&NodeId, usize)> = tree.root_ids.iter().rev().map(|id| (id, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        let Some(node) = tree.get(id) else {
            continue;
        };
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format_node_line(node, color));
        out.push('\n');
        stack.extend(node.children().iter().rev().map(|child| (child, depth + 1)));
    }
    out
}

fn format_node_line(node: &Node, color: bool) -> String {
    let short_id = &node.id[..node.id.len().min(8)];
    if node.is_folder() {
        let detail = format!("({} items, {})", node.children().len(), short_id);
        if color {
            format!("▾ {} {}", node.name.bold().blue(), detail.dimmed())
        } else {
            format!("▾ {} {}", node.name, detail)
        }
    } else {
        let detail = format!("({} components, {})", node.components().len(), short_id);
        if color {
            format!("• {} {}", node.name.green(), detail.dimmed())
        } else {
            format!("• {} {}", node.name, detail)
        }
    }
}

/// Row of the status table
#[derive(Debug, Clone)]
pub struct LeafStatusRow {
    pub id: NodeId,
    pub name: String,
    pub local_modified: Option<Millis>,
    pub remote_modified: Option<Millis>,
    pub status: Option<LeafStatus>,
}

fn format_millis(ts: Option<Millis>) -> String {
    ts.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn describe_row(row: &LeafStatusRow) -> String {
    if let Some(LeafStatus {
        status: SyncStatus::Error(msg),
        ..
    }) = &row.status
    {
        return format!("error: {}", msg);
    }
    match (row.local_modified, row.remote_modified) {
        (_, None) => "not synced".to_string(),
        (Some(local), Some(remote)) if local == remote => "in sync".to_string(),
        (Some(local), Some(remote)) if local > remote => "local newer".to_string(),
        _ => "remote newer".to_string(),
    }
}

/// Status report: persistence line plus a per-leaf table
pub fn format_status_text(persistence: &PersistenceStatus, rows: &[LeafStatusRow], remote_checked: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Local storage")));
    match persistence {
        PersistenceStatus::Ok => out.push_str("  Saved\n\n"),
        PersistenceStatus::Error(msg) => out.push_str(&format!("  {} {}\n\n", "Error:".red(), msg)),
    }

    out.push_str(&format!("{}\n\n", format_section_heading("Projects")));
    if rows.is_empty() {
        out.push_str("No projects.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    if remote_checked {
        table.set_header(vec!["Project", "Id", "Local", "Remote", "Sync"]);
    } else {
        table.set_header(vec!["Project", "Id", "Local"]);
    }
    for row in rows {
        let mut cells = vec![
            row.name.clone(),
            row.id[..row.id.len().min(8)].to_string(),
            format_millis(row.local_modified),
        ];
        if remote_checked {
            cells.push(format_millis(row.remote_modified));
            cells.push(describe_row(row));
        }
        table.add_row(cells);
    }
    out.push_str(&format!("{}\n", table));
    out
}
