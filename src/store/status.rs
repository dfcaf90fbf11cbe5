//! Status board
//!
//! Process-wide status signal for persistence and per-leaf sync state. UI
//! consumers watch it; nothing here ever feeds back into the tree.

use crate::types::{Millis, NodeId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::watch;

/// Per-leaf sync indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum SyncStatus {
    Syncing,
    Saved,
    Error(String),
}

/// Local persistence indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum PersistenceStatus {
    Ok,
    Error(String),
}

/// Point-in-time copy of the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub persistence: PersistenceStatus,
    pub leaves: BTreeMap<NodeId, LeafStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafStatus {
    pub status: SyncStatus,
    /// Local timestamp the status refers to
    pub local_modified: Option<Millis>,
}

pub struct StatusBoard {
    state: RwLock<StatusSnapshot>,
    version: watch::Sender<u64>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: RwLock::new(StatusSnapshot {
                persistence: PersistenceStatus::Ok,
                leaves: BTreeMap::new(),
            }),
            version,
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    /// Receiver that changes whenever the board does
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.state.read().clone()
    }

    pub fn persistence(&self) -> PersistenceStatus {
        self.state.read().persistence.clone()
    }

    pub fn set_persistence(&self, status: PersistenceStatus) {
        {
            let mut state = self.state.write();
            if state.persistence == status {
                return;
            }
            state.persistence = status;
        }
        self.bump();
    }

    pub fn leaf(&self, id: &str) -> Option<LeafStatus> {
        self.state.read().leaves.get(id).cloned()
    }

    pub fn set_leaf(&self, id: &str, status: SyncStatus, local_modified: Option<Millis>) {
        self.state.write().leaves.insert(
            id.to_string(),
            LeafStatus {
                status,
                local_modified,
            },
        );
        self.bump();
    }

    pub fn forget_leaf(&self, id: &str) {
        let removed = self.state.write().leaves.remove(id).is_some();
        if removed {
            self.bump();
        }
    }

    /// Leaves whose last sync attempt failed
    pub fn failed_leaves(&self) -> Vec<NodeId> {
        self.state
            .read()
            .leaves
            .iter()
            .filter(|(_, s)| matches!(s.status, SyncStatus::Error(_)))
            .map(|(id, _)| id.clone())
            .collect()
    }
}
