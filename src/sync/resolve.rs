//! Last-modified-wins conflict resolution.

use crate::tree::LeafSnapshot;
use crate::types::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

/// Which side wins, and the state both sides should converge to
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub winner: Winner,
    pub snapshot: LeafSnapshot,
    pub last_modified: Millis,
}

/// Remote wins only when strictly newer; ties keep local
pub fn resolve_conflict(
    local: &LeafSnapshot,
    remote: &LeafSnapshot,
    local_modified: Millis,
    remote_modified: Millis,
) -> Resolution {
    if remote_modified > local_modified {
        Resolution {
            winner: Winner::Remote,
            snapshot: remote.clone(),
            last_modified: remote_modified,
        }
    } else {
        Resolution {
            winner: Winner::Local,
            snapshot: local.clone(),
            last_modified: local_modified,
        }
    }
}
