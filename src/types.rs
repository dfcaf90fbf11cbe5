//! Core types shared across the tree, persistence and sync layers.

/// NodeId: collision-resistant identifier of a folder or project
pub type NodeId = String;

/// RemoteId: opaque identifier assigned by the remote record store
pub type RemoteId = String;

/// Millis: milliseconds since the Unix epoch
pub type Millis = i64;

/// Generate a fresh node identifier
pub fn new_node_id() -> NodeId {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}
