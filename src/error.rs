//! Error types
//!
//! Structural errors are returned before any state is replaced, so a failed
//! operation leaves the tree untouched. Storage and sync errors are reported
//! to the status board and never unwind in-memory state.

use crate::types::NodeId;
use thiserror::Error;

/// Structural errors raised by tree operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("invalid parent: {0} is missing or not a folder")]
    InvalidParent(NodeId),

    #[error("moving {node} under {target} would create a cycle")]
    CycleError { node: NodeId, target: NodeId },

    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("node {0} is a folder and holds no components")]
    NotALeaf(NodeId),

    #[error("component index {index} out of range for {node} ({len} components)")]
    ComponentIndex { node: NodeId, index: usize, len: usize },

    #[error("tree invariant violated: {0}")]
    Corrupt(String),
}

/// Local persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

/// Remote record store errors
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("remote request failed: {0}")]
    Request(String),

    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("remote record not found: {0}")]
    RecordNotFound(String),

    #[error("malformed remote record: {0}")]
    Malformed(String),

    #[error("realtime subscription is not supported by this remote")]
    RealtimeUnsupported,

    #[error("sync is disabled while signed out")]
    SignedOut,

    #[error("leaf {0} no longer exists locally")]
    LeafGone(NodeId),

    #[error("sync queue error: {0}")]
    Queue(String),
}

impl SyncError {
    /// Whether a later attempt may succeed without any local change
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Request(_) => true,
            SyncError::Status { status, .. } => *status >= 500 || *status == 429,
            SyncError::RecordNotFound(_) => true,
            SyncError::Malformed(_)
            | SyncError::RealtimeUnsupported
            | SyncError::SignedOut
            | SyncError::LeafGone(_)
            | SyncError::Queue(_) => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SyncError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => SyncError::Request(err.to_string()),
        }
    }
}

/// Umbrella error for the CLI and application wiring
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
