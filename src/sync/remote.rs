//! Remote record store interface and the in-memory implementation.

use crate::error::SyncError;
use crate::types::{Millis, NodeId, RemoteId};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{broadcast, watch};

const NOTIFY_CAPACITY: usize = 256;

/// Remote mirror of one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    #[serde(rename = "id", alias = "remoteId")]
    pub remote_id: RemoteId,
    pub local_id: NodeId,
    pub data: serde_json::Value,
    pub last_modified: Millis,
}

/// Record body for create and update requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBody {
    pub local_id: NodeId,
    pub data: serde_json::Value,
    pub last_modified: Millis,
}

/// Record collection keyed by opaque remote id
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<RemoteRecord>, SyncError>;

    async fn create(&self, body: RecordBody) -> Result<RemoteRecord, SyncError>;

    async fn update(&self, remote_id: &str, body: RecordBody) -> Result<RemoteRecord, SyncError>;

    /// Stream of records changed on the remote side
    fn subscribe(&self) -> Result<broadcast::Receiver<RemoteRecord>, SyncError> {
        Err(SyncError::RealtimeUnsupported)
    }
}

/// In-process remote store
///
/// Backs tests and offline demos. Supports failure injection and pausing
/// requests mid-flight so interleavings can be driven deterministically.
pub struct MemoryRemoteStore {
    records: RwLock<BTreeMap<RemoteId, RemoteRecord>>,
    next_id: AtomicUsize,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    failing: AtomicBool,
    paused: watch::Sender<bool>,
    changes: broadcast::Sender<RemoteRecord>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        let (changes, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicUsize::new(1),
            requests: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            paused,
            changes,
        }
    }

    /// Make every request fail with a retryable error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold requests after they are received until unpaused
    pub fn set_paused(&self, paused: bool) {
        self.paused.send_replace(paused);
    }

    /// Total requests received
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Requests received but not yet answered
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<RemoteRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn record_for(&self, local_id: &str) -> Option<RemoteRecord> {
        self.records
            .read()
            .values()
            .find(|r| r.local_id == local_id)
            .cloned()
    }

    /// Write a record as another device would, notifying subscribers
    pub fn put_external(&self, local_id: &str, data: serde_json::Value, last_modified: Millis) -> RemoteRecord {
        let existing = self.record_for(local_id).map(|r| r.remote_id);
        let remote_id = existing.unwrap_or_else(|| self.fresh_id());
        let record = RemoteRecord {
            remote_id: remote_id.clone(),
            local_id: local_id.to_string(),
            data,
            last_modified,
        };
        self.records.write().insert(remote_id, record.clone());
        let _ = self.changes.send(record.clone());
        record
    }

    fn fresh_id(&self) -> RemoteId {
        format!("rec_{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn begin(&self) -> Result<InFlight<'_>, SyncError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        let mut paused = self.paused.subscribe();
        // Sender lives as long as self
        let _ = paused.wait_for(|p| !*p).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Request("remote unreachable".to_string()));
        }
        Ok(guard)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn list_all(&self) -> Result<Vec<RemoteRecord>, SyncError> {
        let _guard = self.begin().await?;
        Ok(self.records())
    }

    async fn create(&self, body: RecordBody) -> Result<RemoteRecord, SyncError> {
        let _guard = self.begin().await?;
        let record = RemoteRecord {
            remote_id: self.fresh_id(),
            local_id: body.local_id,
            data: body.data,
            last_modified: body.last_modified,
        };
        self.records
            .write()
            .insert(record.remote_id.clone(), record.clone());
        let _ = self.changes.send(record.clone());
        Ok(record)
    }

    async fn update(&self, remote_id: &str, body: RecordBody) -> Result<RemoteRecord, SyncError> {
        let _guard = self.begin().await?;
        let record = {
            let mut records = self.records.write();
            let record = records
                .get_mut(remote_id)
                .ok_or_else(|| SyncError::RecordNotFound(remote_id.to_string()))?;
            record.local_id = body.local_id;
            record.data = body.data;
            record.last_modified = body.last_modified;
            record.clone()
        };
        let _ = self.changes.send(record.clone());
        Ok(record)
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<RemoteRecord>, SyncError> {
        Ok(self.changes.subscribe())
    }
}
