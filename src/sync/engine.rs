//! Sync Engine
//!
//! Per-leaf synchronization with the remote record store. Local commits are
//! never blocked or rolled back; remote results are applied through the
//! store's timestamp compare-and-set so a response can never overwrite a
//! local edit made while it was in flight.

use super::locks::LeafLockManager;
use super::remote::{RecordBody, RemoteRecord, RemoteStore};
use super::resolve::{resolve_conflict, Winner};
use crate::error::{SyncError, TreeError};
use crate::store::{StatusBoard, SyncStatus, TreeStore};
use crate::tree::LeafSnapshot;
use crate::types::{Millis, NodeId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How far ahead of the local clock a remote stamp may be before the record
/// is rejected as malformed (one day)
pub const MAX_REMOTE_CLOCK_SKEW_MS: Millis = 24 * 60 * 60 * 1000;

/// What a sync call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// First sync of the leaf created its remote record
    Created,
    /// Remote record updated with local state
    Pushed,
    /// Local state replaced by newer remote state
    PulledRemote,
    /// Both sides already agreed
    Unchanged,
    /// A local edit landed while the round trip was in flight; its own sync
    /// pass carries the newer state
    Superseded,
}

/// Totals for a full pass over every leaf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub pushed: usize,
    pub pulled: usize,
    pub unchanged: usize,
    pub superseded: usize,
    pub failed: Vec<(NodeId, String)>,
}

impl SyncReport {
    fn record(&mut self, leaf: NodeId, result: Result<SyncOutcome, SyncError>) {
        match result {
            Ok(SyncOutcome::Created) => self.created += 1,
            Ok(SyncOutcome::Pushed) => self.pushed += 1,
            Ok(SyncOutcome::PulledRemote) => self.pulled += 1,
            Ok(SyncOutcome::Unchanged) => self.unchanged += 1,
            Ok(SyncOutcome::Superseded) => self.superseded += 1,
            Err(e) => self.failed.push((leaf, e.to_string())),
        }
    }
}

/// Live realtime subscription for one leaf; dropping it cancels the task
pub struct Subscription {
    leaf: NodeId,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn leaf(&self) -> &str {
        &self.leaf
    }

    pub fn cancel(self) {}

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct SyncEngine {
    store: Arc<TreeStore>,
    remote: Arc<dyn RemoteStore>,
    status: Arc<StatusBoard>,
    /// Last known remote record per leaf
    index: RwLock<HashMap<NodeId, RemoteRecord>>,
    index_loaded: AtomicBool,
    locks: LeafLockManager,
    signed_in: AtomicBool,
}

impl SyncEngine {
    /// Engine starts signed in; the session layer flips it with `set_signed_in`
    pub fn new(store: Arc<TreeStore>, remote: Arc<dyn RemoteStore>) -> Self {
        let status = Arc::clone(store.status());
        Self {
            store,
            remote,
            status,
            index: RwLock::new(HashMap::new()),
            index_loaded: AtomicBool::new(false),
            locks: LeafLockManager::new(),
            signed_in: AtomicBool::new(true),
        }
    }

    pub fn store(&self) -> &Arc<TreeStore> {
        &self.store
    }

    pub fn set_signed_in(&self, signed_in: bool) {
        let was = self.signed_in.swap(signed_in, Ordering::SeqCst);
        if was != signed_in {
            info!(signed_in, "Sync session changed");
        }
        if !signed_in {
            // Another account may own a different remote collection
            self.index.write().clear();
            self.index_loaded.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }

    /// Last known remote record for a leaf
    pub fn known_record(&self, leaf: &str) -> Option<RemoteRecord> {
        self.index.read().get(leaf).cloned()
    }

    fn ensure_signed_in(&self) -> Result<(), SyncError> {
        if self.is_signed_in() {
            Ok(())
        } else {
            Err(SyncError::SignedOut)
        }
    }

    fn local_state(&self, leaf: &str) -> Result<(LeafSnapshot, Millis), SyncError> {
        self.store.leaf_snapshot(leaf).map_err(|e| match e {
            TreeError::NotFound(id) | TreeError::NotALeaf(id) => SyncError::LeafGone(id),
            other => SyncError::Malformed(other.to_string()),
        })
    }

    fn remember(&self, record: RemoteRecord) {
        self.index.write().insert(record.local_id.clone(), record);
    }

    /// Reload the record index from `list_all`
    pub async fn refresh_index(&self) -> Result<Vec<RemoteRecord>, SyncError> {
        let records = self.remote.list_all().await?;
        {
            // Merge; a listing that raced a push must not hide the pushed record
            let mut index = self.index.write();
            for record in &records {
                let stale = index
                    .get(&record.local_id)
                    .is_some_and(|known| known.last_modified > record.last_modified);
                if !stale {
                    index.insert(record.local_id.clone(), record.clone());
                }
            }
        }
        self.index_loaded.store(true, Ordering::SeqCst);
        debug!(records = records.len(), "Refreshed remote record index");
        Ok(records)
    }

    async fn find_record(&self, leaf: &str) -> Result<Option<RemoteRecord>, SyncError> {
        if let Some(record) = self.known_record(leaf) {
            return Ok(Some(record));
        }
        if !self.index_loaded.load(Ordering::SeqCst) {
            self.refresh_index().await?;
        }
        Ok(self.known_record(leaf))
    }

    /// Report a sync result on the status board
    fn track(&self, leaf: &str, result: &Result<SyncOutcome, SyncError>) {
        match result {
            Ok(SyncOutcome::Superseded) => {}
            Ok(outcome) => {
                debug!(node_id = leaf, ?outcome, "Leaf synced");
                self.status
                    .set_leaf(leaf, SyncStatus::Saved, self.store.leaf_modified(leaf));
            }
            Err(SyncError::LeafGone(_)) => self.status.forget_leaf(leaf),
            Err(e) => {
                warn!(node_id = leaf, error = %e, "Leaf sync failed");
                self.status
                    .set_leaf(leaf, SyncStatus::Error(e.to_string()), self.store.leaf_modified(leaf));
            }
        }
    }

    /// Push the leaf's current state, creating its remote record on first sync
    ///
    /// Unchanged content is not re-sent. If the known remote record is newer
    /// than the local state, the remote side wins instead.
    pub async fn sync_local_to_remote(&self, leaf: &str) -> Result<SyncOutcome, SyncError> {
        self.ensure_signed_in()?;
        let _guard = self.locks.acquire(leaf).await;
        self.status
            .set_leaf(leaf, SyncStatus::Syncing, self.store.leaf_modified(leaf));
        let result = self.push_locked(leaf).await;
        self.track(leaf, &result);
        result
    }

    async fn push_locked(&self, leaf: &str) -> Result<SyncOutcome, SyncError> {
        let (snapshot, local_ts) = self.local_state(leaf)?;
        match self.find_record(leaf).await? {
            Some(record) if record.last_modified > local_ts => self.reconcile_locked(leaf, record).await,
            Some(record) if record.last_modified == local_ts && snapshot.same_content(&record.data) => {
                Ok(SyncOutcome::Unchanged)
            }
            Some(record) => {
                self.send(leaf, Some(&record.remote_id), snapshot, local_ts)
                    .await
            }
            None => self.send(leaf, None, snapshot, local_ts).await,
        }
    }

    /// Create or update the remote record with `snapshot`
    async fn send(
        &self,
        leaf: &str,
        remote_id: Option<&str>,
        snapshot: LeafSnapshot,
        dispatched_ts: Millis,
    ) -> Result<SyncOutcome, SyncError> {
        let body = RecordBody {
            local_id: leaf.to_string(),
            data: snapshot.to_value(),
            last_modified: dispatched_ts,
        };
        let (record, outcome) = match remote_id {
            Some(id) => match self.remote.update(id, body.clone()).await {
                Ok(record) => (record, SyncOutcome::Pushed),
                Err(SyncError::RecordNotFound(_)) => {
                    // Removed remotely behind our back; recreate it
                    (self.remote.create(body).await?, SyncOutcome::Created)
                }
                Err(e) => return Err(e),
            },
            None => (self.remote.create(body).await?, SyncOutcome::Created),
        };
        self.remember(record);

        if self.store.leaf_modified(leaf) != Some(dispatched_ts) {
            debug!(node_id = leaf, dispatched_ts, "Local state advanced during push");
            return Ok(SyncOutcome::Superseded);
        }
        info!(node_id = leaf, ?outcome, last_modified = dispatched_ts, "Pushed leaf to remote");
        Ok(outcome)
    }

    /// Reconcile a leaf with a remote record under last-modified-wins
    ///
    /// Always compares against the local timestamp current at the time of
    /// the call, never one captured earlier.
    pub async fn reconcile(&self, leaf: &str, record: RemoteRecord) -> Result<SyncOutcome, SyncError> {
        self.ensure_signed_in()?;
        let _guard = self.locks.acquire(leaf).await;
        let result = self.reconcile_locked(leaf, record).await;
        self.track(leaf, &result);
        result
    }

    async fn reconcile_locked(&self, leaf: &str, record: RemoteRecord) -> Result<SyncOutcome, SyncError> {
        let remote = LeafSnapshot::from_value(&record.data)
            .map_err(|e| SyncError::Malformed(format!("record {}: {}", record.remote_id, e)))?;
        let limit = self.store.now_millis().saturating_add(MAX_REMOTE_CLOCK_SKEW_MS);
        if record.last_modified > limit {
            warn!(
                node_id = leaf,
                remote_id = %record.remote_id,
                remote_ts = record.last_modified,
                limit,
                "Rejected remote record stamped in the future"
            );
            return Err(SyncError::Malformed(format!(
                "record {} is stamped {} ms, past the accepted limit {}",
                record.remote_id, record.last_modified, limit
            )));
        }
        let (local, local_ts) = self.local_state(leaf)?;

        if local_ts == record.last_modified && local.same_content(&record.data) {
            self.remember(record);
            return Ok(SyncOutcome::Unchanged);
        }

        let resolution = resolve_conflict(&local, &remote, local_ts, record.last_modified);
        match resolution.winner {
            Winner::Remote => {
                let applied = self
                    .store
                    .apply_remote(leaf, &resolution.snapshot, resolution.last_modified, local_ts)
                    .map_err(|e| match e {
                        TreeError::NotFound(id) | TreeError::NotALeaf(id) => SyncError::LeafGone(id),
                        other => SyncError::Malformed(other.to_string()),
                    })?;
                if !applied {
                    return Ok(SyncOutcome::Superseded);
                }
                info!(
                    node_id = leaf,
                    local_ts,
                    remote_ts = record.last_modified,
                    "Applied newer remote state"
                );
                self.remember(record);
                Ok(SyncOutcome::PulledRemote)
            }
            Winner::Local => {
                let remote_id = record.remote_id.clone();
                self.remember(record);
                self.send(leaf, Some(&remote_id), local, local_ts).await
            }
        }
    }

    /// Fetch the leaf's remote record and reconcile with it
    pub async fn pull(&self, leaf: &str) -> Result<SyncOutcome, SyncError> {
        self.ensure_signed_in()?;
        let _guard = self.locks.acquire(leaf).await;
        let dispatched_ts = self.store.leaf_modified(leaf);
        self.status.set_leaf(leaf, SyncStatus::Syncing, dispatched_ts);

        let result = match self.refresh_index().await {
            Ok(_) => {
                let current = self.store.leaf_modified(leaf);
                if current != dispatched_ts {
                    debug!(node_id = leaf, ?dispatched_ts, ?current, "Local state advanced during fetch");
                }
                // Reconcile against the state current now, not at dispatch
                match self.known_record(leaf) {
                    Some(record) => self.reconcile_locked(leaf, record).await,
                    None => self.push_locked(leaf).await,
                }
            }
            Err(e) => Err(e),
        };
        self.track(leaf, &result);
        result
    }

    /// Push every leaf concurrently
    pub async fn sync_all(&self) -> SyncReport {
        let leaves = self.store.leaf_ids();
        let results = futures::future::join_all(
            leaves
                .iter()
                .map(|leaf| self.sync_local_to_remote(leaf)),
        )
        .await;

        let mut report = SyncReport::default();
        for (leaf, result) in leaves.into_iter().zip(results) {
            report.record(leaf, result);
        }
        info!(
            created = report.created,
            pushed = report.pushed,
            pulled = report.pulled,
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "Sync pass finished"
        );
        report
    }

    /// Pull every leaf
    pub async fn pull_all(&self) -> SyncReport {
        let mut report = SyncReport::default();
        for leaf in self.store.leaf_ids() {
            let result = self.pull(&leaf).await;
            report.record(leaf, result);
        }
        report
    }

    /// Follow remote changes for one leaf
    ///
    /// Notifications whose content or timestamp differ from local state are
    /// reconciled immediately. A lagging receiver falls back to a full pull.
    pub fn subscribe(self: &Arc<Self>, leaf: &str) -> Result<Subscription, SyncError> {
        let mut changes = self.remote.subscribe()?;
        let engine = Arc::clone(self);
        let leaf_id = leaf.to_string();

        let task = tokio::spawn({
            let leaf = leaf_id.clone();
            async move {
                debug!(node_id = %leaf, "Realtime subscription started");
                loop {
                    match changes.recv().await {
                        Ok(record) if record.local_id == leaf => {
                            if !engine.is_signed_in() || !engine.differs_from_local(&leaf, &record) {
                                continue;
                            }
                            if let Err(e) = engine.reconcile(&leaf, record).await {
                                if matches!(e, SyncError::LeafGone(_)) {
                                    break;
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(node_id = %leaf, skipped, "Realtime subscription lagged, pulling");
                            if engine.is_signed_in() {
                                let _ = engine.pull(&leaf).await;
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                debug!(node_id = %leaf, "Realtime subscription ended");
            }
        });

        Ok(Subscription { leaf: leaf_id, task })
    }

    fn differs_from_local(&self, leaf: &str, record: &RemoteRecord) -> bool {
        match self.store.leaf_snapshot(leaf) {
            Ok((local, local_ts)) => local_ts != record.last_modified || !local.same_content(&record.data),
            Err(_) => false,
        }
    }
}
