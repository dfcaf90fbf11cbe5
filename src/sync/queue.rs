//! Sync Queue
//!
//! Supervised worker pool that carries local commits to the remote store.
//! A listener turns local `TreeEvent`s into one job per affected leaf;
//! workers drain the de-duplicated pending set through the `SyncEngine`.

use super::engine::{Subscription, SyncEngine};
use super::SyncConfig;
use crate::error::SyncError;
use crate::store::TreeEvent;
use crate::types::NodeId;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for the sync queue
#[derive(Debug, Clone)]
pub struct SyncQueueConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Maximum retry attempts per job
    pub max_retry_attempts: usize,
    /// Delay before a failed job is re-queued (milliseconds)
    pub retry_delay_ms: u64,
    /// Maximum pending leaves
    pub max_queue_size: usize,
    /// Follow remote changes for every leaf while running
    pub realtime: bool,
}

impl Default for SyncQueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_retry_attempts: 3,
            retry_delay_ms: 1000,
            max_queue_size: 10000,
            realtime: true,
        }
    }
}

impl From<&SyncConfig> for SyncQueueConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            max_retry_attempts: config.max_retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
            max_queue_size: config.max_queue_size,
            realtime: config.realtime,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs dropped because the leaf was deleted or the session ended
    pub skipped: usize,
    pub retried: usize,
}

#[derive(Debug, Clone)]
struct SyncJob {
    leaf: NodeId,
    retry_count: usize,
}

/// Pending jobs plus the set of leaves they cover
#[derive(Default)]
struct Pending {
    jobs: VecDeque<SyncJob>,
    queued: HashSet<NodeId>,
}

impl Pending {
    fn push(&mut self, job: SyncJob) -> bool {
        if !self.queued.insert(job.leaf.clone()) {
            return false;
        }
        self.jobs.push_back(job);
        true
    }

    fn pop(&mut self) -> Option<SyncJob> {
        let job = self.jobs.pop_front()?;
        self.queued.remove(&job.leaf);
        Some(job)
    }
}

pub struct SyncQueue {
    engine: Arc<SyncEngine>,
    pending: Arc<Mutex<Pending>>,
    /// Wakes workers when jobs are enqueued
    notify: Arc<Notify>,
    workers: Arc<RwLock<Vec<JoinHandle<()>>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    /// Realtime subscriptions by leaf, empty unless `realtime` is on
    followed: Arc<Mutex<HashMap<NodeId, Subscription>>>,
    config: SyncQueueConfig,
    running: Arc<RwLock<bool>>,
    stats: Arc<RwLock<QueueStats>>,
}

impl SyncQueue {
    pub fn new(engine: Arc<SyncEngine>, config: SyncQueueConfig) -> Self {
        Self {
            engine,
            pending: Arc::new(Mutex::new(Pending::default())),
            notify: Arc::new(Notify::new()),
            workers: Arc::new(RwLock::new(Vec::new())),
            listener: Mutex::new(None),
            followed: Arc::new(Mutex::new(HashMap::new())),
            config,
            running: Arc::new(RwLock::new(false)),
            stats: Arc::new(RwLock::new(QueueStats::default())),
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Queue a sync of `leaf`
    ///
    /// Returns `Ok(false)` when the leaf is already pending or the session is
    /// signed out.
    pub fn enqueue(&self, leaf: &str) -> Result<bool, SyncError> {
        Self::push(
            &self.engine,
            &self.pending,
            &self.notify,
            &self.stats,
            &self.config,
            SyncJob {
                leaf: leaf.to_string(),
                retry_count: 0,
            },
        )
    }

    fn push(
        engine: &SyncEngine,
        pending: &Mutex<Pending>,
        notify: &Notify,
        stats: &RwLock<QueueStats>,
        config: &SyncQueueConfig,
        job: SyncJob,
    ) -> Result<bool, SyncError> {
        if !engine.is_signed_in() {
            return Ok(false);
        }

        let mut pending = pending.lock();
        if pending.jobs.len() >= config.max_queue_size {
            warn!(
                queue_size = pending.jobs.len(),
                max_size = config.max_queue_size,
                "Sync queue is full, dropping job"
            );
            return Err(SyncError::Queue("sync queue is full".to_string()));
        }
        let leaf = job.leaf.clone();
        if !pending.push(job) {
            return Ok(false);
        }
        stats.write().pending += 1;
        drop(pending);

        notify.notify_one();
        debug!(node_id = %leaf, "Enqueued sync job");
        Ok(true)
    }

    /// Re-queue every leaf whose last sync failed
    pub fn reconnect(&self) -> usize {
        let failed = self.engine.store().status().failed_leaves();
        let mut queued = 0;
        for leaf in &failed {
            if matches!(self.enqueue(leaf), Ok(true)) {
                queued += 1;
            }
        }
        info!(failed = failed.len(), queued, "Re-queued failed leaves");
        queued
    }

    /// Queue every leaf in the tree
    pub fn enqueue_all(&self) -> usize {
        self.engine
            .store()
            .leaf_ids()
            .iter()
            .filter(|leaf| matches!(self.enqueue(leaf), Ok(true)))
            .count()
    }

    /// Start workers and the tree event listener
    pub fn start(&self) {
        let mut running = self.running.write();
        if *running {
            return;
        }
        *running = true;
        drop(running);

        let mut workers = self.workers.write();
        for i in 0..self.config.workers {
            let engine = Arc::clone(&self.engine);
            let pending = Arc::clone(&self.pending);
            let notify = Arc::clone(&self.notify);
            let config = self.config.clone();
            let running = Arc::clone(&self.running);
            let stats = Arc::clone(&self.stats);

            workers.push(tokio::spawn(async move {
                Self::worker_loop(i, engine, pending, notify, config, running, stats).await;
            }));
        }

        let events = self.engine.store().subscribe();
        if self.config.realtime {
            for leaf in self.engine.store().leaf_ids() {
                Self::follow(&self.engine, &self.followed, &leaf);
            }
        }
        *self.listener.lock() = Some(tokio::spawn(Self::listen(
            events,
            Arc::clone(&self.engine),
            Arc::clone(&self.pending),
            Arc::clone(&self.notify),
            Arc::clone(&self.stats),
            Arc::clone(&self.followed),
            self.config.clone(),
        )));

        info!(
            worker_count = workers.len(),
            realtime = self.config.realtime,
            "Started sync queue workers"
        );
    }

    /// Stop the listener and wait for workers to finish their current job
    pub async fn stop(&self) {
        let mut running = self.running.write();
        if !*running {
            return;
        }
        *running = false;
        drop(running);

        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        self.followed.lock().clear();
        self.notify.notify_waiters();
        let workers = std::mem::take(&mut *self.workers.write());
        for handle in workers {
            let _ = handle.await;
        }
        info!("Stopped sync queue workers");
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    /// Leaves with a live realtime subscription
    pub fn followed_leaves(&self) -> Vec<NodeId> {
        let mut leaves: Vec<NodeId> = self.followed.lock().keys().cloned().collect();
        leaves.sort();
        leaves
    }

    /// Subscribe to remote changes for `leaf` unless already following it
    fn follow(engine: &Arc<SyncEngine>, followed: &Mutex<HashMap<NodeId, Subscription>>, leaf: &str) {
        let mut followed = followed.lock();
        if followed.contains_key(leaf) {
            return;
        }
        match engine.subscribe(leaf) {
            Ok(subscription) => {
                followed.insert(leaf.to_string(), subscription);
            }
            Err(e) => warn!(node_id = leaf, error = %e, "Realtime subscription failed"),
        }
    }

    /// Wait until nothing is pending or processing
    pub async fn wait_for_idle(&self, timeout: Option<Duration>) -> Result<(), SyncError> {
        let start = Instant::now();
        loop {
            {
                let pending = self.pending.lock();
                let stats = self.stats.read();
                if pending.jobs.is_empty() && stats.processing == 0 {
                    return Ok(());
                }
            }

            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    return Err(SyncError::Queue(
                        "timeout waiting for sync queue to drain".to_string(),
                    ));
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn listen(
        mut events: broadcast::Receiver<TreeEvent>,
        engine: Arc<SyncEngine>,
        pending: Arc<Mutex<Pending>>,
        notify: Arc<Notify>,
        stats: Arc<RwLock<QueueStats>>,
        followed: Arc<Mutex<HashMap<NodeId, Subscription>>>,
        config: SyncQueueConfig,
    ) {
        loop {
            let leaves = match events.recv().await {
                Ok(event) if event.is_local() => event.affected_leaves,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Sync listener lagged, queueing every leaf");
                    engine.store().leaf_ids()
                }
                Err(RecvError::Closed) => break,
            };
            for leaf in leaves {
                if config.realtime {
                    if engine.store().contains(&leaf) {
                        Self::follow(&engine, &followed, &leaf);
                    } else {
                        followed.lock().remove(&leaf);
                    }
                }
                let job = SyncJob {
                    leaf,
                    retry_count: 0,
                };
                let _ = Self::push(&engine, &pending, &notify, &stats, &config, job);
            }
        }
    }

    async fn worker_loop(
        worker_id: usize,
        engine: Arc<SyncEngine>,
        pending: Arc<Mutex<Pending>>,
        notify: Arc<Notify>,
        config: SyncQueueConfig,
        running: Arc<RwLock<bool>>,
        stats: Arc<RwLock<QueueStats>>,
    ) {
        debug!(worker_id, "Worker started");

        while *running.read() {
            // Pop and mark processing under one lock so idle checks never
            // see a job in neither state
            let job = {
                let mut pending = pending.lock();
                let job = pending.pop();
                if job.is_some() {
                    let mut stats = stats.write();
                    stats.pending = stats.pending.saturating_sub(1);
                    stats.processing += 1;
                }
                job
            };

            let Some(mut job) = job else {
                tokio::select! {
                    _ = notify.notified() => continue,
                    _ = sleep(Duration::from_millis(100)) => continue,
                }
            };

            let result = if engine.is_signed_in() {
                engine.sync_local_to_remote(&job.leaf).await
            } else {
                Err(SyncError::SignedOut)
            };

            let should_retry = {
                let mut stats = stats.write();
                match &result {
                    Ok(_) => {
                        stats.completed += 1;
                        stats.processing = stats.processing.saturating_sub(1);
                        false
                    }
                    Err(SyncError::LeafGone(_)) | Err(SyncError::SignedOut) => {
                        stats.skipped += 1;
                        stats.processing = stats.processing.saturating_sub(1);
                        false
                    }
                    Err(e) => {
                        let retry = job.retry_count < config.max_retry_attempts && e.is_retryable();
                        if !retry {
                            stats.failed += 1;
                            stats.processing = stats.processing.saturating_sub(1);
                            error!(
                                worker_id,
                                node_id = %job.leaf,
                                retry_count = job.retry_count,
                                error = %e,
                                "Sync job failed permanently"
                            );
                        }
                        retry
                    }
                }
            };

            if should_retry {
                job.retry_count += 1;
                sleep(Duration::from_millis(config.retry_delay_ms)).await;

                {
                    let mut stats_guard = stats.write();
                    stats_guard.retried += 1;
                    stats_guard.processing = stats_guard.processing.saturating_sub(1);
                }
                let _ = Self::push(&engine, &pending, &notify, &stats, &config, job);
            }
        }

        debug!(worker_id, "Worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use crate::store::{StatusBoard, SyncStatus, TreeStore};
    use crate::sync::remote::MemoryRemoteStore;
    use crate::tree::Tree;

    fn queue_with(config: SyncQueueConfig) -> (SyncQueue, Arc<TreeStore>, Arc<MemoryRemoteStore>) {
        let store = Arc::new(TreeStore::new(
            Tree::new(),
            Arc::new(MemoryPersistence::new()),
            Arc::new(StatusBoard::new()),
        ));
        let remote = Arc::new(MemoryRemoteStore::new());
        let engine = Arc::new(SyncEngine::new(store.clone(), remote.clone()));
        (SyncQueue::new(engine, config), store, remote)
    }

    fn fast_config() -> SyncQueueConfig {
        SyncQueueConfig {
            workers: 2,
            max_retry_attempts: 2,
            retry_delay_ms: 5,
            max_queue_size: 100,
            realtime: false,
        }
    }

    #[tokio::test]
    async fn test_enqueue_dedupes_pending() {
        let (queue, store, _) = queue_with(fast_config());
        let leaf = store.add_project("P", None).unwrap();

        assert!(queue.enqueue(&leaf).unwrap());
        assert!(!queue.enqueue(&leaf).unwrap());
        assert_eq!(queue.stats().pending, 1);
    }

    #[tokio::test]
    async fn test_queue_full() {
        let mut config = fast_config();
        config.max_queue_size = 1;
        let (queue, _, _) = queue_with(config);

        queue.enqueue("a").unwrap();
        assert!(matches!(queue.enqueue("b"), Err(SyncError::Queue(_))));
    }

    #[tokio::test]
    async fn test_signed_out_enqueues_nothing() {
        let (queue, store, _) = queue_with(fast_config());
        let leaf = store.add_project("P", None).unwrap();
        queue.engine().set_signed_in(false);

        assert!(!queue.enqueue(&leaf).unwrap());
        assert_eq!(queue.stats().pending, 0);
    }

    #[tokio::test]
    async fn test_workers_drain_local_commits() {
        let (queue, store, remote) = queue_with(fast_config());
        queue.start();

        let leaf = store.add_project("P", None).unwrap();
        for _ in 0..200 {
            if remote.record_for(&leaf).is_some() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        queue.wait_for_idle(Some(Duration::from_secs(5))).await.unwrap();

        assert!(remote.record_for(&leaf).is_some());
        assert_eq!(store.status().leaf(&leaf).unwrap().status, SyncStatus::Saved);
        queue.stop().await;
        assert!(!queue.is_running());
    }

    #[tokio::test]
    async fn test_retries_then_fails_and_reconnects() {
        let (queue, store, remote) = queue_with(fast_config());
        let leaf = store.add_project("P", None).unwrap();
        remote.set_failing(true);
        queue.start();
        queue.enqueue(&leaf).unwrap();

        for _ in 0..400 {
            if queue.stats().failed == 1 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        let stats = queue.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retried, 2);
        assert_eq!(store.status().failed_leaves(), vec![leaf.clone()]);

        remote.set_failing(false);
        assert_eq!(queue.reconnect(), 1);
        queue.wait_for_idle(Some(Duration::from_secs(5))).await.unwrap();
        assert!(store.status().failed_leaves().is_empty());
        assert!(remote.record_for(&leaf).is_some());
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_realtime_follows_leaves_while_running() {
        let mut config = fast_config();
        config.realtime = true;
        let (queue, store, remote) = queue_with(config);
        let existing = store.add_project("Existing", None).unwrap();
        queue.start();
        assert_eq!(queue.followed_leaves(), vec![existing.clone()]);

        let added = store.add_project("Added", None).unwrap();
        for _ in 0..200 {
            if queue.followed_leaves().len() == 2 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        queue.wait_for_idle(Some(Duration::from_secs(5))).await.unwrap();

        let (mut snapshot, _) = store.leaf_snapshot(&added).unwrap();
        snapshot.name = "Edited elsewhere".to_string();
        let newer = store.leaf_modified(&added).unwrap() + 1_000;
        remote.put_external(&added, snapshot.to_value(), newer);
        for _ in 0..200 {
            if store.leaf_modified(&added) == Some(newer) {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.node(&added).unwrap().name, "Edited elsewhere");

        store.delete_node(&existing).unwrap();
        for _ in 0..200 {
            if queue.followed_leaves() == vec![added.clone()] {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(queue.followed_leaves(), vec![added.clone()]);

        queue.stop().await;
        assert!(queue.followed_leaves().is_empty());
    }

    #[tokio::test]
    async fn test_realtime_off_ignores_remote_changes() {
        let (queue, store, remote) = queue_with(fast_config());
        let leaf = store.add_project("Local", None).unwrap();
        queue.start();
        queue.enqueue(&leaf).unwrap();
        queue.wait_for_idle(Some(Duration::from_secs(5))).await.unwrap();
        assert!(queue.followed_leaves().is_empty());

        let (mut snapshot, local_ts) = store.leaf_snapshot(&leaf).unwrap();
        snapshot.name = "Edited elsewhere".to_string();
        remote.put_external(&leaf, snapshot.to_value(), local_ts + 1_000);
        sleep(Duration::from_millis(50)).await;

        assert_eq!(store.node(&leaf).unwrap().name, "Local");
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_deleted_leaf_is_skipped() {
        let (queue, store, _) = queue_with(fast_config());
        let leaf = store.add_project("P", None).unwrap();
        queue.enqueue(&leaf).unwrap();
        store.delete_node(&leaf).unwrap();

        queue.start();
        queue.wait_for_idle(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(queue.stats().skipped, 1);
        queue.stop().await;
    }
}
