#![allow(dead_code)]

use grove::persistence::{MemoryPersistence, PersistenceGateway};
use grove::store::{ManualClock, StatusBoard, TreeStore};
use grove::sync::{MemoryRemoteStore, SyncEngine};
use grove::tree::Tree;
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub store: Arc<TreeStore>,
    pub persistence: Arc<MemoryPersistence>,
    pub remote: Arc<MemoryRemoteStore>,
    pub engine: Arc<SyncEngine>,
    pub clock: Arc<ManualClock>,
}

pub fn empty_store() -> (Arc<TreeStore>, Arc<MemoryPersistence>) {
    let persistence = Arc::new(MemoryPersistence::new());
    let store = Arc::new(TreeStore::new(
        Tree::new(),
        persistence.clone() as Arc<dyn PersistenceGateway>,
        Arc::new(StatusBoard::new()),
    ));
    (store, persistence)
}

pub fn harness(start: i64) -> Harness {
    let clock = Arc::new(ManualClock::new(start));
    let persistence = Arc::new(MemoryPersistence::new());
    let store = Arc::new(
        TreeStore::new(
            Tree::new(),
            persistence.clone() as Arc<dyn PersistenceGateway>,
            Arc::new(StatusBoard::new()),
        )
        .with_clock(clock.clone()),
    );
    let remote = Arc::new(MemoryRemoteStore::new());
    let engine = Arc::new(SyncEngine::new(store.clone(), remote.clone()));
    Harness {
        store,
        persistence,
        remote,
        engine,
        clock,
    }
}

/// Poll `check` until it holds or about two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
