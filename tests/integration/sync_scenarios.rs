use crate::integration::support::{eventually, harness};
use grove::store::SyncStatus;
use grove::sync::{SyncOutcome, SyncQueue, SyncQueueConfig};
use serde_json::json;
use std::time::Duration;

fn remote_copy(h: &crate::integration::support::Harness, leaf: &str, name: &str) -> serde_json::Value {
    let (mut snapshot, _) = h.store.leaf_snapshot(leaf).unwrap();
    snapshot.name = name.to_string();
    snapshot.to_value()
}

#[tokio::test]
async fn sync_is_idempotent() {
    let h = harness(1_000);
    let leaf = h.store.add_project("Idempotent", None).unwrap();
    h.store.push_component(&leaf, "text", json!({"text": "hi"})).unwrap();

    h.engine.sync_local_to_remote(&leaf).await.unwrap();
    let after_first = h.remote.record_for(&leaf).unwrap();
    let requests = h.remote.request_count();

    let outcome = h.engine.sync_local_to_remote(&leaf).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Unchanged);
    assert_eq!(h.remote.record_for(&leaf).unwrap(), after_first);
    // Second pass answered from the record index without touching the remote
    assert_eq!(h.remote.request_count(), requests);
}

#[tokio::test]
async fn remote_newer_wins() {
    let h = harness(100);
    let leaf = h.store.add_project("local", None).unwrap();
    let record = h.remote.put_external(&leaf, remote_copy(&h, &leaf, "remote"), 200);

    assert_eq!(h.engine.reconcile(&leaf, record).await.unwrap(), SyncOutcome::PulledRemote);
    assert_eq!(h.store.node(&leaf).unwrap().name, "remote");
    assert_eq!(h.store.leaf_modified(&leaf), Some(200));
}

#[tokio::test]
async fn local_newer_wins() {
    let h = harness(200);
    let leaf = h.store.add_project("local", None).unwrap();
    let record = h.remote.put_external(&leaf, remote_copy(&h, &leaf, "remote"), 100);

    assert_eq!(h.engine.reconcile(&leaf, record).await.unwrap(), SyncOutcome::Pushed);
    assert_eq!(h.store.node(&leaf).unwrap().name, "local");
    let stored = h.remote.record_for(&leaf).unwrap();
    assert_eq!(stored.data["name"], "local");
    assert_eq!(stored.last_modified, 200);
}

#[tokio::test]
async fn edit_during_fetch_beats_older_remote() {
    // Local at t=5 dispatches a fetch; local edits at t=10 while it is in
    // flight; the fetch returns remote state stamped t=7.
    let h = harness(5);
    let leaf = h.store.add_project("t5", None).unwrap();
    assert_eq!(h.store.leaf_modified(&leaf), Some(5));
    h.remote.put_external(&leaf, remote_copy(&h, &leaf, "t7"), 7);

    h.remote.set_paused(true);
    let engine = h.engine.clone();
    let pull_leaf = leaf.clone();
    let pending = tokio::spawn(async move { engine.pull(&pull_leaf).await });
    let remote = h.remote.clone();
    assert!(eventually(|| remote.in_flight() > 0).await);

    h.clock.set(10);
    h.store.rename_node(&leaf, "t10").unwrap();
    h.remote.set_paused(false);

    pending.await.unwrap().unwrap();
    assert_eq!(h.store.node(&leaf).unwrap().name, "t10");
    assert_eq!(h.store.leaf_modified(&leaf), Some(10));
    let stored = h.remote.record_for(&leaf).unwrap();
    assert_eq!(stored.data["name"], "t10");
    assert_eq!(stored.last_modified, 10);
}

#[tokio::test]
async fn failed_sync_keeps_local_state_and_reports_error() {
    let h = harness(100);
    let leaf = h.store.add_project("offline", None).unwrap();
    h.remote.set_failing(true);

    assert!(h.engine.sync_local_to_remote(&leaf).await.is_err());
    assert_eq!(h.store.node(&leaf).unwrap().name, "offline");
    assert!(matches!(
        h.store.status().leaf(&leaf).unwrap().status,
        SyncStatus::Error(_)
    ));
}

#[tokio::test]
async fn queue_carries_local_edits_to_remote() {
    let h = harness(100);
    let queue = SyncQueue::new(
        h.engine.clone(),
        SyncQueueConfig {
            workers: 2,
            max_retry_attempts: 1,
            retry_delay_ms: 5,
            max_queue_size: 100,
            realtime: false,
        },
    );
    queue.start();

    let folder = h.store.add_folder("F", None).unwrap();
    let a = h.store.add_project("A", Some(&folder)).unwrap();
    let b = h.store.add_project("B", None).unwrap();
    h.clock.set(500);
    h.store.push_component(&a, "text", json!({"text": "body"})).unwrap();

    let remote = h.remote.clone();
    let (a2, b2) = (a.clone(), b.clone());
    assert!(
        eventually(|| {
            remote.record_for(&a2).is_some_and(|r| r.last_modified == 500) && remote.record_for(&b2).is_some()
        })
        .await
    );
    queue.wait_for_idle(Some(Duration::from_secs(5))).await.unwrap();

    let record = h.remote.record_for(&a).unwrap();
    assert_eq!(record.data["componentList"][0]["payload"]["text"], "body");
    assert_eq!(h.remote.records().len(), 2);
    queue.stop().await;
}

#[tokio::test]
async fn remote_change_arrives_through_subscription() {
    let h = harness(100);
    let leaf = h.store.add_project("local", None).unwrap();
    h.engine.sync_local_to_remote(&leaf).await.unwrap();
    let _subscription = h.engine.subscribe(&leaf).unwrap();

    h.remote.put_external(&leaf, remote_copy(&h, &leaf, "from another device"), 900);

    let store = h.store.clone();
    let id = leaf.clone();
    assert!(eventually(|| store.leaf_modified(&id) == Some(900)).await);
    assert_eq!(h.store.node(&leaf).unwrap().name, "from another device");
}

#[tokio::test]
async fn signed_out_session_skips_sync() {
    let h = harness(100);
    let leaf = h.store.add_project("P", None).unwrap();
    h.engine.set_signed_in(false);

    let report = h.engine.sync_all().await;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(h.remote.request_count(), 0);

    h.engine.set_signed_in(true);
    let report = h.engine.sync_all().await;
    assert_eq!(report.created, 1);
    assert!(h.remote.record_for(&leaf).is_some());
}

#[tokio::test]
async fn deleting_a_project_leaves_its_remote_record() {
    let h = harness(100);
    let leaf = h.store.add_project("P", None).unwrap();
    h.engine.sync_local_to_remote(&leaf).await.unwrap();

    h.store.delete_node(&leaf).unwrap();
    assert!(h.remote.record_for(&leaf).is_some());
    assert!(h.engine.sync_local_to_remote(&leaf).await.is_err());
}
