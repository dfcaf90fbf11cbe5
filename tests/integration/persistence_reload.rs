use grove::persistence::{MemoryPersistence, PersistenceGateway, SledPersistence};
use grove::store::{PersistenceStatus, StatusBoard, TreeStore};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn open(dir: &TempDir) -> TreeStore {
    let persistence = Arc::new(SledPersistence::open(&dir.path().join("db")).unwrap());
    TreeStore::load(persistence, Arc::new(StatusBoard::new()))
}

#[test]
fn fresh_database_is_seeded_and_persisted() {
    let dir = TempDir::new().unwrap();
    let first = open(&dir).tree();
    assert_eq!(first.leaf_ids().len(), 1);

    // Second open sees the persisted seed, not a new one
    let second = open(&dir).tree();
    assert_eq!(first, second);
}

#[test]
fn every_commit_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let (folder, project, expected) = {
        let store = open(&dir);
        let folder = store.add_folder("Archive", None).unwrap();
        let project = store.add_project("Old", Some(&folder)).unwrap();
        store.push_component(&project, "note", json!({"text": "keep me"})).unwrap();
        store.rename_node(&folder, "Archive 2024").unwrap();
        (folder, project, store.tree())
    };

    let reopened = open(&dir);
    assert_eq!(reopened.tree(), expected);
    assert_eq!(reopened.node(&folder).unwrap().name, "Archive 2024");
    assert_eq!(reopened.components(&project).unwrap()[0].payload["text"], "keep me");
}

#[test]
fn write_failure_is_reported_but_edit_is_kept() {
    let persistence = Arc::new(MemoryPersistence::new());
    let status = Arc::new(StatusBoard::new());
    let store = TreeStore::load(persistence.clone() as Arc<dyn PersistenceGateway>, status.clone());
    let mut watch = status.watch();
    watch.borrow_and_update();

    persistence.fail_writes(true);
    let id = store.add_project("Unsaved", None).unwrap();

    assert!(store.contains(&id));
    assert!(matches!(status.persistence(), PersistenceStatus::Error(_)));
    assert!(watch.has_changed().unwrap());

    persistence.fail_writes(false);
    store.rename_node(&id, "Saved").unwrap();
    assert_eq!(status.persistence(), PersistenceStatus::Ok);
    assert_eq!(persistence.load().unwrap().unwrap(), store.tree());
}
