use crate::integration::support::empty_store;
use grove::error::TreeError;
use grove::store::ChangeKind;
use proptest::prelude::*;

#[test]
fn add_folder_then_project_inside() {
    let (store, persistence) = empty_store();
    let folder = store.add_folder("Work", None).unwrap();
    let project = store.add_project("Report", Some(&folder)).unwrap();

    let tree = store.tree();
    assert_eq!(tree.root_ids, vec![folder.clone()]);
    assert_eq!(tree.get(&folder).unwrap().children(), &[project.clone()]);
    assert_eq!(tree.get(&project).unwrap().parent_id.as_deref(), Some(folder.as_str()));
    assert!(tree.get(&project).unwrap().components().is_empty());
    assert_eq!(persistence.write_count(), 2);
}

#[test]
fn move_nested_project_to_root() {
    let (store, _) = empty_store();
    let a = store.add_folder("A", None).unwrap();
    let b = store.add_project("B", Some(&a)).unwrap();

    store.move_node(&b, None, 1).unwrap();

    let tree = store.tree();
    assert_eq!(tree.root_ids, vec![a.clone(), b.clone()]);
    assert!(tree.get(&a).unwrap().children().is_empty());
    assert_eq!(tree.get(&b).unwrap().parent_id, None);
}

#[test]
fn delete_folder_cascades() {
    let (store, _) = empty_store();
    let outer = store.add_folder("Outer", None).unwrap();
    let inner = store.add_folder("Inner", Some(&outer)).unwrap();
    let p1 = store.add_project("P1", Some(&inner)).unwrap();
    let p2 = store.add_project("P2", Some(&outer)).unwrap();
    let keep = store.add_project("Keep", None).unwrap();

    let mut removed = store.delete_node(&outer).unwrap();
    removed.sort();
    let mut expected = vec![outer, inner, p1, p2];
    expected.sort();
    assert_eq!(removed, expected);

    let tree = store.tree();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root_ids, vec![keep]);
    tree.check_invariants().unwrap();
}

#[test]
fn cycle_rejection_leaves_tree_identical() {
    let (store, persistence) = empty_store();
    let a = store.add_folder("A", None).unwrap();
    let b = store.add_folder("B", Some(&a)).unwrap();
    let c = store.add_folder("C", Some(&b)).unwrap();
    let before = store.tree();
    let writes = persistence.write_count();
    let version = store.version();

    assert!(matches!(
        store.move_node(&a, Some(&c), 0),
        Err(TreeError::CycleError { .. })
    ));
    assert!(matches!(
        store.move_node(&a, Some(&a), 0),
        Err(TreeError::CycleError { .. })
    ));

    assert_eq!(store.tree(), before);
    assert_eq!(store.version(), version);
    assert_eq!(persistence.write_count(), writes);
}

#[test]
fn invalid_parent_is_rejected() {
    let (store, _) = empty_store();
    let project = store.add_project("P", None).unwrap();
    assert!(matches!(
        store.add_project("Q", Some(&project)),
        Err(TreeError::InvalidParent(_))
    ));
    assert!(matches!(
        store.add_folder("Q", Some("missing")),
        Err(TreeError::InvalidParent(_))
    ));
    assert_eq!(store.tree().len(), 1);
}

#[test]
fn subscribers_see_affected_leaves() {
    let (store, _) = empty_store();
    let folder = store.add_folder("F", None).unwrap();
    let p1 = store.add_project("P1", Some(&folder)).unwrap();
    let p2 = store.add_project("P2", Some(&folder)).unwrap();
    let other = store.add_folder("Other", None).unwrap();

    let mut events = store.subscribe();
    store.move_node(&folder, Some(&other), 0).unwrap();

    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, ChangeKind::Moved);
    let mut affected = event.affected_leaves.clone();
    affected.sort();
    let mut expected = vec![p1, p2];
    expected.sort();
    assert_eq!(affected, expected);
}

#[derive(Debug, Clone)]
enum Op {
    AddFolder(usize),
    AddProject(usize),
    Move(usize, usize, usize),
    MoveToRoot(usize, usize),
    Delete(usize),
    Rename(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..16).prop_map(Op::AddFolder),
        (0usize..16).prop_map(Op::AddProject),
        (0usize..16, 0usize..16, 0usize..6).prop_map(|(n, p, i)| Op::Move(n, p, i)),
        (0usize..16, 0usize..6).prop_map(|(n, i)| Op::MoveToRoot(n, i)),
        (0usize..16).prop_map(Op::Delete),
        (0usize..16).prop_map(Op::Rename),
    ]
}

proptest! {
    #[test]
    fn store_keeps_invariants(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (store, _) = empty_store();
        for op in ops {
            let ids: Vec<String> = store.read(|t| t.items.keys().cloned().collect());
            let pick = |i: usize| ids.get(i % ids.len().max(1)).cloned();
            let before = store.tree();
            let result = match op {
                Op::AddFolder(p) => store.add_folder("f", pick(p).as_deref()).map(|_| ()),
                Op::AddProject(p) => store.add_project("p", pick(p).as_deref()).map(|_| ()),
                Op::Move(n, p, i) => match (pick(n), pick(p)) {
                    (Some(n), Some(p)) => store.move_node(&n, Some(&p), i),
                    _ => Ok(()),
                },
                Op::MoveToRoot(n, i) => match pick(n) {
                    Some(n) => store.move_node(&n, None, i),
                    None => Ok(()),
                },
                Op::Delete(n) => match pick(n) {
                    Some(n) => store.delete_node(&n).map(|_| ()),
                    None => Ok(()),
                },
                Op::Rename(n) => match pick(n) {
                    Some(n) => store.rename_node(&n, "renamed"),
                    None => Ok(()),
                },
            };
            if result.is_err() {
                prop_assert_eq!(store.tree(), before);
            }
            prop_assert!(store.tree().check_invariants().is_ok());
        }
    }
}
