use crate::integration::support::empty_store;
use grove::dnd::{apply_drop, DragConfig, DragGesture, DropTarget, DropZoneResolver, Point, TreeLayout};
use std::collections::HashSet;

fn row_center(metrics: &DragConfig, row: usize) -> f32 {
    metrics.row_height * (row as f32 + 0.5)
}

#[test]
fn drag_project_into_expanded_folder_gap() {
    let (store, _) = empty_store();
    let folder = store.add_folder("Folder", None).unwrap();
    let first = store.add_project("First", Some(&folder)).unwrap();
    let loose = store.add_project("Loose", None).unwrap();

    let metrics = DragConfig::default();
    let expanded: HashSet<String> = [folder.clone()].into_iter().collect();
    let layout = TreeLayout::build(&store.tree(), &expanded, &metrics);
    // Rows: Folder, First, Loose
    assert_eq!(layout.rows().len(), 3);

    let mut gesture =
        DragGesture::pointer_down(&layout, Point::new(4.0, row_center(&metrics, 2)), metrics.activation_distance)
            .unwrap();
    assert_eq!(gesture.source(), loose);

    // Boundary below "First", indented to the child depth
    let drop_at = Point::new(metrics.indent_width * 1.5, metrics.row_height * 2.0);
    gesture.pointer_move(&layout, drop_at);
    assert!(gesture.is_active());

    let instruction = store.read(|tree| gesture.pointer_up(&layout, tree, drop_at)).unwrap();
    assert_eq!(instruction.parent.as_deref(), Some(folder.as_str()));
    assert_eq!(instruction.index, 1);
    assert!(apply_drop(&store, &instruction));

    let tree = store.tree();
    assert_eq!(tree.get(&folder).unwrap().children(), &[first, loose]);
    assert_eq!(tree.root_ids, vec![folder]);
}

#[test]
fn dropping_folder_into_its_own_child_is_ignored() {
    let (store, _) = empty_store();
    let outer = store.add_folder("Outer", None).unwrap();
    let inner = store.add_folder("Inner", Some(&outer)).unwrap();
    let before = store.tree();

    let metrics = DragConfig::default();
    let expanded: HashSet<String> = [outer.clone(), inner.clone()].into_iter().collect();
    let layout = TreeLayout::build(&before, &expanded, &metrics);

    let gesture =
        DragGesture::pointer_down(&layout, Point::new(4.0, row_center(&metrics, 0)), metrics.activation_distance)
            .unwrap();
    let over_inner = Point::new(metrics.indent_width * 1.5, row_center(&metrics, 1));
    assert_eq!(
        layout.hit_test(over_inner),
        Some(DropTarget::FolderHeader { folder: inner })
    );

    let instruction = store.read(|tree| gesture.pointer_up(&layout, tree, over_inner));
    assert!(instruction.is_none());
    assert_eq!(store.tree(), before);
}

#[test]
fn folder_header_resolves_to_first_child_slot() {
    let target = DropTarget::FolderHeader {
        folder: "f".to_string(),
    };
    assert_eq!(DropZoneResolver::resolve(Some(&target)), Some((Some("f".to_string()), 0)));
    assert_eq!(DropZoneResolver::resolve(None), None);
}
