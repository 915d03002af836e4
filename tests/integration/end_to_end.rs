use nsmeta::coordinator::RemoveOptions;

use crate::support::{child_segments, memory_coordinator, path};

#[test]
fn docs_archive_scenario() {
    let (_store, coordinator, tenant) = memory_coordinator();

    coordinator.create(&tenant, "/docs/2024").unwrap();
    let tree = coordinator.create(&tenant, "/docs/2025").unwrap();
    assert_eq!(child_segments(&tree, "/"), vec!["docs"]);
    assert_eq!(child_segments(&tree, "/docs"), vec!["2024", "2025"]);

    let report = coordinator
        .remove(&tenant, "/docs/2024", RemoveOptions::default())
        .unwrap();
    assert_eq!(child_segments(&report.tree, "/docs"), vec!["2025"]);

    coordinator.create(&tenant, "/archive").unwrap();
    let moved_id = coordinator
        .get_tree(&tenant)
        .unwrap()
        .get_subtree(&path("/docs/2025"))
        .unwrap()
        .id;
    let tree = coordinator
        .move_dir(&tenant, "/docs/2025", "/archive/2025")
        .unwrap();

    assert_eq!(child_segments(&tree, "/"), vec!["archive", "docs"]);
    assert_eq!(child_segments(&tree, "/archive"), vec!["2025"]);
    assert!(child_segments(&tree, "/docs").is_empty());
    assert_eq!(
        tree.get_subtree(&path("/archive/2025")).unwrap().id,
        moved_id
    );

    // What was persisted matches what was returned
    assert_eq!(coordinator.get_tree(&tenant).unwrap(), tree);
}

#[test]
fn rename_in_place_keeps_identifier() {
    let (_store, coordinator, tenant) = memory_coordinator();
    let tree = coordinator.create(&tenant, "/drafts/q1").unwrap();
    let id = tree.get_subtree(&path("/drafts")).unwrap().id;

    let tree = coordinator.move_dir(&tenant, "/drafts", "/final").unwrap();
    let renamed = tree.get_subtree(&path("/final")).unwrap();
    assert_eq!(renamed.id, id);
    assert_eq!(renamed.children[0].segment, "q1");
    assert!(tree.get_subtree(&path("/drafts")).is_err());
}
