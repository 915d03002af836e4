use nsmeta::coordinator::RemoveOptions;
use nsmeta::error::{ApiError, StorageError};
use nsmeta::listing::FileQuery;
use nsmeta::store::NamespaceStore;
use nsmeta::types::TenantId;
use tempfile::TempDir;

use crate::support::{child_segments, file, path, sled_coordinator};

#[test]
fn tree_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let tenant = TenantId::new("durable");
    let id = {
        let (store, coordinator) = sled_coordinator(&temp_dir);
        coordinator.provision(&tenant).unwrap();
        let tree = coordinator.create(&tenant, "/docs/2024").unwrap();
        coordinator.touch(&tenant, "/docs", file("readme")).unwrap();
        store.flush().unwrap();
        tree.get_subtree(&path("/docs/2024")).unwrap().id
    };

    let (_store, coordinator) = sled_coordinator(&temp_dir);
    let tree = coordinator.get_tree(&tenant).unwrap();
    assert_eq!(tree.get_subtree(&path("/docs/2024")).unwrap().id, id);
    assert_eq!(coordinator.list_files(&tenant, false).unwrap().len(), 1);
}

#[test]
fn provision_twice_fails() {
    let temp_dir = TempDir::new().unwrap();
    let (_store, coordinator) = sled_coordinator(&temp_dir);
    let tenant = TenantId::new("t");
    coordinator.provision(&tenant).unwrap();
    assert!(matches!(
        coordinator.provision(&tenant),
        Err(ApiError::StorageError(StorageError::NamespaceExists(_)))
    ));
}

#[test]
fn forced_remove_commits_tree_and_records_together() {
    let temp_dir = TempDir::new().unwrap();
    let (store, coordinator) = sled_coordinator(&temp_dir);
    let tenant = TenantId::new("t");
    coordinator.provision(&tenant).unwrap();
    coordinator.create(&tenant, "/a/b").unwrap();
    coordinator.create(&tenant, "/c").unwrap();
    coordinator.touch(&tenant, "/a", file("1")).unwrap();
    coordinator.touch(&tenant, "/a/b", file("2")).unwrap();
    coordinator.touch(&tenant, "/c", file("3")).unwrap();
    let version = store.load_tree(&tenant).unwrap().version;

    let report = coordinator
        .remove(&tenant, "/a", RemoveOptions { force: true })
        .unwrap();
    assert_eq!(report.soft_deleted, 2);
    assert_eq!(report.version, version + 1);
    assert_eq!(store.load_tree(&tenant).unwrap().version, version + 1);

    let tree = coordinator.get_tree(&tenant).unwrap();
    assert_eq!(child_segments(&tree, "/"), vec!["c"]);
    let live = coordinator.list_files(&tenant, false).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].name, "3");
    assert_eq!(coordinator.list_files(&tenant, true).unwrap().len(), 3);
}

#[test]
fn stale_cascade_commit_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (store, coordinator) = sled_coordinator(&temp_dir);
    let tenant = TenantId::new("t");
    coordinator.provision(&tenant).unwrap();
    let tree = coordinator.create(&tenant, "/a").unwrap();
    let dir = tree.get_subtree(&path("/a")).unwrap().id;
    coordinator.touch(&tenant, "/a", file("1")).unwrap();
    let stored = store.load_tree(&tenant).unwrap();

    let err = store
        .commit_cascade(
            &tenant,
            &stored.blob,
            stored.version + 5,
            &[dir],
            chrono::Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::VersionConflict { .. }));
    assert_eq!(store.count_file_records(&tenant, &dir).unwrap(), 1);
    assert_eq!(store.load_tree(&tenant).unwrap().version, stored.version);
}

#[test]
fn missing_namespace_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let (_store, coordinator) = sled_coordinator(&temp_dir);
    let err = coordinator
        .create(&TenantId::new("nobody"), "/a")
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::StorageError(StorageError::NamespaceNotFound(_))
    ));
}

#[test]
fn tenant_whose_id_extends_another_sees_only_its_files() {
    let temp_dir = TempDir::new().unwrap();
    let (_store, coordinator) = sled_coordinator(&temp_dir);
    let short = TenantId::new("a");
    let long = TenantId::new("a\0b");
    coordinator.provision(&short).unwrap();
    coordinator.provision(&long).unwrap();
    coordinator.touch(&long, "/", file("theirs")).unwrap();
    coordinator.touch(&short, "/", file("mine")).unwrap();

    let listed = coordinator.list_files(&short, true).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "mine");
    assert_eq!(coordinator.file_counts(&short).unwrap().len(), 1);
    assert_eq!(coordinator.reconcile(&short).unwrap(), 0);
    assert_eq!(coordinator.list_files(&long, false).unwrap().len(), 1);
}

#[test]
fn file_lifecycle_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let tenant = TenantId::new("files");
    {
        let (store, coordinator) = sled_coordinator(&temp_dir);
        coordinator.provision(&tenant).unwrap();
        coordinator.create(&tenant, "/inbox").unwrap();
        coordinator.create(&tenant, "/done").unwrap();
        coordinator.touch(&tenant, "/inbox", file("a.pdf")).unwrap();
        coordinator.touch(&tenant, "/inbox", file("b.pdf")).unwrap();
        coordinator
            .move_file(&tenant, "/inbox/a.pdf", "/done/a-final.pdf")
            .unwrap();
        coordinator
            .remove_files(&tenant, "/inbox", &["b.pdf".to_string()])
            .unwrap();
        store.flush().unwrap();
    }

    let (_store, coordinator) = sled_coordinator(&temp_dir);
    let live = FileQuery::default();
    let done = coordinator.list_directory(&tenant, "/done", &live).unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].name, "a-final.pdf");
    assert!(coordinator.list_directory(&tenant, "/inbox", &live).unwrap().is_empty());

    let trash = FileQuery {
        trash: true,
        ..FileQuery::default()
    };
    let trashed = coordinator.list_directory(&tenant, "/inbox", &trash).unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].name, "b.pdf");
    assert!(matches!(
        coordinator.move_file(&tenant, "/inbox/b.pdf", "/done/b.pdf"),
        Err(ApiError::PathNotFound(_))
    ));
}
