//! A second writer with its own lock manager (another process) runs between a
//! coordinator's load and its store write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use nsmeta::coordinator::{NamespaceCoordinator, RemoveOptions};
use nsmeta::error::{ApiError, StorageError};
use nsmeta::store::{
    CascadeCommit, FileRecord, MemoryNamespaceStore, NamespaceStore, StoredTree,
};
use nsmeta::types::{DirectoryId, StorageId, TenantId, Version};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::support::{file, path, sled_coordinator};

type Hook = Box<dyn FnOnce() + Send>;

/// Runs a one-shot hook right before the first versioned write reaches `inner`
struct InterleavingStore<S> {
    inner: Arc<S>,
    before_write: Mutex<Option<Hook>>,
}

impl<S: NamespaceStore> InterleavingStore<S> {
    fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            before_write: Mutex::new(None),
        }
    }

    fn arm(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_write.lock() = Some(Box::new(hook));
    }

    fn fire(&self) {
        let hook = self.before_write.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl<S: NamespaceStore> NamespaceStore for InterleavingStore<S> {
    fn provision(&self, tenant: &TenantId, blob: &str) -> Result<Version, StorageError> {
        self.inner.provision(tenant, blob)
    }

    fn load_tree(&self, tenant: &TenantId) -> Result<StoredTree, StorageError> {
        self.inner.load_tree(tenant)
    }

    fn save_tree(
        &self,
        tenant: &TenantId,
        blob: &str,
        expected: Version,
    ) -> Result<Version, StorageError> {
        self.inner.save_tree(tenant, blob, expected)
    }

    fn soft_delete_file_records(
        &self,
        tenant: &TenantId,
        directory_ids: &[DirectoryId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        self.inner.soft_delete_file_records(tenant, directory_ids, at)
    }

    fn count_file_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
    ) -> Result<usize, StorageError> {
        self.inner.count_file_records(tenant, directory_id)
    }

    fn commit_cascade(
        &self,
        tenant: &TenantId,
        blob: &str,
        expected: Version,
        directory_ids: &[DirectoryId],
        at: DateTime<Utc>,
    ) -> Result<CascadeCommit, StorageError> {
        self.fire();
        self.inner
            .commit_cascade(tenant, blob, expected, directory_ids, at)
    }

    fn attach_file_record(
        &self,
        record: &FileRecord,
        expected: Version,
    ) -> Result<Version, StorageError> {
        self.fire();
        self.inner.attach_file_record(record, expected)
    }

    fn import_file_record(&self, record: &FileRecord) -> Result<(), StorageError> {
        self.inner.import_file_record(record)
    }

    fn relocate_file_record(
        &self,
        tenant: &TenantId,
        storage_id: &StorageId,
        from: &DirectoryId,
        to: &DirectoryId,
        name: &str,
        expected: Version,
    ) -> Result<(FileRecord, Version), StorageError> {
        self.fire();
        self.inner
            .relocate_file_record(tenant, storage_id, from, to, name, expected)
    }

    fn trash_file_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
        storage_ids: &[StorageId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        self.inner
            .trash_file_records(tenant, directory_id, storage_ids, at)
    }

    fn list_directory_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
    ) -> Result<Vec<FileRecord>, StorageError> {
        self.inner.list_directory_records(tenant, directory_id)
    }

    fn list_file_records(
        &self,
        tenant: &TenantId,
        include_deleted: bool,
    ) -> Result<Vec<FileRecord>, StorageError> {
        self.inner.list_file_records(tenant, include_deleted)
    }
}

/// Live records whose directory is not in the tree
fn orphaned(coordinator: &NamespaceCoordinator, tenant: &TenantId) -> Vec<FileRecord> {
    let live_dirs = coordinator.get_tree(tenant).unwrap().live_ids();
    coordinator
        .list_files(tenant, false)
        .unwrap()
        .into_iter()
        .filter(|r| !live_dirs.contains(&r.directory_id))
        .collect()
}

fn interleaved<S: NamespaceStore + 'static>(
    inner: Arc<S>,
) -> (
    Arc<InterleavingStore<S>>,
    NamespaceCoordinator,
    Arc<NamespaceCoordinator>,
) {
    let wrapped = Arc::new(InterleavingStore::new(inner.clone()));
    let coordinator = NamespaceCoordinator::new(wrapped.clone());
    let other = Arc::new(NamespaceCoordinator::new(inner));
    (wrapped, coordinator, other)
}

#[test]
fn touch_loses_to_force_remove_from_other_writer() {
    let (wrapped, coordinator, other) = interleaved(Arc::new(MemoryNamespaceStore::new()));
    let tenant = TenantId::new("t");
    coordinator.provision(&tenant).unwrap();
    coordinator.create(&tenant, "/a/b").unwrap();

    let remover = other.clone();
    let t = tenant.clone();
    wrapped.arm(move || {
        remover
            .remove(&t, "/a", RemoveOptions { force: true })
            .unwrap();
    });

    assert!(matches!(
        coordinator.touch(&tenant, "/a/b", file("late.txt")),
        Err(ApiError::VersionConflict { .. })
    ));
    assert!(orphaned(&coordinator, &tenant).is_empty());
    assert!(coordinator.list_files(&tenant, true).unwrap().is_empty());

    // a retry sees the removal
    assert!(matches!(
        coordinator.touch(&tenant, "/a/b", file("late.txt")),
        Err(ApiError::PathNotFound(_))
    ));
}

#[test]
fn cascade_planned_before_touch_is_rejected() {
    let (wrapped, coordinator, other) = interleaved(Arc::new(MemoryNamespaceStore::new()));
    let tenant = TenantId::new("t");
    coordinator.provision(&tenant).unwrap();
    coordinator.create(&tenant, "/a/b").unwrap();

    let writer = other.clone();
    let t = tenant.clone();
    wrapped.arm(move || {
        writer.touch(&t, "/a/b", file("late.txt")).unwrap();
    });

    assert!(matches!(
        coordinator.remove(&tenant, "/a", RemoveOptions { force: true }),
        Err(ApiError::VersionConflict { .. })
    ));
    let tree = coordinator.get_tree(&tenant).unwrap();
    assert!(tree.get_subtree(&path("/a/b")).is_ok());
    assert_eq!(coordinator.list_files(&tenant, false).unwrap().len(), 1);

    let report = coordinator
        .remove(&tenant, "/a", RemoveOptions { force: true })
        .unwrap();
    assert_eq!(report.soft_deleted, 1);
    assert!(orphaned(&coordinator, &tenant).is_empty());
    assert!(coordinator.list_files(&tenant, false).unwrap().is_empty());
}

#[test]
fn file_move_loses_to_removal_of_destination() {
    let (wrapped, coordinator, other) = interleaved(Arc::new(MemoryNamespaceStore::new()));
    let tenant = TenantId::new("t");
    coordinator.provision(&tenant).unwrap();
    coordinator.create(&tenant, "/src").unwrap();
    coordinator.create(&tenant, "/dst").unwrap();
    coordinator.touch(&tenant, "/src", file("f")).unwrap();

    let remover = other.clone();
    let t = tenant.clone();
    wrapped.arm(move || {
        remover
            .remove(&t, "/dst", RemoveOptions::default())
            .unwrap();
    });

    assert!(matches!(
        coordinator.move_file(&tenant, "/src/f", "/dst/f"),
        Err(ApiError::VersionConflict { .. })
    ));
    assert!(orphaned(&coordinator, &tenant).is_empty());
    let live = coordinator.list_files(&tenant, false).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(
        coordinator.get_tree(&tenant).unwrap().path_of(&live[0].directory_id),
        Some(path("/src"))
    );
}

#[test]
fn sled_touch_loses_to_force_remove_from_other_writer() {
    let temp_dir = TempDir::new().unwrap();
    let (sled, _) = sled_coordinator(&temp_dir);
    let (wrapped, coordinator, other) = interleaved(sled);
    let tenant = TenantId::new("t");
    coordinator.provision(&tenant).unwrap();
    coordinator.create(&tenant, "/a").unwrap();

    let remover = other.clone();
    let t = tenant.clone();
    wrapped.arm(move || {
        remover
            .remove(&t, "/a", RemoveOptions { force: true })
            .unwrap();
    });

    assert!(matches!(
        coordinator.touch(&tenant, "/a", file("late.txt")),
        Err(ApiError::VersionConflict { .. })
    ));
    assert!(orphaned(&coordinator, &tenant).is_empty());
    assert_eq!(coordinator.reconcile(&tenant).unwrap(), 0);
}
