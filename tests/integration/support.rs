use std::sync::Arc;

use nsmeta::coordinator::{NamespaceCoordinator, NewFile};
use nsmeta::store::{MemoryNamespaceStore, SledNamespaceStore};
use nsmeta::tree::{AbsolutePath, DirectoryIndex};
use nsmeta::types::TenantId;
use tempfile::TempDir;

pub fn path(p: &str) -> AbsolutePath {
    AbsolutePath::parse(p).unwrap()
}

/// Sorted list of every directory path below the root
pub fn paths(index: &DirectoryIndex) -> Vec<String> {
    let mut out: Vec<String> = index.paths().iter().map(|p| p.to_string()).collect();
    out.sort();
    out
}

pub fn child_segments(index: &DirectoryIndex, p: &str) -> Vec<String> {
    index
        .get_subtree(&path(p))
        .unwrap()
        .children
        .iter()
        .map(|c| c.segment.clone())
        .collect()
}

pub fn file(name: &str) -> NewFile {
    NewFile {
        name: name.to_string(),
        ..NewFile::default()
    }
}

pub fn memory_coordinator() -> (Arc<MemoryNamespaceStore>, NamespaceCoordinator, TenantId) {
    let store = Arc::new(MemoryNamespaceStore::new());
    let coordinator = NamespaceCoordinator::new(store.clone());
    let tenant = TenantId::new("tenant-a");
    coordinator.provision(&tenant).unwrap();
    (store, coordinator, tenant)
}

pub fn sled_coordinator(temp_dir: &TempDir) -> (Arc<SledNamespaceStore>, NamespaceCoordinator) {
    let store = Arc::new(SledNamespaceStore::new(&temp_dir.path().join("store")).unwrap());
    let coordinator = NamespaceCoordinator::new(store.clone());
    (store, coordinator)
}
