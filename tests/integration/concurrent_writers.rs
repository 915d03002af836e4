use std::sync::Arc;
use std::thread;

use nsmeta::concurrency::TenantLockManager;
use nsmeta::coordinator::NamespaceCoordinator;
use nsmeta::store::{MemoryNamespaceStore, NamespaceStore};
use nsmeta::types::TenantId;
use tempfile::TempDir;

use crate::support::{path, sled_coordinator};

#[test]
fn concurrent_creates_lose_no_update() {
    let store = Arc::new(MemoryNamespaceStore::new());
    let coordinator = Arc::new(NamespaceCoordinator::new(store.clone()));
    let tenant = TenantId::new("busy");
    coordinator.provision(&tenant).unwrap();

    let mut handles = vec![];
    for worker in 0..8 {
        let coordinator = coordinator.clone();
        let tenant = tenant.clone();
        handles.push(thread::spawn(move || {
            for i in 0..10 {
                coordinator
                    .create(&tenant, &format!("/w{}/d{}", worker, i))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let tree = coordinator.get_tree(&tenant).unwrap();
    // root + 8 worker dirs + 80 leaves
    assert_eq!(tree.node_count(), 1 + 8 + 80);
    assert_eq!(store.load_tree(&tenant).unwrap().version, 1 + 80);
}

#[test]
fn coordinators_sharing_a_lock_manager_serialize() {
    let store = Arc::new(MemoryNamespaceStore::new());
    let locks = Arc::new(TenantLockManager::new());
    let first = Arc::new(NamespaceCoordinator::with_lock_manager(
        store.clone(),
        locks.clone(),
    ));
    let second = Arc::new(NamespaceCoordinator::with_lock_manager(store.clone(), locks));
    let tenant = TenantId::new("shared");
    first.provision(&tenant).unwrap();

    let handles: Vec<_> = [first.clone(), second.clone()]
        .into_iter()
        .enumerate()
        .map(|(n, coordinator)| {
            let tenant = tenant.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    coordinator
                        .create(&tenant, &format!("/c{}/{}", n, i))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let tree = second.get_tree(&tenant).unwrap();
    assert_eq!(tree.node_count(), 1 + 2 + 40);
}

#[test]
fn separate_processes_are_caught_by_version_check() {
    let temp_dir = TempDir::new().unwrap();
    let (store, coordinator) = sled_coordinator(&temp_dir);
    let tenant = TenantId::new("t");
    coordinator.provision(&tenant).unwrap();

    // A second coordinator with its own lock manager stands in for another process
    let other = NamespaceCoordinator::new(store.clone());
    let seen = store.load_tree(&tenant).unwrap();
    other.create(&tenant, "/from-other").unwrap();

    assert!(store.save_tree(&tenant, &seen.blob, seen.version).is_err());
    assert!(coordinator
        .get_tree(&tenant)
        .unwrap()
        .get_subtree(&path("/from-other"))
        .is_ok());
}

#[test]
fn tenants_are_independent() {
    let store = Arc::new(MemoryNamespaceStore::new());
    let coordinator = Arc::new(NamespaceCoordinator::new(store));
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let coordinator = coordinator.clone();
            thread::spawn(move || {
                let tenant = TenantId::new(format!("tenant-{}", n));
                coordinator.provision(&tenant).unwrap();
                for i in 0..5 {
                    coordinator.create(&tenant, &format!("/d{}", i)).unwrap();
                }
                coordinator.get_tree(&tenant).unwrap().node_count()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 6);
    }
}
