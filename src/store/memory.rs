//! In-process namespace store.
//!
//! All state sits behind one lock, so `commit_cascade` and the versioned
//! record writes are atomic by construction. Writes can be switched to fail to exercise error paths.

use crate::error::StorageError;
use crate::store::{CascadeCommit, FileRecord, NamespaceStore, StoredTree};
use crate::types::{DirectoryId, StorageId, TenantId, Version};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct MemoryState {
    namespaces: HashMap<TenantId, StoredTree>,
    files: BTreeMap<StorageId, FileRecord>,
}

#[derive(Default)]
pub struct MemoryNamespaceStore {
    state: RwLock<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryNamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `StorageError::Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "writes disabled on memory store".to_string(),
            ));
        }
        Ok(())
    }
}

fn swap_tree(
    state: &mut MemoryState,
    tenant: &TenantId,
    blob: Option<&str>,
    expected: Version,
) -> Result<Version, StorageError> {
    let stored = state
        .namespaces
        .get_mut(tenant)
        .ok_or_else(|| StorageError::NamespaceNotFound(tenant.to_string()))?;
    if stored.version != expected {
        return Err(StorageError::VersionConflict {
            expected,
            found: stored.version,
        });
    }
    if let Some(blob) = blob {
        stored.blob = blob.to_string();
    }
    stored.version = expected + 1;
    Ok(stored.version)
}

fn mark_deleted(
    state: &mut MemoryState,
    tenant: &TenantId,
    directory_ids: &[DirectoryId],
    at: DateTime<Utc>,
) -> usize {
    let targets: HashSet<&DirectoryId> = directory_ids.iter().collect();
    let mut count = 0;
    for record in state.files.values_mut() {
        if record.tenant_id == *tenant
            && record.is_live()
            && targets.contains(&record.directory_id)
        {
            record.deleted_at = Some(at);
            count += 1;
        }
    }
    count
}

impl NamespaceStore for MemoryNamespaceStore {
    fn provision(&self, tenant: &TenantId, blob: &str) -> Result<Version, StorageError> {
        self.check_writable()?;
        let mut state = self.state.write();
        if state.namespaces.contains_key(tenant) {
            return Err(StorageError::NamespaceExists(tenant.to_string()));
        }
        state.namespaces.insert(
            tenant.clone(),
            StoredTree {
                blob: blob.to_string(),
                version: 1,
            },
        );
        Ok(1)
    }

    fn load_tree(&self, tenant: &TenantId) -> Result<StoredTree, StorageError> {
        self.state
            .read()
            .namespaces
            .get(tenant)
            .cloned()
            .ok_or_else(|| StorageError::NamespaceNotFound(tenant.to_string()))
    }

    fn save_tree(
        &self,
        tenant: &TenantId,
        blob: &str,
        expected: Version,
    ) -> Result<Version, StorageError> {
        self.check_writable()?;
        swap_tree(&mut self.state.write(), tenant, Some(blob), expected)
    }

    fn soft_delete_file_records(
        &self,
        tenant: &TenantId,
        directory_ids: &[DirectoryId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        self.check_writable()?;
        Ok(mark_deleted(&mut self.state.write(), tenant, directory_ids, at))
    }

    fn count_file_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
    ) -> Result<usize, StorageError> {
        Ok(self
            .state
            .read()
            .files
            .values()
            .filter(|r| r.tenant_id == *tenant && r.directory_id == *directory_id && r.is_live())
            .count())
    }

    fn commit_cascade(
        &self,
        tenant: &TenantId,
        blob: &str,
        expected: Version,
        directory_ids: &[DirectoryId],
        at: DateTime<Utc>,
    ) -> Result<CascadeCommit, StorageError> {
        self.check_writable()?;
        let mut state = self.state.write();
        let version = swap_tree(&mut state, tenant, Some(blob), expected)?;
        let soft_deleted = mark_deleted(&mut state, tenant, directory_ids, at);
        Ok(CascadeCommit {
            version,
            soft_deleted,
        })
    }

    fn attach_file_record(
        &self,
        record: &FileRecord,
        expected: Version,
    ) -> Result<Version, StorageError> {
        self.check_writable()?;
        let mut state = self.state.write();
        let version = swap_tree(&mut state, &record.tenant_id, None, expected)?;
        state.files.insert(record.storage_id, record.clone());
        Ok(version)
    }

    fn import_file_record(&self, record: &FileRecord) -> Result<(), StorageError> {
        self.check_writable()?;
        self.state
            .write()
            .files
            .insert(record.storage_id, record.clone());
        Ok(())
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
        self.check_writable()?;
        let mut state = self.state.write();
        let found = state.files.get(storage_id).map_or(false, |r| {
            r.tenant_id == *tenant && r.directory_id == *from && r.is_live()
        });
        if !found {
            return Err(StorageError::FileRecordNotFound(storage_id.to_string()));
        }
        let version = swap_tree(&mut state, tenant, None, expected)?;
        let record = state
            .files
            .get_mut(storage_id)
            .ok_or_else(|| StorageError::FileRecordNotFound(storage_id.to_string()))?;
        record.directory_id = *to;
        record.name = name.to_string();
        Ok((record.clone(), version))
    }

    fn trash_file_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
        storage_ids: &[StorageId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        self.check_writable()?;
        let mut state = self.state.write();
        let mut count = 0;
        for storage_id in storage_ids {
            if let Some(record) = state.files.get_mut(storage_id) {
                if record.tenant_id == *tenant
                    && record.directory_id == *directory_id
                    && record.is_live()
                {
                    record.deleted_at = Some(at);
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn list_directory_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
    ) -> Result<Vec<FileRecord>, StorageError> {
        Ok(self
            .state
            .read()
            .files
            .values()
            .filter(|r| r.tenant_id == *tenant && r.directory_id == *directory_id)
            .cloned()
            .collect())
    }

    fn list_file_records(
        &self,
        tenant: &TenantId,
        include_deleted: bool,
    ) -> Result<Vec<FileRecord>, StorageError> {
        Ok(self
            .state
            .read()
            .files
            .values()
            .filter(|r| r.tenant_id == *tenant && (include_deleted || r.is_live()))
            .cloned()
            .collect())
    }
}
