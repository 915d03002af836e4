//! Sled-backed namespace store.
//!
//! Two trees: `namespaces` maps a tenant to its `NamespaceRecord`, and
//! `file_records` maps `tenant \0 directory_id \0 storage_id` to a
//! `FileRecord`, so every record of one directory shares a key prefix.
//! Multi-key writes run inside sled transactions.

use crate::error::StorageError;
use crate::store::{CascadeCommit, FileRecord, NamespaceRecord, NamespaceStore, StoredTree};
use crate::types::{DirectoryId, StorageId, TenantId, Version};
use chrono::{DateTime, Utc};
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree, Transactional,
};
use sled::{Db, IVec, Tree};
use std::path::Path;
use tracing::debug;

const NAMESPACES_TREE: &str = "namespaces";
const FILE_RECORDS_TREE: &str = "file_records";
const KEY_SEPARATOR: u8 = 0;

pub struct SledNamespaceStore {
    db: Db,
    namespaces: Tree,
    files: Tree,
}

impl SledNamespaceStore {
    /// Open (or create) a store at `path`
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    pub fn from_db(db: Db) -> Result<Self, StorageError> {
        let namespaces = db.open_tree(NAMESPACES_TREE)?;
        let files = db.open_tree(FILE_RECORDS_TREE)?;
        Ok(Self {
            db,
            namespaces,
            files,
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    /// Records of `tenant` whose key starts with `prefix`.
    ///
    /// Tenant ids are free-form, so a prefix can also cover keys of a tenant
    /// whose id extends this one past a separator byte; those rows are dropped
    /// by comparing the decoded owner.
    fn scan_owned(
        &self,
        tenant: &TenantId,
        prefix: Vec<u8>,
    ) -> Result<Vec<(IVec, FileRecord)>, StorageError> {
        let mut rows = Vec::new();
        for entry in self.files.scan_prefix(prefix) {
            let (key, value) = entry?;
            let record: FileRecord = serde_json::from_slice(&value)?;
            if record.tenant_id == *tenant {
                rows.push((key, record));
            }
        }
        Ok(rows)
    }

    /// Keys of live records under any of `directory_ids`.
    ///
    /// Gathered outside the transaction (sled transactions cannot scan); the
    /// transaction re-reads each key before updating it, and the version check
    /// rejects the commit if a record was attached in between.
    fn live_record_keys(
        &self,
        tenant: &TenantId,
        directory_ids: &[DirectoryId],
    ) -> Result<Vec<IVec>, StorageError> {
        let mut keys = Vec::new();
        for directory_id in directory_ids {
            for (key, record) in self.scan_owned(tenant, directory_prefix(tenant, directory_id))? {
                if record.is_live() {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}

fn tenant_prefix(tenant: &TenantId) -> Vec<u8> {
    let mut key = tenant.as_str().as_bytes().to_vec();
    key.push(KEY_SEPARATOR);
    key
}

fn directory_prefix(tenant: &TenantId, directory_id: &DirectoryId) -> Vec<u8> {
    let mut key = tenant_prefix(tenant);
    key.extend_from_slice(directory_id.to_string().as_bytes());
    key.push(KEY_SEPARATOR);
    key
}

fn file_key(tenant: &TenantId, directory_id: &DirectoryId, storage_id: &StorageId) -> Vec<u8> {
    let mut key = directory_prefix(tenant, directory_id);
    key.extend_from_slice(storage_id.to_string().as_bytes());
    key
}

fn record_key(record: &FileRecord) -> Vec<u8> {
    file_key(&record.tenant_id, &record.directory_id, &record.storage_id)
}

fn abort<E: Into<StorageError>>(err: E) -> ConflictableTransactionError<StorageError> {
    ConflictableTransactionError::Abort(err.into())
}

fn from_tx(err: TransactionError<StorageError>) -> StorageError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => err.into(),
    }
}

/// Compare the stored version with `expected` and write the namespace back as
/// `expected + 1`, replacing the tree with `blob` when one is given.
fn swap_tree(
    namespaces: &TransactionalTree,
    tenant: &TenantId,
    blob: Option<&str>,
    expected: Version,
) -> Result<Version, ConflictableTransactionError<StorageError>> {
    let current = namespaces
        .get(tenant.as_str().as_bytes())?
        .ok_or_else(|| abort(StorageError::NamespaceNotFound(tenant.to_string())))?;
    let current: NamespaceRecord = serde_json::from_slice(&current).map_err(abort)?;
    if current.version != expected {
        return Err(abort(StorageError::VersionConflict {
            expected,
            found: current.version,
        }));
    }

    let next = NamespaceRecord {
        tenant_id: tenant.clone(),
        version: expected + 1,
        tree: blob.map_or(current.tree, str::to_string),
    };
    let value = serde_json::to_vec(&next).map_err(abort)?;
    namespaces.insert(tenant.as_str().as_bytes(), value)?;
    Ok(next.version)
}

/// Mark each still-live record of `tenant` at `keys` as deleted at `at`.
fn mark_deleted(
    files: &TransactionalTree,
    tenant: &TenantId,
    keys: &[IVec],
    at: DateTime<Utc>,
) -> Result<usize, ConflictableTransactionError<StorageError>> {
    let mut count = 0;
    for key in keys {
        let Some(value) = files.get(key)? else {
            continue;
        };
        let mut record: FileRecord = serde_json::from_slice(&value).map_err(abort)?;
        if record.tenant_id != *tenant || !record.is_live() {
            continue;
        }
        record.deleted_at = Some(at);
        files.insert(key.clone(), serde_json::to_vec(&record).map_err(abort)?)?;
        count += 1;
    }
    Ok(count)
}

impl NamespaceStore for SledNamespaceStore {
    fn provision(&self, tenant: &TenantId, blob: &str) -> Result<Version, StorageError> {
        let record = NamespaceRecord {
            tenant_id: tenant.clone(),
            version: 1,
            tree: blob.to_string(),
        };
        let value = serde_json::to_vec(&record)?;
        self.namespaces
            .transaction(|namespaces| {
                if namespaces.get(tenant.as_str().as_bytes())?.is_some() {
                    return Err(abort(StorageError::NamespaceExists(tenant.to_string())));
                }
                namespaces.insert(tenant.as_str().as_bytes(), value.clone())?;
                Ok(())
            })
            .map_err(from_tx)?;
        debug!(tenant = %tenant, "provisioned namespace");
        Ok(record.version)
    }

    fn load_tree(&self, tenant: &TenantId) -> Result<StoredTree, StorageError> {
        let value = self
            .namespaces
            .get(tenant.as_str().as_bytes())?
            .ok_or_else(|| StorageError::NamespaceNotFound(tenant.to_string()))?;
        let record: NamespaceRecord = serde_json::from_slice(&value)?;
        Ok(StoredTree {
            blob: record.tree,
            version: record.version,
        })
    }

    fn save_tree(
        &self,
        tenant: &TenantId,
        blob: &str,
        expected: Version,
    ) -> Result<Version, StorageError> {
        self.namespaces
            .transaction(|namespaces| swap_tree(namespaces, tenant, Some(blob), expected))
            .map_err(from_tx)
    }

    fn soft_delete_file_records(
        &self,
        tenant: &TenantId,
        directory_ids: &[DirectoryId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let keys = self.live_record_keys(tenant, directory_ids)?;
        self.files
            .transaction(|files| mark_deleted(files, tenant, &keys, at))
            .map_err(from_tx)
    }

    fn count_file_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
    ) -> Result<usize, StorageError> {
        Ok(self
            .scan_owned(tenant, directory_prefix(tenant, directory_id))?
            .iter()
            .filter(|(_, record)| record.is_live())
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
        let keys = self.live_record_keys(tenant, directory_ids)?;
        (&self.namespaces, &self.files)
            .transaction(|(namespaces, files)| {
                let version = swap_tree(namespaces, tenant, Some(blob), expected)?;
                let soft_deleted = mark_deleted(files, tenant, &keys, at)?;
                Ok(CascadeCommit {
                    version,
                    soft_deleted,
                })
            })
            .map_err(from_tx)
    }

    fn attach_file_record(
        &self,
        record: &FileRecord,
        expected: Version,
    ) -> Result<Version, StorageError> {
        let key = record_key(record);
        let value = serde_json::to_vec(record)?;
        (&self.namespaces, &self.files)
            .transaction(|(namespaces, files)| {
                let version = swap_tree(namespaces, &record.tenant_id, None, expected)?;
                files.insert(key.clone(), value.clone())?;
                Ok(version)
            })
            .map_err(from_tx)
    }

    fn import_file_record(&self, record: &FileRecord) -> Result<(), StorageError> {
        let value = serde_json::to_vec(record)?;
        self.files.insert(record_key(record), value)?;
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
        let old_key = file_key(tenant, from, storage_id);
        (&self.namespaces, &self.files)
            .transaction(|(namespaces, files)| {
                let version = swap_tree(namespaces, tenant, None, expected)?;
                let missing = || abort(StorageError::FileRecordNotFound(storage_id.to_string()));
                let value = files.get(&old_key)?.ok_or_else(missing)?;
                let mut record: FileRecord = serde_json::from_slice(&value).map_err(abort)?;
                if record.tenant_id != *tenant || !record.is_live() {
                    return Err(missing());
                }
                files.remove(old_key.clone())?;
                record.directory_id = *to;
                record.name = name.to_string();
                files.insert(record_key(&record), serde_json::to_vec(&record).map_err(abort)?)?;
                Ok((record, version))
            })
            .map_err(from_tx)
    }

    fn trash_file_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
        storage_ids: &[StorageId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let keys: Vec<IVec> = storage_ids
            .iter()
            .map(|id| file_key(tenant, directory_id, id).into())
            .collect();
        self.files
            .transaction(|files| mark_deleted(files, tenant, &keys, at))
            .map_err(from_tx)
    }

    fn list_directory_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
    ) -> Result<Vec<FileRecord>, StorageError> {
        Ok(self
            .scan_owned(tenant, directory_prefix(tenant, directory_id))?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    fn list_file_records(
        &self,
        tenant: &TenantId,
        include_deleted: bool,
    ) -> Result<Vec<FileRecord>, StorageError> {
        Ok(self
            .scan_owned(tenant, tenant_prefix(tenant))?
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| include_deleted || record.is_live())
            .collect())
    }
}
