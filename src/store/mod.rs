//! Namespace Store
//!
//! Persistence collaborator of the coordinator: holds each tenant's serialized
//! directory tree together with a version stamp, and the table of file records
//! anchored to directory identifiers.

pub mod memory;
pub mod persistence;

use crate::error::StorageError;
use crate::types::{DirectoryId, StorageId, TenantId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryNamespaceStore;
pub use persistence::SledNamespaceStore;

/// Persisted namespace row: the whole tree as one blob plus its version stamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceRecord {
    pub tenant_id: TenantId,
    pub version: Version,
    pub tree: String,
}

/// Tree blob as loaded, with the version it must be saved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTree {
    pub blob: String,
    pub version: Version,
}

/// File metadata anchored to a directory node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub storage_id: StorageId,
    pub tenant_id: TenantId,
    pub directory_id: DirectoryId,
    /// Display name, e.g. "report.pdf"
    pub name: String,
    pub file_size: Option<u64>,
    /// Content type recorded at upload time
    pub file_type: Option<String>,
    pub is_encrypted: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker; physical removal is left to a later sweep
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn new(tenant_id: TenantId, directory_id: DirectoryId, name: impl Into<String>) -> Self {
        Self {
            storage_id: StorageId::new(),
            tenant_id,
            directory_id,
            name: name.into(),
            file_size: None,
            file_type: None,
            is_encrypted: false,
            is_public: false,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Result of an atomic cascade commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeCommit {
    pub version: Version,
    pub soft_deleted: usize,
}

/// Persistence port used by the coordinator.
///
/// Tree writes are compare-and-swap on the version observed at load time and
/// fail with `StorageError::VersionConflict` when another writer got there first.
/// Writes that anchor a record to a directory (`attach_file_record`,
/// `relocate_file_record`) bump the same version, so a cascade planned against
/// an older tree cannot miss a record attached after it loaded.
pub trait NamespaceStore: Send + Sync {
    /// Create the namespace of `tenant` with the given tree. Returns the initial version.
    fn provision(&self, tenant: &TenantId, blob: &str) -> Result<Version, StorageError>;

    fn load_tree(&self, tenant: &TenantId) -> Result<StoredTree, StorageError>;

    /// Replace the tree if the stored version still equals `expected`. Returns the new version.
    fn save_tree(
        &self,
        tenant: &TenantId,
        blob: &str,
        expected: Version,
    ) -> Result<Version, StorageError>;

    /// Set `deleted_at` on every live record of `tenant` whose directory is in `directory_ids`.
    fn soft_delete_file_records(
        &self,
        tenant: &TenantId,
        directory_ids: &[DirectoryId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    /// Number of live records of `tenant` anchored at `directory_id`.
    fn count_file_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
    ) -> Result<usize, StorageError>;

    /// Soft-delete the records under `directory_ids` and save `blob` as one
    /// atomic unit: either both land or neither does.
    fn commit_cascade(
        &self,
        tenant: &TenantId,
        blob: &str,
        expected: Version,
        directory_ids: &[DirectoryId],
        at: DateTime<Utc>,
    ) -> Result<CascadeCommit, StorageError>;

    /// Insert `record` if the namespace version still equals `expected`.
    /// Returns the bumped version; the tree blob is left as is.
    fn attach_file_record(
        &self,
        record: &FileRecord,
        expected: Version,
    ) -> Result<Version, StorageError>;

    /// Insert `record` without looking at the tree.
    ///
    /// Used for bulk import and repair. A record written here can point at a
    /// directory that no longer exists until `reconcile` sweeps it.
    fn import_file_record(&self, record: &FileRecord) -> Result<(), StorageError>;

    /// Re-anchor the live record `storage_id` from directory `from` to `to`
    /// under `name`, checked against `expected` like `attach_file_record`.
    fn relocate_file_record(
        &self,
        tenant: &TenantId,
        storage_id: &StorageId,
        from: &DirectoryId,
        to: &DirectoryId,
        name: &str,
        expected: Version,
    ) -> Result<(FileRecord, Version), StorageError>;

    /// Soft-delete the listed records of one directory. Records already
    /// deleted or anchored elsewhere are skipped.
    fn trash_file_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
        storage_ids: &[StorageId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    /// Every record of `tenant` anchored at `directory_id`, deleted ones included.
    fn list_directory_records(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
    ) -> Result<Vec<FileRecord>, StorageError>;

    fn list_file_records(
        &self,
        tenant: &TenantId,
        include_deleted: bool,
    ) -> Result<Vec<FileRecord>, StorageError>;
}
