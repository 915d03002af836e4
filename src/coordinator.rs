//! Namespace Coordinator
//!
//! Runs directory mutations as load, mutate, save sequences against the store
//! and keeps the file-record table consistent with the tree:
//!
//! - a plain remove only detaches empty directories (no subdirectories, no live files)
//! - a forced remove soft-deletes every record under the subtree in the same
//!   store commit that saves the trimmed tree
//! - a failed mutation never reaches the store, so the persisted tree is untouched
//!
//! Each sequence holds the tenant's lock and saves against the version it
//! loaded, so concurrent writers cannot silently overwrite each other. File
//! records are attached and moved against that same version, so a record can
//! never land in a directory another process removed after the load.

use crate::concurrency::TenantLockManager;
use crate::error::{ApiError, NotEmptyReason};
use crate::listing::FileQuery;
use crate::store::{FileRecord, NamespaceStore};
use crate::tree::{AbsolutePath, DirectoryIndex, DirectoryNode};
use crate::types::{DirectoryId, TenantId, Version};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for `remove`
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    /// Remove non-empty directories, soft-deleting every file record underneath
    pub force: bool,
}

/// Outcome of a successful remove
#[derive(Debug, Clone)]
pub struct RemoveReport {
    pub tree: DirectoryIndex,
    pub removed: DirectoryNode,
    pub soft_deleted: usize,
    pub version: Version,
}

/// Metadata for a file record created with `touch`
#[derive(Debug, Clone, Default)]
pub struct NewFile {
    pub name: String,
    pub file_size: Option<u64>,
    pub file_type: Option<String>,
    pub is_encrypted: bool,
    pub is_public: bool,
}

pub struct NamespaceCoordinator {
    store: Arc<dyn NamespaceStore>,
    locks: Arc<TenantLockManager>,
}

impl NamespaceCoordinator {
    pub fn new(store: Arc<dyn NamespaceStore>) -> Self {
        Self::with_lock_manager(store, Arc::new(TenantLockManager::new()))
    }

    /// Share a lock manager between coordinators serving the same store
    pub fn with_lock_manager(store: Arc<dyn NamespaceStore>, locks: Arc<TenantLockManager>) -> Self {
        Self { store, locks }
    }

    pub fn store(&self) -> &Arc<dyn NamespaceStore> {
        &self.store
    }

    /// Create the namespace of `tenant` holding an empty root
    pub fn provision(&self, tenant: &TenantId) -> Result<DirectoryIndex, ApiError> {
        let index = DirectoryIndex::new();
        self.store.provision(tenant, &index.to_json()?)?;
        info!(tenant = %tenant, root = %index.root().id, "namespace provisioned");
        Ok(index)
    }

    pub fn get_tree(&self, tenant: &TenantId) -> Result<DirectoryIndex, ApiError> {
        Ok(self.load(tenant)?.0)
    }

    fn load(&self, tenant: &TenantId) -> Result<(DirectoryIndex, Version), ApiError> {
        let stored = self.store.load_tree(tenant)?;
        let index = DirectoryIndex::from_json(&stored.blob)?;
        Ok((index, stored.version))
    }

    /// Create the directory at `path` and every missing ancestor
    pub fn create(&self, tenant: &TenantId, path: &str) -> Result<DirectoryIndex, ApiError> {
        let path = AbsolutePath::parse(path)?;
        if path.is_root() {
            return Err(ApiError::RootRemoval);
        }

        let lock = self.locks.get_lock(tenant);
        let _guard = lock.lock();

        let (mut index, version) = self.load(tenant)?;
        let id = index.mkdir(&path).id;
        let version = self.store.save_tree(tenant, &index.to_json()?, version)?;

        info!(tenant = %tenant, path = %path, directory = %id, version, "directory created");
        Ok(index)
    }

    /// Remove the directory at `path`.
    ///
    /// Without `force` the directory must have no subdirectories and no live
    /// file records. With `force` the whole subtree goes and every record
    /// anchored anywhere inside it is soft-deleted atomically with the tree save.
    pub fn remove(
        &self,
        tenant: &TenantId,
        path: &str,
        opts: RemoveOptions,
    ) -> Result<RemoveReport, ApiError> {
        let path = AbsolutePath::parse(path)?;
        if path.is_root() {
            return Err(ApiError::RootRemoval);
        }

        let lock = self.locks.get_lock(tenant);
        let _guard = lock.lock();

        let (mut index, version) = self.load(tenant)?;
        let target = index.get_subtree(&path)?;

        if opts.force {
            let ids = target.subtree_ids();
            let removed = index.rmdir(&path)?;
            let commit =
                self.store
                    .commit_cascade(tenant, &index.to_json()?, version, &ids, Utc::now())?;

            info!(
                tenant = %tenant,
                path = %path,
                directories = ids.len(),
                soft_deleted = commit.soft_deleted,
                version = commit.version,
                "directory force-removed"
            );
            return Ok(RemoveReport {
                tree: index,
                removed,
                soft_deleted: commit.soft_deleted,
                version: commit.version,
            });
        }

        if !target.is_leaf() {
            return Err(ApiError::DirectoryNotEmpty {
                path: path.to_string(),
                reason: NotEmptyReason::Subdirectories(target.children.len()),
            });
        }
        let files = self.store.count_file_records(tenant, &target.id)?;
        if files > 0 {
            return Err(ApiError::DirectoryNotEmpty {
                path: path.to_string(),
                reason: NotEmptyReason::FileRecords(files),
            });
        }

        let removed = index.rmdir(&path)?;
        let version = self.store.save_tree(tenant, &index.to_json()?, version)?;

        info!(tenant = %tenant, path = %path, version, "directory removed");
        Ok(RemoveReport {
            tree: index,
            removed,
            soft_deleted: 0,
            version,
        })
    }

    /// Move the directory at `old` to `new`; the parent of `new` must exist
    pub fn move_dir(
        &self,
        tenant: &TenantId,
        old: &str,
        new: &str,
    ) -> Result<DirectoryIndex, ApiError> {
        let old = AbsolutePath::parse(old)?;
        let new = AbsolutePath::parse(new)?;

        let lock = self.locks.get_lock(tenant);
        let _guard = lock.lock();

        let (mut index, version) = self.load(tenant)?;
        if let Err(err) = index.mvdir(&old, &new) {
            debug!(tenant = %tenant, from = %old, to = %new, error = %err, "move rejected");
            return Err(err);
        }
        let version = self.store.save_tree(tenant, &index.to_json()?, version)?;

        info!(tenant = %tenant, from = %old, to = %new, version, "directory moved");
        Ok(index)
    }

    /// Live file-record count per directory
    pub fn file_counts(&self, tenant: &TenantId) -> Result<HashMap<DirectoryId, usize>, ApiError> {
        let mut counts = HashMap::new();
        for record in self.store.list_file_records(tenant, false)? {
            *counts.entry(record.directory_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Attach a new file record to the existing directory at `dir_path`.
    ///
    /// Names are unique among the live records of a directory.
    pub fn touch(
        &self,
        tenant: &TenantId,
        dir_path: &str,
        file: NewFile,
    ) -> Result<FileRecord, ApiError> {
        let path = AbsolutePath::parse(dir_path)?;
        let name = file_name(&file.name)?;

        let lock = self.locks.get_lock(tenant);
        let _guard = lock.lock();

        let (index, version) = self.load(tenant)?;
        let directory_id = index.get_subtree(&path)?.id;
        if self.find_live(tenant, &directory_id, &name)?.is_some() {
            return Err(ApiError::PathAlreadyExists(path.child(&name).to_string()));
        }

        let mut record = FileRecord::new(tenant.clone(), directory_id, name);
        record.file_size = file.file_size;
        record.file_type = file.file_type;
        record.is_encrypted = file.is_encrypted;
        record.is_public = file.is_public;
        let version = self.store.attach_file_record(&record, version)?;

        info!(
            tenant = %tenant,
            path = %path,
            file = %record.storage_id,
            version,
            "file record added"
        );
        Ok(record)
    }

    /// Soft-delete the named files of the directory at `dir_path`.
    ///
    /// Every name must be a live file of that directory, otherwise nothing is
    /// deleted. Returns the records as marked.
    pub fn remove_files(
        &self,
        tenant: &TenantId,
        dir_path: &str,
        names: &[String],
    ) -> Result<Vec<FileRecord>, ApiError> {
        let path = AbsolutePath::parse(dir_path)?;
        if names.is_empty() {
            return Err(ApiError::InvalidPath("no file names given".to_string()));
        }

        let lock = self.locks.get_lock(tenant);
        let _guard = lock.lock();

        let (index, _) = self.load(tenant)?;
        let directory_id = index.get_subtree(&path)?.id;
        let live: Vec<FileRecord> = self
            .store
            .list_directory_records(tenant, &directory_id)?
            .into_iter()
            .filter(FileRecord::is_live)
            .collect();

        let mut targets: Vec<FileRecord> = Vec::new();
        for name in names {
            let name = file_name(name)?;
            let record = live
                .iter()
                .find(|r| r.name == name)
                .ok_or_else(|| ApiError::PathNotFound(path.child(&name).to_string()))?;
            if !targets.iter().any(|t| t.storage_id == record.storage_id) {
                targets.push(record.clone());
            }
        }

        let at = Utc::now();
        let ids: Vec<_> = targets.iter().map(|r| r.storage_id).collect();
        let marked = self.store.trash_file_records(tenant, &directory_id, &ids, at)?;
        for record in &mut targets {
            record.deleted_at = Some(at);
        }

        info!(tenant = %tenant, path = %path, files = marked, "file records deleted");
        Ok(targets)
    }

    /// Move the file at `from` to `to`, renaming it when the final segments differ.
    ///
    /// Both directories must exist and `to` must not name another live file.
    pub fn move_file(
        &self,
        tenant: &TenantId,
        from: &str,
        to: &str,
    ) -> Result<FileRecord, ApiError> {
        let (from_dir, from_name) = split_file_path(from)?;
        let (to_dir, to_name) = split_file_path(to)?;

        let lock = self.locks.get_lock(tenant);
        let _guard = lock.lock();

        let (index, version) = self.load(tenant)?;
        let source_id = index.get_subtree(&from_dir)?.id;
        let target_id = index.get_subtree(&to_dir)?.id;

        let record = self
            .find_live(tenant, &source_id, &from_name)?
            .ok_or_else(|| ApiError::PathNotFound(from_dir.child(&from_name).to_string()))?;
        if let Some(existing) = self.find_live(tenant, &target_id, &to_name)? {
            if existing.storage_id != record.storage_id {
                return Err(ApiError::PathAlreadyExists(to_dir.child(&to_name).to_string()));
            }
        }

        let (moved, version) = self.store.relocate_file_record(
            tenant,
            &record.storage_id,
            &source_id,
            &target_id,
            &to_name,
            version,
        )?;

        info!(
            tenant = %tenant,
            from = %from_dir.child(&from_name),
            to = %to_dir.child(&to_name),
            version,
            "file record moved"
        );
        Ok(moved)
    }

    /// Records of the directory at `dir_path` selected by `query`
    pub fn list_directory(
        &self,
        tenant: &TenantId,
        dir_path: &str,
        query: &FileQuery,
    ) -> Result<Vec<FileRecord>, ApiError> {
        let path = AbsolutePath::parse(dir_path)?;
        let (index, _) = self.load(tenant)?;
        let directory_id = index.get_subtree(&path)?.id;
        let records = self.store.list_directory_records(tenant, &directory_id)?;
        Ok(query.apply(records))
    }

    fn find_live(
        &self,
        tenant: &TenantId,
        directory_id: &DirectoryId,
        name: &str,
    ) -> Result<Option<FileRecord>, ApiError> {
        Ok(self
            .store
            .list_directory_records(tenant, directory_id)?
            .into_iter()
            .find(|r| r.is_live() && r.name == name))
    }

    pub fn list_files(
        &self,
        tenant: &TenantId,
        include_deleted: bool,
    ) -> Result<Vec<FileRecord>, ApiError> {
        Ok(self.store.list_file_records(tenant, include_deleted)?)
    }

    /// Soft-delete every live record whose directory is no longer in the tree.
    ///
    /// Repairs namespaces written before cascades were atomic, or by writers
    /// that bypassed the coordinator. Returns the number of records marked.
    pub fn reconcile(&self, tenant: &TenantId) -> Result<usize, ApiError> {
        let lock = self.locks.get_lock(tenant);
        let _guard = lock.lock();

        let (index, _) = self.load(tenant)?;
        let live = index.live_ids();
        let orphaned: BTreeSet<DirectoryId> = self
            .store
            .list_file_records(tenant, false)?
            .into_iter()
            .map(|record| record.directory_id)
            .filter(|id| !live.contains(id))
            .collect();

        if orphaned.is_empty() {
            debug!(tenant = %tenant, "reconcile found no orphaned records");
            return Ok(0);
        }

        let orphaned: Vec<DirectoryId> = orphaned.into_iter().collect();
        let marked = self
            .store
            .soft_delete_file_records(tenant, &orphaned, Utc::now())?;
        warn!(
            tenant = %tenant,
            directories = orphaned.len(),
            records = marked,
            "soft-deleted records of missing directories"
        );
        Ok(marked)
    }
}

/// Validate a single file name and normalize it like a path segment
fn file_name(name: &str) -> Result<String, ApiError> {
    if name.contains(crate::tree::path::SEPARATOR) {
        return Err(ApiError::InvalidPath(format!("invalid file name '{}'", name)));
    }
    let path = AbsolutePath::from_segments([name])
        .map_err(|_| ApiError::InvalidPath(format!("invalid file name '{}'", name)))?;
    Ok(path.name().unwrap_or_default().to_string())
}

/// Split a file path into its directory and file name
fn split_file_path(input: &str) -> Result<(AbsolutePath, String), ApiError> {
    let path = AbsolutePath::parse(input)?;
    match (path.parent(), path.name()) {
        (Some(dir), Some(name)) => Ok((dir, name.to_string())),
        _ => Err(ApiError::InvalidPath(format!("'{}' does not name a file", input))),
    }
}
