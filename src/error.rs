//! Error types for the namespace metadata layer.
//!
//! `ApiError` is what every public operation returns. Failures raised by the
//! persistence collaborator are carried as `StorageError` and wrapped into
//! `ApiError::StorageError`, except for version conflicts which callers are
//! expected to retry and therefore get their own variant.

use std::fmt;
use thiserror::Error;

/// Why a plain (non-forced) remove refused to detach a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotEmptyReason {
    /// The directory still has this many child directories.
    Subdirectories(usize),
    /// This many live file records still point at the directory.
    FileRecords(usize),
}

impl fmt::Display for NotEmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotEmptyReason::Subdirectories(n) => write!(f, "contains {} subdirectories", n),
            NotEmptyReason::FileRecords(n) => write!(f, "contains {} files", n),
        }
    }
}

/// Errors raised by the persistence collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt directory tree: {0}")]
    CorruptTree(String),

    #[error("Namespace not found for tenant {0}")]
    NamespaceNotFound(String),

    #[error("Namespace already provisioned for tenant {0}")]
    NamespaceExists(String),

    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    #[error("File record not found: {0}")]
    FileRecordNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

/// Errors surfaced by index and coordinator operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("The root directory cannot be removed or recreated")]
    RootRemoval,

    #[error("Path already exists: {0}")]
    PathAlreadyExists(String),

    #[error("Directory not empty: '{path}' {reason}")]
    DirectoryNotEmpty {
        path: String,
        reason: NotEmptyReason,
    },

    #[error("Namespace was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },

    #[error("Storage error: {0}")]
    StorageError(StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// True when the caller can correct the request (maps to a 4xx at the transport layer).
    pub fn is_client_error(&self) -> bool {
        match self {
            ApiError::InvalidPath(_)
            | ApiError::PathNotFound(_)
            | ApiError::RootRemoval
            | ApiError::PathAlreadyExists(_)
            | ApiError::DirectoryNotEmpty { .. }
            | ApiError::VersionConflict { .. } => true,
            ApiError::StorageError(StorageError::NamespaceNotFound(_))
            | ApiError::StorageError(StorageError::NamespaceExists(_))
            | ApiError::StorageError(StorageError::FileRecordNotFound(_)) => true,
            ApiError::StorageError(_) | ApiError::ConfigError(_) => false,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict { expected, found } => {
                ApiError::VersionConflict { expected, found }
            }
            other => ApiError::StorageError(other),
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
