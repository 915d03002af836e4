//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::NsMetaConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file and environment.
    pub fn load() -> Result<NsMetaConfig, ConfigError> {
        MergeService::load()
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<NsMetaConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Load from `path` when given, from the standard sources otherwise.
    pub fn load_optional(path: Option<&Path>) -> Result<NsMetaConfig, ConfigError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    /// Create default configuration.
    pub fn default() -> NsMetaConfig {
        NsMetaConfig::default()
    }
}
