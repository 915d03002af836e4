//! MergeService: orchestrates sources, applies merge policy, deserializes to NsMetaConfig.

use crate::config::sources::{environment, global_file};
use crate::config::NsMetaConfig;
use config::{ConfigError, File, Map};
use std::path::Path;

use super::policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from standard sources.
    /// Precedence: defaults (lowest) -> global file -> environment (highest).
    pub fn load() -> Result<NsMetaConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }

    /// Load config from a specific file with environment overlay. The file must exist.
    pub fn load_from_file(path: &Path) -> Result<NsMetaConfig, ConfigError> {
        Self::load_from_file_with_env(path, None)
    }

    /// As `load_from_file`, overlaying `env` instead of the process environment when given.
    pub(crate) fn load_from_file_with_env(
        path: &Path,
        env: Option<Map<String, String>>,
    ) -> Result<NsMetaConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = builder.add_source(File::from(path).required(true));
        let builder = environment::add_vars_to_builder(builder, env)?;

        builder.build()?.try_deserialize()
    }
}
