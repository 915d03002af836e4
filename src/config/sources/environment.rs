//! Environment overlay, highest precedence.
//!
//! `NSMETA__<SECTION>__<KEY>` overrides a config key, for example
//! `NSMETA__DEFAULT_TENANT=acme`, `NSMETA__STORAGE__DATA_DIR=/srv/nsmeta` or
//! `NSMETA__LOGGING__OUTPUT=stderr`. The single-underscore `NSMETA_TENANT` and
//! `NSMETA_LOG*` variables belong to the CLI and the logger and are not read here.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, Map};

const PREFIX: &str = "NSMETA";
const SEPARATOR: &str = "__";

/// Overlay the process environment.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    add_vars_to_builder(builder, None)
}

/// Overlay `vars` in place of the process environment when given.
pub fn add_vars_to_builder(
    builder: ConfigBuilder<DefaultState>,
    vars: Option<Map<String, String>>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let source = Environment::with_prefix(PREFIX)
        .prefix_separator(SEPARATOR)
        .separator(SEPARATOR)
        .try_parsing(true)
        .source(vars);
    Ok(builder.add_source(source))
}
