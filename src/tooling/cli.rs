//! CLI Tooling
//!
//! Command-line interface over one tenant's namespace. Every command opens the
//! sled store, runs one coordinator operation and renders the result as text
//! (or JSON where a `--format` flag is offered).

use crate::config::{ConfigLoader, NsMetaConfig};
use crate::coordinator::{NamespaceCoordinator, NewFile, RemoveOptions};
use crate::error::{ApiError, StorageError};
use crate::listing::{FileQuery, SortColumn, SortOrder};
use crate::store::{FileRecord, SledNamespaceStore};
use crate::tree::{render_tree, resolve_relative, AbsolutePath, DirectoryIndex, RenderOptions};
use crate::types::TenantId;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// nsmeta - per-tenant directory namespace index
#[derive(Parser)]
#[command(name = "nsmeta")]
#[command(about = "Directory namespace index over per-tenant file metadata")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tenant whose namespace is operated on (falls back to `default_tenant` in config)
    #[arg(long, env = "NSMETA_TENANT", global = true)]
    pub tenant: Option<String>,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides `storage.data_dir`)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Working directory inside the namespace; relative paths resolve against it
    #[arg(long, default_value = "/", global = true)]
    pub cwd: String,

    /// Disable colored tree output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the tenant's namespace with an empty root
    Init,
    /// Print the directory tree
    Tree {
        /// Show live file counts per directory
        #[arg(long)]
        counts: bool,
        /// Deepest level to print below the root
        #[arg(long)]
        depth: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Create a directory and any missing parents
    Mkdir { path: String },
    /// Remove a directory
    Rmdir {
        path: String,
        /// Remove a non-empty directory and soft-delete every file record under it
        #[arg(long)]
        force: bool,
    },
    /// Move or rename a directory
    Mvdir { old: String, new: String },
    /// Add a file record to an existing directory
    Touch {
        dir: String,
        name: String,
        /// File size in bytes
        #[arg(long)]
        size: Option<u64>,
        /// MIME type
        #[arg(long = "type")]
        file_type: Option<String>,
        #[arg(long)]
        public: bool,
        #[arg(long)]
        encrypted: bool,
    },
    /// Soft-delete files of a directory
    Rm {
        /// File names inside the directory
        #[arg(required = true)]
        names: Vec<String>,
        /// Directory holding the files (defaults to --cwd)
        #[arg(long)]
        dir: Option<String>,
    },
    /// Move or rename a file; the destination directory must exist
    Mv { old: String, new: String },
    /// List the files of one directory
    Ls {
        /// Directory to list (defaults to --cwd)
        dir: Option<String>,
        /// File name; '%' matches any run and '_' one character, e.g. "v%_build.%"
        #[arg(long)]
        name: Option<String>,
        /// '.'-prefixed extension or MIME type, e.g. ".json" or "image/jpeg"
        #[arg(long = "type")]
        file_type: Option<String>,
        /// Only public files
        #[arg(long)]
        public: bool,
        /// Only encrypted (true) or unencrypted (false) files
        #[arg(long)]
        encrypted: Option<bool>,
        /// List soft-deleted files instead of live ones
        #[arg(long)]
        trash: bool,
        #[arg(long, value_enum, default_value_t = OrderBy::Name)]
        order_by: OrderBy,
        #[arg(long, value_enum, default_value_t = Order::Asc)]
        order: Order,
        /// Page size
        #[arg(long)]
        limit: Option<usize>,
        /// 1-based page number, used with --limit
        #[arg(long)]
        page: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List file records of the whole namespace
    Files {
        /// Include soft-deleted records
        #[arg(long)]
        deleted: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Soft-delete file records whose directory no longer exists
    Reconcile,
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderBy {
    Name,
    CreatedAt,
    DeletedAt,
    FileSize,
}

impl From<OrderBy> for SortColumn {
    fn from(order_by: OrderBy) -> Self {
        match order_by {
            OrderBy::Name => SortColumn::Name,
            OrderBy::CreatedAt => SortColumn::CreatedAt,
            OrderBy::DeletedAt => SortColumn::DeletedAt,
            OrderBy::FileSize => SortColumn::FileSize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Order {
    Asc,
    Desc,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Asc => SortOrder::Asc,
            Order::Desc => SortOrder::Desc,
        }
    }
}

impl Cli {
    /// Load configuration and overlay the command-line logging flags
    pub fn load_config(&self) -> Result<NsMetaConfig, ApiError> {
        let mut config = ConfigLoader::load_optional(self.config.as_deref())?;
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
        Ok(config)
    }
}

/// CLI context: the opened store plus the resolved tenant and working directory
pub struct CliContext {
    coordinator: NamespaceCoordinator,
    config: NsMetaConfig,
    tenant: Option<TenantId>,
    cwd: AbsolutePath,
    data_dir: PathBuf,
    color: bool,
}

impl CliContext {
    /// Build a context from parsed arguments, loading configuration on the way
    pub fn new(cli: &Cli) -> Result<Self, ApiError> {
        let config = cli.load_config()?;
        Self::from_config(config, cli)
    }

    /// Build a context from an already loaded configuration
    pub fn from_config(config: NsMetaConfig, cli: &Cli) -> Result<Self, ApiError> {
        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => config.storage.resolve_data_dir()?,
        };
        std::fs::create_dir_all(&data_dir).map_err(StorageError::IoError)?;
        let store = SledNamespaceStore::new(&data_dir)?;
        debug!(data_dir = %data_dir.display(), "opened namespace store");

        let tenant = cli
            .tenant
            .clone()
            .or_else(|| config.default_tenant.clone())
            .filter(|t| !t.is_empty())
            .map(TenantId::new);
        let cwd = AbsolutePath::parse(&cli.cwd)?;
        let color = !cli.no_color && std::io::stdout().is_terminal();

        Ok(Self {
            coordinator: NamespaceCoordinator::new(Arc::new(store)),
            config,
            tenant,
            cwd,
            data_dir,
            color,
        })
    }

    pub fn coordinator(&self) -> &NamespaceCoordinator {
        &self.coordinator
    }

    fn tenant(&self) -> Result<&TenantId, ApiError> {
        self.tenant.as_ref().ok_or_else(|| {
            ApiError::ConfigError(
                "No tenant given: pass --tenant, set NSMETA_TENANT, or set default_tenant in config"
                    .to_string(),
            )
        })
    }

    /// Resolve `path` against the working directory
    fn resolve(&self, path: &str) -> Result<AbsolutePath, ApiError> {
        resolve_relative(path, &self.cwd.to_string())
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Init => {
                let tenant = self.tenant()?;
                let index = self.coordinator.provision(tenant)?;
                Ok(format!(
                    "Provisioned namespace for tenant '{}' (root {})",
                    tenant,
                    index.root().id
                ))
            }
            Commands::Tree {
                counts,
                depth,
                format,
            } => self.handle_tree(*counts, *depth, format),
            Commands::Mkdir { path } => {
                let path = self.resolve(path)?;
                let index = self.coordinator.create(self.tenant()?, &path.to_string())?;
                let node = index.get_subtree(&path)?;
                Ok(format!("Created {} ({})", path, node.id))
            }
            Commands::Rmdir { path, force } => {
                let path = self.resolve(path)?;
                let report = self.coordinator.remove(
                    self.tenant()?,
                    &path.to_string(),
                    RemoveOptions { force: *force },
                )?;
                let directories = report.removed.node_count();
                if report.soft_deleted > 0 || directories > 1 {
                    Ok(format!(
                        "Removed {} ({} directories, {} file records soft-deleted)",
                        path, directories, report.soft_deleted
                    ))
                } else {
                    Ok(format!("Removed {}", path))
                }
            }
            Commands::Mvdir { old, new } => {
                let old = self.resolve(old)?;
                let new = self.resolve(new)?;
                self.coordinator
                    .move_dir(self.tenant()?, &old.to_string(), &new.to_string())?;
                Ok(format!("Moved {} -> {}", old, new))
            }
            Commands::Touch {
                dir,
                name,
                size,
                file_type,
                public,
                encrypted,
            } => {
                let dir = self.resolve(dir)?;
                let record = self.coordinator.touch(
                    self.tenant()?,
                    &dir.to_string(),
                    NewFile {
                        name: name.clone(),
                        file_size: *size,
                        file_type: file_type.clone(),
                        is_encrypted: *encrypted,
                        is_public: *public,
                    },
                )?;
                Ok(format!(
                    "Added '{}' to {} ({})",
                    record.name, dir, record.storage_id
                ))
            }
            Commands::Rm { names, dir } => {
                let dir = match dir {
                    Some(dir) => self.resolve(dir)?,
                    None => self.cwd.clone(),
                };
                let removed = self
                    .coordinator
                    .remove_files(self.tenant()?, &dir.to_string(), names)?;
                Ok(format!("Deleted {} file(s) from {}", removed.len(), dir))
            }
            Commands::Mv { old, new } => {
                let old = self.resolve(old)?;
                let new = self.resolve(new)?;
                let record = self.coordinator.move_file(
                    self.tenant()?,
                    &old.to_string(),
                    &new.to_string(),
                )?;
                Ok(format!("Moved {} -> {} ({})", old, new, record.storage_id))
            }
            Commands::Ls {
                dir,
                name,
                file_type,
                public,
                encrypted,
                trash,
                order_by,
                order,
                limit,
                page,
                format,
            } => {
                let dir = match dir {
                    Some(dir) => self.resolve(dir)?,
                    None => self.cwd.clone(),
                };
                let query = FileQuery {
                    name: name.clone(),
                    file_type: file_type.clone(),
                    public_only: *public,
                    encrypted: *encrypted,
                    trash: *trash,
                    order_by: (*order_by).into(),
                    order: (*order).into(),
                    limit: *limit,
                    page: *page,
                };
                self.handle_ls(&dir, &query, format)
            }
            Commands::Files { deleted, format } => self.handle_files(*deleted, format),
            Commands::Reconcile => {
                let marked = self.coordinator.reconcile(self.tenant()?)?;
                if marked == 0 {
                    Ok("No orphaned file records".to_string())
                } else {
                    Ok(format!("Soft-deleted {} orphaned file record(s)", marked))
                }
            }
            Commands::Config => {
                let rendered = toml::to_string_pretty(&self.config).map_err(|e| {
                    ApiError::ConfigError(format!("Failed to render configuration: {}", e))
                })?;
                Ok(format!(
                    "# data_dir in use: {}\n{}",
                    self.data_dir.display(),
                    rendered.trim_end()
                ))
            }
        }
    }

    fn handle_tree(
        &self,
        counts: bool,
        depth: Option<usize>,
        format: &str,
    ) -> Result<String, ApiError> {
        let tenant = self.tenant()?;
        let index = self.coordinator.get_tree(tenant)?;
        match format {
            "json" => index.to_json(),
            "text" => {
                let file_counts = if counts {
                    Some(self.coordinator.file_counts(tenant)?)
                } else {
                    None
                };
                let highlight = (!self.cwd.is_root()).then_some(&self.cwd);
                let opts = RenderOptions {
                    file_counts: file_counts.as_ref(),
                    max_depth: depth,
                    highlight,
                    color: self.color,
                    counts_note: true,
                    ..RenderOptions::default()
                };
                Ok(render_tree(&index, &opts).trim_end().to_string())
            }
            other => Err(invalid_format(other)),
        }
    }

    fn handle_ls(
        &self,
        dir: &AbsolutePath,
        query: &FileQuery,
        format: &str,
    ) -> Result<String, ApiError> {
        let tenant = self.tenant()?;
        let records = self
            .coordinator
            .list_directory(tenant, &dir.to_string(), query)?;
        match format {
            "json" => Ok(serde_json::to_string_pretty(&records).map_err(StorageError::from)?),
            "text" => {
                if records.is_empty() {
                    return Ok(format!("No files found in {}", dir));
                }
                let index = self.coordinator.get_tree(tenant)?;
                Ok(format_file_table(&records, &index))
            }
            other => Err(invalid_format(other)),
        }
    }

    fn handle_files(&self, include_deleted: bool, format: &str) -> Result<String, ApiError> {
        let tenant = self.tenant()?;
        let records = self.coordinator.list_files(tenant, include_deleted)?;
        match format {
            "json" => Ok(serde_json::to_string_pretty(&records).map_err(StorageError::from)?),
            "text" => {
                if records.is_empty() {
                    return Ok("No file records".to_string());
                }
                let index = self.coordinator.get_tree(tenant)?;
                Ok(format_file_table(&records, &index))
            }
            other => Err(invalid_format(other)),
        }
    }
}

fn invalid_format(format: &str) -> ApiError {
    ApiError::ConfigError(format!(
        "Invalid output format: {} (must be 'text' or 'json')",
        format
    ))
}

/// Render file records as a table, resolving each directory id to its current path
fn format_file_table(records: &[FileRecord], index: &DirectoryIndex) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Directory", "Size", "Type", "Flags", "Created", "Deleted"]);
    for record in records {
        let directory = index
            .path_of(&record.directory_id)
            .map(|p| p.to_string())
            .unwrap_or_else(|| format!("<missing {}>", record.directory_id));
        let size = record
            .file_size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let file_type = record.file_type.clone().unwrap_or_else(|| "-".to_string());
        let mut flags = Vec::new();
        if record.is_public {
            flags.push("public");
        }
        if record.is_encrypted {
            flags.push("encrypted");
        }
        let flags = if flags.is_empty() {
            "-".to_string()
        } else {
            flags.join(",")
        };
        let created = record.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let deleted = record
            .deleted_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            record.name.clone(),
            directory,
            size,
            file_type,
            flags,
            created,
            deleted,
        ]);
    }
    table.to_string()
}
