//! Bootstrap configuration and root folder resolution
//!
//! Two layers:
//! 1. **TOML bootstrap** (`reims.toml`): database path, bind address, storage
//!    backend, logging, rent roll policy, property aliases.
//! 2. **Root folder**: resolved from CLI argument → `REIMS_ROOT_FOLDER` →
//!    TOML `root_folder` → OS default. The database and local object storage
//!    live under it unless the TOML overrides them.
//!
//! A missing or unreadable TOML file is never fatal; defaults are used and a
//! warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "REIMS_ROOT_FOLDER";

/// Default database filename inside the root folder
pub const DATABASE_FILENAME: &str = "reims.db";

/// Default bucket name (matches the MinIO bucket used by the upload layout)
pub const DEFAULT_BUCKET: &str = "reims-files";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for database and local storage
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// SQLite database file; defaults to `{root_folder}/reims.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub rent_roll: RentRollConfig,

    /// Extra property aliases appended after the built-in table
    #[serde(default)]
    pub aliases: Vec<AliasConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Object storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory tree on local disk, one directory per bucket
    #[default]
    Local,
    /// S3-compatible service (MinIO, AWS)
    S3,
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Local backend directory; defaults to `{root_folder}/storage`
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// S3 endpoint URL (e.g. `http://localhost:9000` for MinIO)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,
}

/// What happens when a rent roll's unit count disagrees with the count the
/// source document declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitCountPolicy {
    /// Refuse the import
    #[default]
    Reject,
    /// Import anyway and report a warning
    Warn,
}

/// Rent roll import configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RentRollConfig {
    #[serde(default)]
    pub unit_count_policy: UnitCountPolicy,
}

/// One configured property alias: filenames matching `pattern`
/// (case-insensitive regex) resolve to `name`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasConfig {
    pub name: String,
    pub pattern: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8001".to_string()
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: default_bucket(),
            path: None,
            endpoint: None,
            region: default_region(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            bind_addr: default_bind_addr(),
            max_upload_bytes: default_max_upload_bytes(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            rent_roll: RentRollConfig::default(),
            aliases: Vec::new(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load a TOML file, failing if it is missing or malformed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load a TOML file, falling back to defaults on any failure.
    ///
    /// Nothing is logged here: this usually runs before the subscriber is
    /// installed, so the caller logs the returned [`ConfigSource`] once it is.
    pub fn load_or_default(path: Option<&Path>) -> (Self, ConfigSource) {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return (Self::default(), ConfigSource::Defaults),
            },
        };

        match Self::load(&path) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(error) => (Self::default(), ConfigSource::Fallback { path, error }),
        }
    }
}

/// Where the active configuration came from
#[derive(Debug)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// No config file; built-in defaults
    Defaults,
    /// The file could not be used; built-in defaults
    Fallback { path: PathBuf, error: Error },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Defaults => info!("No config file found, using built-in defaults"),
            ConfigSource::Fallback { path, error } => {
                warn!("{} ({}) - using built-in defaults", error, path.display())
            }
        }
    }
}

/// `~/.config/reims/reims.toml` (platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("reims").join("reims.toml"))
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("reims"))
        .unwrap_or_else(|| PathBuf::from("./reims_data"))
}

/// Resolves the root folder from its four sources
pub struct RootFolderResolver<'a> {
    cli_arg: Option<PathBuf>,
    toml: &'a TomlConfig,
}

impl<'a> RootFolderResolver<'a> {
    pub fn new(cli_arg: Option<PathBuf>, toml: &'a TomlConfig) -> Self {
        Self { cli_arg, toml }
    }

    /// Priority: CLI → ENV → TOML → OS default
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml.root_folder {
            return path.clone();
        }

        default_root_folder()
    }
}

/// Paths derived from a resolved root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    root: PathBuf,
    database: PathBuf,
    storage: PathBuf,
}

impl RootFolder {
    pub fn new(root: PathBuf, toml: &TomlConfig) -> Self {
        let database = toml
            .database_path
            .clone()
            .unwrap_or_else(|| root.join(DATABASE_FILENAME));
        let storage = toml
            .storage
            .path
            .clone()
            .unwrap_or_else(|| root.join("storage"));
        Self {
            root,
            database,
            storage,
        }
    }

    /// Create the root folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> &Path {
        &self.database
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage
    }
}
