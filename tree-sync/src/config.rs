//! Configuration management for the synchronizer.
//!
//! Built-in defaults, then an optional TOML file, then `TREE_SYNC_*`
//! environment variables (`TREE_SYNC_STORE__PATH`, `TREE_SYNC_LOG__LEVEL`, ...).

use ::config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "TREE_SYNC";
const HOME_CONFIG: &str = ".tree-sync.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub log: LogConfig,
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Vault directory acting as the remote tree
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Never draw the progress line
    #[serde(default)]
    pub no_progress: bool,

    /// Continue past per-file failures
    #[serde(default)]
    pub ignore_errors: bool,
}

/// Where the file layer comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigFile {
    /// `$HOME/.tree-sync.toml` if it exists
    Home,
    /// An explicit file, which must exist
    Explicit(PathBuf),
    /// No file layer at all
    Ignored,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn toml_file(path: &Path) -> File<::config::FileSourceFile, FileFormat> {
    File::from(path).format(FileFormat::Toml)
}

fn default_store_path() -> PathBuf {
    home_dir().join(".tree-sync").join("vault")
}

impl Config {
    /// Load configuration from defaults, `file` and the process environment.
    pub fn load(file: ConfigFile) -> anyhow::Result<Self> {
        Self::layered(file, Environment::with_prefix(ENV_PREFIX))
    }

    fn layered(file: ConfigFile, env: Environment) -> anyhow::Result<Self> {
        let defaults = Config::default();
        let mut builder = ::config::Config::builder()
            .set_default("store.path", defaults.store.path.to_string_lossy().into_owned())?
            .set_default("log.level", defaults.log.level)?
            .set_default("transfer.no_progress", false)?
            .set_default("transfer.ignore_errors", false)?;

        match &file {
            ConfigFile::Home => {
                let path = home_dir().join(HOME_CONFIG);
                builder = builder.add_source(toml_file(&path).required(false));
            }
            ConfigFile::Explicit(path) => {
                builder = builder.add_source(toml_file(path).required(true));
            }
            ConfigFile::Ignored => {}
        }

        let config = builder
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: StoreConfig {
                path: default_store_path(),
            },
            log: LogConfig {
                level: default_log_level(),
            },
            transfer: TransferConfig::default(),
        }
    }
}
