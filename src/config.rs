use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::trace;

use crate::tsdb::TableOptions;

/// Table client configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory tables (no persistence)
    Memory,

    /// SQLite database (default)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./tsdb.db")
}

fn default_table() -> String {
    String::from("argus")
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Config {
    /// Name of the table metrics are written to
    #[serde(default = "default_table")]
    pub table: String,

    /// Treat a failed flush after a write batch as an error
    #[serde(default)]
    pub strict_flush: bool,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table: default_table(),
            strict_flush: false,
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            table: self.table.clone(),
            strict_flush: self.strict_flush,
        }
    }
}

/// Read a config file, TOML if the extension says so, JSON otherwise
pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&file_content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        _ => serde_json::from_str(&file_content)
            .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))?,
    };

    trace!("loaded config: {config:?}");
    Ok(config)
}
