use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Which corpus store implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// JSON records plus binary vector arrays under a directory.
    #[default]
    File,
    /// Relational tables with a vector BLOB column.
    Sqlite,
}

/// Storage subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the file backend, and parent of the SQLite file.
    pub data_dir: PathBuf,
    /// SQLite database file name, relative to `data_dir`.
    pub db_filename: String,
    /// Enable WAL mode (SQLite backend only).
    pub wal_mode: bool,
    pub busy_timeout_ms: u32,
    /// Number of read connections in the SQLite read pool.
    pub read_pool_size: usize,
}

impl StorageConfig {
    /// Full path to the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_filename)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: PathBuf::from(defaults::DEFAULT_DATA_DIR),
            db_filename: defaults::DEFAULT_DB_FILENAME.to_string(),
            wal_mode: defaults::DEFAULT_WAL_MODE,
            busy_timeout_ms: defaults::DEFAULT_BUSY_TIMEOUT_MS,
            read_pool_size: defaults::DEFAULT_READ_POOL_SIZE,
        }
    }
}
