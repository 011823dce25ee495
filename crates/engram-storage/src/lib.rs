//! # engram-storage
//!
//! The corpus store. Two backends implement [`ICorpusStorage`]:
//!
//! - [`FileCorpusStore`]: JSON-lines records, little-endian `f32` vector
//!   arrays and JSON indexes under one directory.
//! - [`SqliteCorpusStore`]: numbered migrations, one write connection and a
//!   read pool, vectors in a BLOB column.
//!
//! Retrieval and ingestion only ever hold an `Arc<dyn ICorpusStorage>`;
//! [`open_storage`] picks the backend from configuration.

pub mod codec;
pub mod file;
pub mod migrations;
pub mod pool;
pub mod queries;
pub mod record;
pub mod sqlite_store;
pub mod validation;

use std::path::Path;
use std::sync::Arc;

use engram_core::config::{StorageBackend, StorageConfig};
use engram_core::errors::{EngramError, EngramResult, StorageError};
use engram_core::traits::ICorpusStorage;

pub use file::FileCorpusStore;
pub use sqlite_store::SqliteCorpusStore;

/// Open the configured backend.
pub fn open_storage(config: &StorageConfig) -> EngramResult<Arc<dyn ICorpusStorage>> {
    let store: Arc<dyn ICorpusStorage> = match config.backend {
        StorageBackend::File => Arc::new(FileCorpusStore::open(&config.data_dir)?),
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(&config.data_dir)
                .map_err(|e| to_io_err(&config.data_dir, e))?;
            Arc::new(SqliteCorpusStore::open(&config.db_path(), config)?)
        }
    };
    tracing::info!(backend = store.backend_name(), "corpus store opened");
    Ok(store)
}

/// Helper to convert a SQLite failure message into an `EngramError`.
pub fn to_storage_err(msg: String) -> EngramError {
    EngramError::StorageError(StorageError::SqliteError { message: msg })
}

/// Helper to convert a filesystem failure into an `EngramError`.
pub fn to_io_err(path: &Path, err: std::io::Error) -> EngramError {
    EngramError::StorageError(StorageError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// Poisoned lock around a backend's shared state.
pub(crate) fn poisoned(resource: &str) -> EngramError {
    EngramError::StorageError(StorageError::LockPoisoned {
        resource: resource.to_string(),
    })
}
