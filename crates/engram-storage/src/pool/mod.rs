//! Connection pool: one write connection plus a read pool.

pub mod pragmas;
pub mod read_pool;
pub mod write_connection;

use std::path::{Path, PathBuf};

use engram_core::config::StorageConfig;
use engram_core::errors::EngramResult;

pub use read_pool::ReadPool;
pub use write_connection::WriteConnection;

pub struct ConnectionPool {
    pub writer: WriteConnection,
    /// Absent in in-memory mode, where a separate connection would see a
    /// different database.
    pub readers: Option<ReadPool>,
    pub db_path: Option<PathBuf>,
}

impl ConnectionPool {
    /// Open the writer first so the file and schema exist before the
    /// read-only connections attach.
    pub fn open(
        path: &Path,
        config: &StorageConfig,
        init: impl FnOnce(&WriteConnection) -> EngramResult<()>,
    ) -> EngramResult<Self> {
        let writer = WriteConnection::open(path, config)?;
        init(&writer)?;
        let readers = ReadPool::open(path, config)?;
        Ok(Self {
            writer,
            readers: Some(readers),
            db_path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory(
        config: &StorageConfig,
        init: impl FnOnce(&WriteConnection) -> EngramResult<()>,
    ) -> EngramResult<Self> {
        let writer = WriteConnection::open_in_memory(config)?;
        init(&writer)?;
        Ok(Self {
            writer,
            readers: None,
            db_path: None,
        })
    }
}
