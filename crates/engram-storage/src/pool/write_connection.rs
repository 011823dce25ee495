//! Single write connection. Writes are serialized behind a mutex; callers
//! are blocking contexts (the ingestion worker's blocking section), so a
//! std mutex is enough.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use engram_core::config::StorageConfig;
use engram_core::errors::EngramResult;

use super::pragmas::apply_pragmas;
use crate::{poisoned, to_storage_err};

pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    /// Open a new write connection to the given database path.
    pub fn open(path: &Path, config: &StorageConfig) -> EngramResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        apply_pragmas(&conn, config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(config: &StorageConfig) -> EngramResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        apply_pragmas(&conn, config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the write lock and execute a closure with the connection.
    pub fn with_conn_sync<F, T>(&self, f: F) -> EngramResult<T>
    where
        F: FnOnce(&Connection) -> EngramResult<T>,
    {
        let guard = self.conn.lock().map_err(|_| poisoned("sqlite writer"))?;
        f(&guard)
    }
}
