//! Relational corpus store over SQLite.

use std::path::Path;

use rusqlite::Connection;

use engram_core::config::StorageConfig;
use engram_core::errors::EngramResult;
use engram_core::models::{
    AuthScope, Episode, Fingerprint, IndexKind, InteractionNode, Manifest, RecordKind,
};
use engram_core::traits::ICorpusStorage;
use engram_observability::storage_span;

use crate::migrations;
use crate::pool::pragmas::verify_wal_mode;
use crate::pool::ConnectionPool;
use crate::queries::{fingerprint_ops, index_ops, manifest_ops, record_ops};
use crate::record::StoredRecord;
use crate::to_storage_err;
use crate::validation;

const BACKEND: &str = "sqlite";

/// Owns the connection pool and implements [`ICorpusStorage`].
pub struct SqliteCorpusStore {
    pool: ConnectionPool,
}

impl SqliteCorpusStore {
    /// Open a store backed by a file on disk.
    pub fn open(path: &Path, config: &StorageConfig) -> EngramResult<Self> {
        let _span = storage_span!(BACKEND, "open").entered();
        let pool = ConnectionPool::open(path, config, |writer| {
            writer.with_conn_sync(initialize)
        })?;
        if config.wal_mode && !pool.writer.with_conn_sync(verify_wal_mode)? {
            tracing::warn!(path = %path.display(), "WAL mode requested but not active");
        }
        Ok(Self { pool })
    }

    /// Open an in-memory store (for testing). Reads go through the writer.
    pub fn open_in_memory(config: &StorageConfig) -> EngramResult<Self> {
        let pool = ConnectionPool::open_in_memory(config, |writer| {
            writer.with_conn_sync(initialize)
        })?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Read on the best available connection: the read pool when file
    /// backed, the writer in memory.
    fn with_reader<F, T>(&self, f: F) -> EngramResult<T>
    where
        F: FnOnce(&Connection) -> EngramResult<T>,
    {
        match &self.pool.readers {
            Some(readers) => readers.with_conn(f),
            None => self.pool.writer.with_conn_sync(f),
        }
    }

    /// Run `f` in a write transaction that also bumps the manifest.
    fn with_write_tx<F, T>(&self, op: &str, f: F) -> EngramResult<T>
    where
        F: FnOnce(&Connection, Option<usize>) -> EngramResult<(T, Option<usize>)>,
    {
        let _span = storage_span!(BACKEND, op).entered();
        self.pool.writer.with_conn_sync(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("{op} begin: {e}")))?;
            let stored = manifest_ops::read(&tx)?.dimensions;
            let (out, dims) = f(&tx, stored)?;
            manifest_ops::bump(&tx, dims)?;
            tx.commit()
                .map_err(|e| to_storage_err(format!("{op} commit: {e}")))?;
            Ok(out)
        })
    }

    fn append<T: StoredRecord>(&self, records: &[T]) -> EngramResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.with_write_tx("append", |conn, stored| {
            let dims =
                validation::check_rows(stored, records.iter().map(|r| (r.id(), r.vector())))?;
            record_ops::insert(conn, records)?;
            Ok(((), dims))
        })
    }
}

fn initialize(conn: &Connection) -> EngramResult<()> {
    migrations::run_migrations(conn)?;
    manifest_ops::ensure_row(conn)
}

impl ICorpusStorage for SqliteCorpusStore {
    fn manifest(&self) -> EngramResult<Manifest> {
        self.with_reader(manifest_ops::read)
    }

    fn append_nodes(&self, nodes: &[InteractionNode]) -> EngramResult<()> {
        self.append(nodes)
    }

    fn append_episodes(&self, episodes: &[Episode]) -> EngramResult<()> {
        self.append(episodes)
    }

    fn get_node(&self, id: &str) -> EngramResult<Option<InteractionNode>> {
        self.with_reader(|conn| record_ops::get(conn, id))
    }

    fn get_episode(&self, id: &str) -> EngramResult<Option<Episode>> {
        self.with_reader(|conn| record_ops::get(conn, id))
    }

    fn load_nodes(&self) -> EngramResult<Vec<InteractionNode>> {
        self.with_reader(record_ops::load_all)
    }

    fn load_episodes(&self) -> EngramResult<Vec<Episode>> {
        self.with_reader(record_ops::load_all)
    }

    fn load_node_records(&self) -> EngramResult<Vec<InteractionNode>> {
        self.with_reader(record_ops::load_records)
    }

    fn load_episode_records(&self) -> EngramResult<Vec<Episode>> {
        self.with_reader(record_ops::load_records)
    }

    fn list_nodes_by_scope(&self, scope: &AuthScope) -> EngramResult<Vec<InteractionNode>> {
        self.with_reader(|conn| record_ops::load_by_scope(conn, scope))
    }

    fn read_vectors(&self, kind: RecordKind) -> EngramResult<Vec<Vec<f32>>> {
        self.with_reader(|conn| match kind {
            RecordKind::Node => record_ops::read_vectors::<InteractionNode>(conn),
            RecordKind::Episode => record_ops::read_vectors::<Episode>(conn),
        })
    }

    fn write_vectors(&self, kind: RecordKind, rows: &[Vec<f32>]) -> EngramResult<()> {
        self.with_write_tx("write_vectors", |conn, stored| {
            let dims = validation::check_array(stored, rows)?;
            match kind {
                RecordKind::Node => record_ops::write_vectors::<InteractionNode>(conn, rows)?,
                RecordKind::Episode => record_ops::write_vectors::<Episode>(conn, rows)?,
            }
            Ok(((), dims))
        })
    }

    fn update_nodes(&self, nodes: &[InteractionNode]) -> EngramResult<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        self.with_write_tx("update_nodes", |conn, stored| {
            record_ops::update(conn, nodes)?;
            Ok(((), stored))
        })
    }

    fn update_episodes(&self, episodes: &[Episode]) -> EngramResult<()> {
        if episodes.is_empty() {
            return Ok(());
        }
        self.with_write_tx("update_episodes", |conn, stored| {
            record_ops::update(conn, episodes)?;
            Ok(((), stored))
        })
    }

    fn read_index(&self, kind: IndexKind) -> EngramResult<Option<Vec<u8>>> {
        self.with_reader(|conn| index_ops::read(conn, kind))
    }

    fn write_index(&self, kind: IndexKind, payload: &[u8]) -> EngramResult<()> {
        self.with_write_tx("write_index", |conn, stored| {
            index_ops::write(conn, kind, payload)?;
            Ok(((), stored))
        })
    }

    fn load_fingerprints(&self) -> EngramResult<Vec<Fingerprint>> {
        self.with_reader(fingerprint_ops::load)
    }

    fn append_fingerprints(&self, fingerprints: &[Fingerprint]) -> EngramResult<()> {
        if fingerprints.is_empty() {
            return Ok(());
        }
        self.with_write_tx("append_fingerprints", |conn, stored| {
            fingerprint_ops::append(conn, fingerprints)?;
            Ok(((), stored))
        })
    }

    fn replace_fingerprints(&self, fingerprints: &[Fingerprint]) -> EngramResult<()> {
        self.with_write_tx("replace_fingerprints", |conn, stored| {
            fingerprint_ops::clear(conn)?;
            fingerprint_ops::append(conn, fingerprints)?;
            Ok(((), stored))
        })
    }

    fn backend_name(&self) -> &str {
        BACKEND
    }
}
