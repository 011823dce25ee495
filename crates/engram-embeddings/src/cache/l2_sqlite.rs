//! L2 SQLite-backed embedding cache.
//!
//! Persists `key → f32 blob` rows so embeddings survive restarts.

use std::path::Path;
use std::sync::Mutex;

use engram_core::errors::{EmbeddingError, EngramResult};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS embedding_cache (
    cache_key   TEXT PRIMARY KEY,
    dimensions  INTEGER NOT NULL,
    embedding   BLOB NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
";

/// L2 persistent embedding cache.
pub struct L2SqliteCache {
    conn: Mutex<Connection>,
}

fn cache_err(e: impl std::fmt::Display) -> EmbeddingError {
    EmbeddingError::CacheFailure {
        reason: e.to_string(),
    }
}

impl L2SqliteCache {
    /// Open or create the cache database at `path`.
    pub fn open(path: &Path) -> EngramResult<Self> {
        let conn = Connection::open(path).map_err(cache_err)?;
        Self::init(conn)
    }

    /// Volatile cache, used in tests.
    pub fn open_in_memory() -> EngramResult<Self> {
        let conn = Connection::open_in_memory().map_err(cache_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> EngramResult<Self> {
        conn.execute_batch(SCHEMA).map_err(cache_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, key: &str) -> EngramResult<Option<Vec<f32>>> {
        let conn = self.conn.lock().map_err(cache_err)?;
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT embedding FROM embedding_cache WHERE cache_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(cache_err)?;
        Ok(blob.map(|bytes| bytes_to_f32(&bytes)))
    }

    pub fn insert(&self, key: &str, embedding: &[f32]) -> EngramResult<()> {
        let conn = self.conn.lock().map_err(cache_err)?;
        conn.execute(
            "INSERT OR REPLACE INTO embedding_cache (cache_key, dimensions, embedding)
             VALUES (?1, ?2, ?3)",
            params![key, embedding.len() as i64, f32_to_bytes(embedding)],
        )
        .map_err(cache_err)?;
        debug!(key, "L2 cache insert");
        Ok(())
    }

    pub fn len(&self) -> EngramResult<usize> {
        let conn = self.conn.lock().map_err(cache_err)?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM embedding_cache", [], |row| row.get(0))
            .map_err(cache_err)?;
        Ok(n as usize)
    }

    pub fn clear(&self) -> EngramResult<()> {
        let conn = self.conn.lock().map_err(cache_err)?;
        conn.execute("DELETE FROM embedding_cache", [])
            .map_err(cache_err)?;
        Ok(())
    }
}

fn f32_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cache = L2SqliteCache::open_in_memory().unwrap();
        let embedding = vec![1.0f32, 2.5, -3.7, 0.0];
        cache.insert("deadbeef", &embedding).unwrap();
        assert_eq!(cache.get("deadbeef").unwrap(), Some(embedding));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn miss_returns_none() {
        let cache = L2SqliteCache::open_in_memory().unwrap();
        assert!(cache.get("missing").unwrap().is_none());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let cache = L2SqliteCache::open(&path).unwrap();
            cache.insert("k", &[0.5, 0.25]).unwrap();
        }
        let cache = L2SqliteCache::open(&path).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(vec![0.5, 0.25]));
        cache.clear().unwrap();
        assert_eq!(cache.len().unwrap(), 0);
    }
}
