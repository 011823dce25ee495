//! The dedup fingerprint set.

use rusqlite::{params, Connection};

use engram_core::errors::EngramResult;
use engram_core::models::Fingerprint;

use crate::to_storage_err;

pub fn load(conn: &Connection) -> EngramResult<Vec<Fingerprint>> {
    let mut stmt = conn
        .prepare("SELECT hash, node_id FROM dedup_fingerprints ORDER BY seq")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Fingerprint {
                hash: row.get(0)?,
                node_id: row.get(1)?,
            })
        })
        .map_err(|e| to_storage_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}

/// Insert fingerprints; a hash already present keeps its first node.
pub fn append(conn: &Connection, fingerprints: &[Fingerprint]) -> EngramResult<()> {
    let mut stmt = conn
        .prepare_cached("INSERT OR IGNORE INTO dedup_fingerprints (hash, node_id) VALUES (?1, ?2)")
        .map_err(|e| to_storage_err(e.to_string()))?;
    for fp in fingerprints {
        stmt.execute(params![fp.hash, fp.node_id])
            .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(())
}

pub fn clear(conn: &Connection) -> EngramResult<()> {
    conn.execute("DELETE FROM dedup_fingerprints", [])
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
