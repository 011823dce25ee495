//! v002: derived indexes and the dedup fingerprint set.

use rusqlite::Connection;

use engram_core::errors::EngramResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> EngramResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS indexes (
            name        TEXT PRIMARY KEY,
            payload     BLOB NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS dedup_fingerprints (
            seq      INTEGER PRIMARY KEY AUTOINCREMENT,
            hash     TEXT NOT NULL UNIQUE,
            node_id  TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
