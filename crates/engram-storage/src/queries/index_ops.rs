//! Serialized derived indexes, one row per index kind.

use rusqlite::{params, Connection, OptionalExtension};

use engram_core::errors::EngramResult;
use engram_core::models::IndexKind;

use crate::to_storage_err;

pub fn read(conn: &Connection, kind: IndexKind) -> EngramResult<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT payload FROM indexes WHERE name = ?1",
        params![kind.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

pub fn write(conn: &Connection, kind: IndexKind, payload: &[u8]) -> EngramResult<()> {
    conn.execute(
        "INSERT INTO indexes (name, payload, updated_at)
         VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         ON CONFLICT(name) DO UPDATE SET payload = excluded.payload,
                                         updated_at = excluded.updated_at",
        params![kind.as_str(), payload],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
