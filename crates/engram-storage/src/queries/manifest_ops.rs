//! The single manifest row. Counts are not stored; they are `COUNT(*)`s.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use engram_core::constants::CORPUS_FORMAT_VERSION;
use engram_core::errors::EngramResult;
use engram_core::models::Manifest;

use crate::to_storage_err;

pub fn ensure_row(conn: &Connection) -> EngramResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO manifest (id, format_version, corpus_version, dimensions, updated_at)
         VALUES (1, ?1, 0, NULL, ?2)",
        params![CORPUS_FORMAT_VERSION, Utc::now().to_rfc3339()],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn read(conn: &Connection) -> EngramResult<Manifest> {
    let row: Option<(u32, i64, Option<i64>, String)> = conn
        .query_row(
            "SELECT format_version, corpus_version, dimensions, updated_at FROM manifest WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    let node_count = count(conn, "nodes")?;
    let episode_count = count(conn, "episodes")?;
    Ok(match row {
        Some((format_version, corpus_version, dimensions, updated_at)) => Manifest {
            format_version,
            corpus_version: corpus_version.max(0) as u64,
            node_count,
            episode_count,
            dimensions: dimensions.map(|d| d.max(0) as usize),
            updated_at: parse_time(&updated_at),
        },
        None => Manifest {
            node_count,
            episode_count,
            ..Manifest::default()
        },
    })
}

/// Record a committed write, fixing the dimension if it was unset.
pub fn bump(conn: &Connection, dimensions: Option<usize>) -> EngramResult<()> {
    conn.execute(
        "UPDATE manifest SET corpus_version = corpus_version + 1,
                             dimensions = COALESCE(dimensions, ?1),
                             updated_at = ?2
         WHERE id = 1",
        params![dimensions.map(|d| d as i64), Utc::now().to_rfc3339()],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

fn count(conn: &Connection, table: &str) -> EngramResult<usize> {
    let n: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(n.max(0) as usize)
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
