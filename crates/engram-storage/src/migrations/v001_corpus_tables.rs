//! v001: manifest, nodes, episodes.
//!
//! Scope, conversation and time columns are real columns so scope listing
//! and recall filter in SQL; the rest of each record is a JSON document.

use rusqlite::Connection;

use engram_core::errors::EngramResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> EngramResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS manifest (
            id              INTEGER PRIMARY KEY CHECK (id = 1),
            format_version  INTEGER NOT NULL,
            corpus_version  INTEGER NOT NULL DEFAULT 0,
            dimensions      INTEGER,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS nodes (
            seq              INTEGER PRIMARY KEY AUTOINCREMENT,
            id               TEXT NOT NULL UNIQUE,
            conversation_id  TEXT NOT NULL,
            owner_id         TEXT,
            tenant_id        TEXT,
            created_at       TEXT NOT NULL,
            active           INTEGER NOT NULL DEFAULT 1,
            record           TEXT NOT NULL,
            embedding        BLOB,
            CHECK (owner_id IS NOT NULL OR tenant_id IS NOT NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_owner ON nodes(owner_id);
        CREATE INDEX IF NOT EXISTS idx_nodes_tenant ON nodes(tenant_id);
        CREATE INDEX IF NOT EXISTS idx_nodes_conversation ON nodes(conversation_id);
        CREATE INDEX IF NOT EXISTS idx_nodes_created ON nodes(created_at);

        CREATE TABLE IF NOT EXISTS episodes (
            seq              INTEGER PRIMARY KEY AUTOINCREMENT,
            id               TEXT NOT NULL UNIQUE,
            conversation_id  TEXT NOT NULL,
            owner_id         TEXT,
            tenant_id        TEXT,
            created_at       TEXT NOT NULL,
            active           INTEGER NOT NULL DEFAULT 1,
            record           TEXT NOT NULL,
            embedding        BLOB,
            CHECK (owner_id IS NOT NULL OR tenant_id IS NOT NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_episodes_owner ON episodes(owner_id);
        CREATE INDEX IF NOT EXISTS idx_episodes_tenant ON episodes(tenant_id);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
