//! Insert, get, list and update for node and episode rows. Both tables
//! share one shape, so the SQL is written once over [`StoredRecord`].

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql};

use engram_core::errors::{ConsistencyError, EngramError, EngramResult, StorageError};
use engram_core::models::AuthScope;

use crate::codec::{bytes_to_f32_vec, f32_vec_to_bytes};
use crate::record::StoredRecord;
use crate::to_storage_err;

fn table<T: StoredRecord>() -> &'static str {
    T::KIND.as_str()
}

/// Insert records in order, each with its vector.
pub fn insert<T: StoredRecord>(conn: &Connection, records: &[T]) -> EngramResult<()> {
    let sql = format!(
        "INSERT INTO {} (id, conversation_id, owner_id, tenant_id, created_at, active, record, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        table::<T>()
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    for record in records {
        let json = serde_json::to_string(record)?;
        let scope = record.scope();
        stmt.execute(params![
            record.id(),
            record.conversation_id(),
            scope.owner_id(),
            scope.tenant_id(),
            record.created_at().to_rfc3339(),
            record.active(),
            json,
            f32_vec_to_bytes(record.vector()),
        ])
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                EngramError::StorageError(StorageError::DuplicateRecord {
                    id: record.id().to_string(),
                })
            }
            other => to_storage_err(format!("insert {}: {other}", record.id())),
        })?;
    }
    Ok(())
}

pub fn get<T: StoredRecord>(conn: &Connection, id: &str) -> EngramResult<Option<T>> {
    let sql = format!(
        "SELECT seq, record, embedding FROM {} WHERE id = ?1",
        table::<T>()
    );
    let row: Option<(i64, String, Option<Vec<u8>>)> = conn
        .query_row(&sql, params![id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    let Some((seq, json, blob)) = row else {
        return Ok(None);
    };
    let mut record: T = decode(id, &json)?;
    match blob {
        Some(bytes) => record.set_vector(bytes_to_f32_vec(&bytes)),
        None => {
            let index = ordinal::<T>(conn, seq)?;
            return Err(missing_row::<T>(index, vector_rows::<T>(conn)?));
        }
    }
    Ok(Some(record))
}

/// All records in append order with vectors attached.
pub fn load_all<T: StoredRecord>(conn: &Connection) -> EngramResult<Vec<T>> {
    load_filtered(conn, "", &[])
}

/// Records visible to `scope`, filtered in SQL.
pub fn load_by_scope<T: StoredRecord>(conn: &Connection, scope: &AuthScope) -> EngramResult<Vec<T>> {
    load_filtered(
        conn,
        "WHERE owner_id = ?1 OR tenant_id = ?2",
        &[&scope.owner_id() as &dyn ToSql, &scope.tenant_id()],
    )
}

/// Records without vectors, in append order.
pub fn load_records<T: StoredRecord>(conn: &Connection) -> EngramResult<Vec<T>> {
    let sql = format!("SELECT id, record FROM {} ORDER BY seq", table::<T>());
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        let (id, json) = row.map_err(|e| to_storage_err(e.to_string()))?;
        out.push(decode(&id, &json)?);
    }
    Ok(out)
}

fn load_filtered<T: StoredRecord>(
    conn: &Connection,
    filter: &str,
    args: &[&dyn ToSql],
) -> EngramResult<Vec<T>> {
    // Ordinal positions come from the full table so a missing row reports
    // its index in the vector array, not in the filtered result.
    let sql = format!(
        "SELECT id, record, embedding, pos FROM (
             SELECT id, record, embedding, owner_id, tenant_id,
                    ROW_NUMBER() OVER (ORDER BY seq) - 1 AS pos, seq
             FROM {}
         ) {filter} ORDER BY seq",
        table::<T>()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(args, read_full_row)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        let (id, json, blob, pos) = row.map_err(|e| to_storage_err(e.to_string()))?;
        let mut record: T = decode(&id, &json)?;
        match blob {
            Some(bytes) => record.set_vector(bytes_to_f32_vec(&bytes)),
            None => return Err(missing_row::<T>(pos.max(0) as usize, vector_rows::<T>(conn)?)),
        }
        out.push(record);
    }
    Ok(out)
}

type FullRow = (String, String, Option<Vec<u8>>, i64);

fn read_full_row(row: &Row<'_>) -> rusqlite::Result<FullRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// Rewrite the JSON document and the active flag of existing records.
pub fn update<T: StoredRecord>(conn: &Connection, records: &[T]) -> EngramResult<()> {
    let sql = format!(
        "UPDATE {} SET record = ?1, active = ?2 WHERE id = ?3",
        table::<T>()
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    for record in records {
        let json = serde_json::to_string(record)?;
        let changed = stmt
            .execute(params![json, record.active(), record.id()])
            .map_err(|e| to_storage_err(e.to_string()))?;
        if changed == 0 {
            return Err(T::not_found(record.id()));
        }
    }
    Ok(())
}

/// The vector column in append order, up to the first missing row.
pub fn read_vectors<T: StoredRecord>(conn: &Connection) -> EngramResult<Vec<Vec<f32>>> {
    let sql = format!("SELECT embedding FROM {} ORDER BY seq", table::<T>());
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, Option<Vec<u8>>>(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        match row.map_err(|e| to_storage_err(e.to_string()))? {
            Some(bytes) => out.push(bytes_to_f32_vec(&bytes)),
            None => break,
        }
    }
    Ok(out)
}

/// Replace every vector, row `i` going to the `i`-th record in append order.
pub fn write_vectors<T: StoredRecord>(conn: &Connection, rows: &[Vec<f32>]) -> EngramResult<()> {
    let ids: Vec<String> = {
        let sql = format!("SELECT id FROM {} ORDER BY seq", table::<T>());
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| to_storage_err(e.to_string()))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| to_storage_err(e.to_string()))?;
        ids
    };
    if ids.len() != rows.len() {
        return Err(EngramError::ConsistencyError(
            ConsistencyError::IndexOutOfSync {
                index: format!("vectors/{}", table::<T>()),
                indexed: rows.len(),
                corpus: ids.len(),
            },
        ));
    }
    let sql = format!("UPDATE {} SET embedding = ?1 WHERE id = ?2", table::<T>());
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    for (id, row) in ids.iter().zip(rows) {
        stmt.execute(params![f32_vec_to_bytes(row), id])
            .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(())
}

fn decode<T: StoredRecord>(id: &str, json: &str) -> EngramResult<T> {
    serde_json::from_str(json).map_err(|e| {
        EngramError::StorageError(StorageError::MalformedRecord {
            id: id.to_string(),
            reason: e.to_string(),
        })
    })
}

fn ordinal<T: StoredRecord>(conn: &Connection, seq: i64) -> EngramResult<usize> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE seq < ?1", table::<T>());
    let n: i64 = conn
        .query_row(&sql, params![seq], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(n.max(0) as usize)
}

fn vector_rows<T: StoredRecord>(conn: &Connection) -> EngramResult<usize> {
    Ok(read_vectors::<T>(conn)?.len())
}

fn missing_row<T: StoredRecord>(index: usize, rows: usize) -> EngramError {
    EngramError::ConsistencyError(ConsistencyError::VectorRowMissing {
        kind: table::<T>().to_string(),
        index,
        rows,
    })
}
