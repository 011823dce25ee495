//! Byte encodings shared by both backends: vector rows as little-endian
//! `f32`, and the header of the file backend's vector arrays.

use engram_core::errors::{EngramError, EngramResult, StorageError};

/// Magic bytes opening every vector array file.
pub const VECTOR_MAGIC: &[u8; 4] = b"EGV1";

/// Magic plus a `u32` dimension.
pub const VECTOR_HEADER_LEN: usize = 8;

pub fn f32_vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn bytes_to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn encode_header(dims: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(VECTOR_HEADER_LEN);
    out.extend_from_slice(VECTOR_MAGIC);
    out.extend_from_slice(&(dims as u32).to_le_bytes());
    out
}

/// Encode a whole vector array: header followed by the rows back to back.
pub fn encode_array(dims: usize, rows: &[Vec<f32>]) -> Vec<u8> {
    let mut out = encode_header(dims);
    out.reserve(rows.len() * dims * 4);
    for row in rows {
        out.extend(f32_vec_to_bytes(row));
    }
    out
}

/// Decode a vector array written by [`encode_array`] (possibly extended
/// by appends). A trailing partial row, left by an interrupted append, is
/// ignored.
pub fn decode_array(name: &str, bytes: &[u8]) -> EngramResult<Vec<Vec<f32>>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    if bytes.len() < VECTOR_HEADER_LEN || &bytes[..4] != VECTOR_MAGIC {
        return Err(malformed(name, "missing vector header"));
    }
    let dims = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if dims == 0 {
        return Err(malformed(name, "zero dimension"));
    }
    let body = &bytes[VECTOR_HEADER_LEN..];
    let row_len = dims * 4;
    if body.len() % row_len != 0 {
        tracing::warn!(
            file = name,
            trailing = body.len() % row_len,
            "ignoring partial vector row"
        );
    }
    Ok(body.chunks_exact(row_len).map(bytes_to_f32_vec).collect())
}

/// Dimension recorded in a vector array header, if any.
pub fn header_dims(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < VECTOR_HEADER_LEN || &bytes[..4] != VECTOR_MAGIC {
        return None;
    }
    Some(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize)
}

fn malformed(name: &str, reason: &str) -> EngramError {
    EngramError::StorageError(StorageError::MalformedRecord {
        id: name.to_string(),
        reason: reason.to_string(),
    })
}
