//! Append and replace primitives for the file backend.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use engram_core::errors::{EngramError, EngramResult, StorageError};

use crate::to_io_err;

/// Read a whole file, treating a missing file as empty.
pub fn read_or_empty(path: &Path) -> EngramResult<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(to_io_err(path, e)),
    }
}

/// Replace `path` with `bytes` by writing a sibling temp file and renaming
/// it over the target, so readers never see a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> EngramResult<()> {
    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp).map_err(|e| to_io_err(&tmp, e))?;
        file.write_all(bytes).map_err(|e| to_io_err(&tmp, e))?;
        file.sync_all().map_err(|e| to_io_err(&tmp, e))?;
    }
    std::fs::rename(&tmp, path).map_err(|e| to_io_err(path, e))
}

/// Append raw bytes and sync.
pub fn append_bytes(path: &Path, bytes: &[u8]) -> EngramResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| to_io_err(path, e))?;
    file.write_all(bytes).map_err(|e| to_io_err(path, e))?;
    file.sync_data().map_err(|e| to_io_err(path, e))
}

/// Serialize records as JSON lines.
pub fn encode_lines<T: Serialize>(records: &[T]) -> EngramResult<Vec<u8>> {
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Parse a JSON-lines file. A malformed final line is the trace of an
/// interrupted append and is dropped with a warning; a malformed line
/// anywhere else is corruption.
pub fn decode_lines<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> EngramResult<Vec<T>> {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut out = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        match serde_json::from_str(line) {
            Ok(record) => out.push(record),
            Err(e) if i + 1 == lines.len() => {
                tracing::warn!(
                    file = %path.display(),
                    line = i + 1,
                    error = %e,
                    "dropping torn trailing record"
                );
            }
            Err(e) => {
                return Err(EngramError::StorageError(StorageError::MalformedRecord {
                    id: format!("{}:{}", path.display(), i + 1),
                    reason: e.to_string(),
                }));
            }
        }
    }
    Ok(out)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
