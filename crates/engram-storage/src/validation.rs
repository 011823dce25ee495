//! Write-time checks shared by both backends.

use std::collections::HashSet;

use engram_core::errors::{ConsistencyError, EngramError, EngramResult, StorageError};

/// Check a batch of `(id, vector)` rows about to be appended and return the
/// corpus dimension after the write.
///
/// Every row must be non-empty and finite, ids must be non-blank and unique
/// within the batch, and every row must agree with `stored` (the manifest's
/// dimension) or, when the corpus is still empty, with the first row.
pub fn check_rows<'a>(
    stored: Option<usize>,
    rows: impl IntoIterator<Item = (&'a str, &'a [f32])>,
) -> EngramResult<Option<usize>> {
    let mut dims = stored;
    let mut seen = HashSet::new();
    for (id, vector) in rows {
        if id.trim().is_empty() {
            return Err(malformed(id, "blank id"));
        }
        if !seen.insert(id) {
            return Err(EngramError::StorageError(StorageError::DuplicateRecord {
                id: id.to_string(),
            }));
        }
        if vector.is_empty() {
            return Err(malformed(id, "missing embedding"));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(malformed(id, "non-finite embedding component"));
        }
        match dims {
            Some(d) if d != vector.len() => {
                return Err(EngramError::ConsistencyError(
                    ConsistencyError::CorpusDimensionMismatch {
                        stored: d,
                        configured: vector.len(),
                    },
                ));
            }
            Some(_) => {}
            None => dims = Some(vector.len()),
        }
    }
    Ok(dims)
}

/// Check a full replacement vector array against the corpus dimension.
pub fn check_array(stored: Option<usize>, rows: &[Vec<f32>]) -> EngramResult<Option<usize>> {
    let ids: Vec<String> = (0..rows.len()).map(|i| format!("row-{i}")).collect();
    check_rows(
        stored,
        ids.iter().map(String::as_str).zip(rows.iter().map(Vec::as_slice)),
    )
}

fn malformed(id: &str, reason: &str) -> EngramError {
    EngramError::StorageError(StorageError::MalformedRecord {
        id: id.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::errors::ErrorClass;

    #[test]
    fn first_write_fixes_dimension() {
        let a = [1.0_f32, 0.0];
        let dims = check_rows(None, [("a", &a[..])]).unwrap();
        assert_eq!(dims, Some(2));
    }

    #[test]
    fn dimension_disagreement_is_fatal() {
        let a = [1.0_f32, 0.0, 0.0];
        let err = check_rows(Some(2), [("a", &a[..])]).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[test]
    fn empty_and_nan_rows_are_rejected_per_item() {
        let empty: [f32; 0] = [];
        let nan = [f32::NAN];
        assert_eq!(
            check_rows(None, [("a", &empty[..])]).unwrap_err().class(),
            ErrorClass::PermanentItem
        );
        assert_eq!(
            check_rows(None, [("a", &nan[..])]).unwrap_err().class(),
            ErrorClass::PermanentItem
        );
    }

    #[test]
    fn repeated_id_in_batch_is_rejected() {
        let a = [1.0_f32];
        assert!(check_rows(None, [("x", &a[..]), ("x", &a[..])]).is_err());
    }
}
