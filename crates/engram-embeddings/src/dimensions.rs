//! Dimension checks and normalization.

use engram_core::errors::{EmbeddingError, EngramResult};

/// Validate that an embedding has the expected dimensions.
///
/// # Errors
/// Returns `DimensionMismatch` if dimensions don't match.
pub fn validate_dimensions(embedding: &[f32], expected: usize) -> EngramResult<()> {
    if embedding.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        }
        .into());
    }
    Ok(())
}

/// Reject vectors containing NaN or infinity.
pub fn validate_finite(embedding: &[f32]) -> EngramResult<()> {
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::InvalidResponse {
            reason: "embedding contains non-finite values".to_string(),
        }
        .into());
    }
    Ok(())
}

/// L2-normalize in place. Zero vectors are left as they are.
pub fn l2_normalize(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in embedding.iter_mut() {
            *v /= norm;
        }
    }
}
