/// Clustering subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum ClusteringError {
    #[error("batch training failed: {reason}")]
    TrainingFailed { reason: String },

    #[error("cluster model expects {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
