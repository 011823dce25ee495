/// Embedding subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("provider {provider} rate limited the request")]
    RateLimited { provider: String },

    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("network error talking to {provider}: {reason}")]
    Network { provider: String, reason: String },

    #[error("embedding temporarily unavailable after {attempts} attempts: {reason}")]
    TemporarilyUnavailable { attempts: u32, reason: String },

    #[error("provider {provider} rejected the input ({status}): {reason}")]
    Rejected {
        provider: String,
        status: u16,
        reason: String,
    },

    #[error("invalid provider response: {reason}")]
    InvalidResponse { reason: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("provider unavailable: {provider}")]
    ProviderUnavailable { provider: String },

    #[error("embedding cache failure: {reason}")]
    CacheFailure { reason: String },
}

impl EmbeddingError {
    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::Network { .. }
                | Self::TemporarilyUnavailable { .. }
        )
    }
}
