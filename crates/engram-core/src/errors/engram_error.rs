use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    AuthorizationError, ClusteringError, ConsistencyError, EmbeddingError, IngestionError,
    RetrievalError, StorageError,
};

/// Convenience alias used across the workspace.
pub type EngramResult<T> = Result<T, EngramError>;

/// How the caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Retry later; the item must not be lost.
    Transient,
    /// Reject this one item, keep processing the rest.
    PermanentItem,
    /// A derived index disagrees with the corpus; rebuild it from the corpus.
    Consistency,
    /// Missing or invalid scope; empty result or rejected write for this call.
    Authorization,
    /// Stop ingestion and refuse to serve.
    Fatal,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::PermanentItem => "permanent_item",
            Self::Consistency => "consistency",
            Self::Authorization => "authorization",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error for the Engram workspace.
#[derive(Debug, thiserror::Error)]
pub enum EngramError {
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),

    #[error("clustering error: {0}")]
    ClusteringError(#[from] ClusteringError),

    #[error("retrieval error: {0}")]
    RetrievalError(#[from] RetrievalError),

    #[error("ingestion error: {0}")]
    IngestionError(#[from] IngestionError),

    #[error("authorization error: {0}")]
    AuthorizationError(#[from] AuthorizationError),

    #[error("consistency error: {0}")]
    ConsistencyError(#[from] ConsistencyError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("node not found: {id}")]
    NodeNotFound { id: String },

    #[error("episode not found: {id}")]
    EpisodeNotFound { id: String },

    #[error("engine halted: {reason}")]
    EngineHalted { reason: String },
}

impl EngramError {
    /// Map the error onto the recovery taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::StorageError(e) => match e {
                StorageError::MalformedRecord { .. } | StorageError::DuplicateRecord { .. } => {
                    ErrorClass::PermanentItem
                }
                StorageError::SqliteError { .. }
                | StorageError::Io { .. }
                | StorageError::MigrationFailed { .. }
                | StorageError::LockPoisoned { .. }
                | StorageError::Unreachable { .. } => ErrorClass::Fatal,
            },
            Self::EmbeddingError(e) => match e {
                EmbeddingError::RateLimited { .. }
                | EmbeddingError::Timeout { .. }
                | EmbeddingError::Network { .. }
                | EmbeddingError::TemporarilyUnavailable { .. }
                | EmbeddingError::CacheFailure { .. } => ErrorClass::Transient,
                EmbeddingError::Rejected { .. }
                | EmbeddingError::InvalidResponse { .. }
                | EmbeddingError::DimensionMismatch { .. }
                | EmbeddingError::EmptyInput => ErrorClass::PermanentItem,
                EmbeddingError::ProviderUnavailable { .. } => ErrorClass::Fatal,
            },
            Self::ClusteringError(e) => match e {
                ClusteringError::TrainingFailed { .. } => ErrorClass::Transient,
                ClusteringError::DimensionMismatch { .. } => ErrorClass::PermanentItem,
            },
            Self::RetrievalError(e) => match e {
                RetrievalError::Timeout { .. } | RetrievalError::LaneFailed { .. } => {
                    ErrorClass::Transient
                }
                RetrievalError::InvalidQuery { .. } | RetrievalError::MalformedDirective { .. } => {
                    ErrorClass::PermanentItem
                }
            },
            Self::IngestionError(e) => match e {
                IngestionError::MalformedItem { .. } | IngestionError::ReasoningTooDeep { .. } => {
                    ErrorClass::PermanentItem
                }
                IngestionError::Throttled { .. } | IngestionError::QueueFull => {
                    ErrorClass::Transient
                }
                IngestionError::WorkerStopped => ErrorClass::Fatal,
            },
            Self::AuthorizationError(_) => ErrorClass::Authorization,
            Self::ConsistencyError(e) => match e {
                ConsistencyError::CorpusDimensionMismatch { .. } => ErrorClass::Fatal,
                _ => ErrorClass::Consistency,
            },
            Self::SerializationError(_) | Self::NodeNotFound { .. } | Self::EpisodeNotFound { .. } => {
                ErrorClass::PermanentItem
            }
            Self::ConfigError(_) | Self::EngineHalted { .. } => ErrorClass::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}
