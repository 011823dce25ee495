mod authorization_error;
mod clustering_error;
mod consistency_error;
mod embedding_error;
mod engram_error;
mod ingestion_error;
mod retrieval_error;
mod storage_error;

pub use authorization_error::AuthorizationError;
pub use clustering_error::ClusteringError;
pub use consistency_error::ConsistencyError;
pub use embedding_error::EmbeddingError;
pub use engram_error::{EngramError, EngramResult, ErrorClass};
pub use ingestion_error::IngestionError;
pub use retrieval_error::RetrievalError;
pub use storage_error::StorageError;
