//! Span definitions per operation: retrieval, ingestion, flush, embedding, recluster, storage.

/// Create a retrieval span.
#[macro_export]
macro_rules! retrieval_span {
    ($mode:expr, $top_k:expr) => {
        tracing::info_span!("engram.retrieval", mode = ?$mode, top_k = $top_k)
    };
}

/// Create an ingestion span for one item.
#[macro_export]
macro_rules! ingestion_span {
    ($node_id:expr) => {
        tracing::debug_span!("engram.ingestion", node_id = %$node_id)
    };
}

/// Create a flush span.
#[macro_export]
macro_rules! flush_span {
    ($buffered:expr) => {
        tracing::info_span!("engram.ingestion.flush", buffered = $buffered)
    };
}

/// Create an embedding span.
#[macro_export]
macro_rules! embedding_span {
    ($provider:expr, $batch:expr) => {
        tracing::debug_span!("engram.embedding", provider = %$provider, batch = $batch)
    };
}

/// Create a recluster span.
#[macro_export]
macro_rules! recluster_span {
    ($corpus_size:expr) => {
        tracing::info_span!("engram.recluster", corpus_size = $corpus_size)
    };
}

/// Create a storage span.
#[macro_export]
macro_rules! storage_span {
    ($backend:expr, $op:expr) => {
        tracing::debug_span!("engram.storage", backend = %$backend, op = %$op)
    };
}

/// Span names as constants for programmatic use.
pub mod names {
    pub const RETRIEVAL: &str = "engram.retrieval";
    pub const INGESTION: &str = "engram.ingestion";
    pub const FLUSH: &str = "engram.ingestion.flush";
    pub const EMBEDDING: &str = "engram.embedding";
    pub const RECLUSTER: &str = "engram.recluster";
    pub const STORAGE: &str = "engram.storage";
}
