/// Ingestion pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("malformed item: {reason}")]
    MalformedItem { reason: String },

    #[error("reasoning depth {depth} exceeds limit {limit}")]
    ReasoningTooDeep { depth: u32, limit: u32 },

    #[error("reasoning traces for {conversation_id} throttled")]
    Throttled { conversation_id: String },

    #[error("ingestion queue is full")]
    QueueFull,

    #[error("ingestion worker is not running")]
    WorkerStopped,
}
