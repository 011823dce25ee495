/// Disagreements between the corpus and something derived from it.
#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    #[error("fingerprint {fingerprint} references missing node {node_id}")]
    DanglingFingerprint { fingerprint: String, node_id: String },

    #[error("{kind} record {index} has no vector row ({rows} rows stored)")]
    VectorRowMissing {
        kind: String,
        index: usize,
        rows: usize,
    },

    #[error("index {index} covers {indexed} records but the corpus has {corpus}")]
    IndexOutOfSync {
        index: String,
        indexed: usize,
        corpus: usize,
    },

    #[error("index {index} is unreadable: {reason}")]
    CorruptIndex { index: String, reason: String },

    #[error("corpus dimension {stored} disagrees with configured dimension {configured}")]
    CorpusDimensionMismatch { stored: usize, configured: usize },
}
