/// Retrieval subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("query timed out after {timeout_ms}ms with no lane completed")]
    Timeout { timeout_ms: u64 },

    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("malformed directive `{directive}`: {reason}")]
    MalformedDirective { directive: String, reason: String },

    #[error("retrieval lane {lane} failed: {reason}")]
    LaneFailed { lane: String, reason: String },
}
