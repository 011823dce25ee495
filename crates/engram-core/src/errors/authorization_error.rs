/// Authorization scope errors. Fatal for the call, never for the process.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("authorization scope is required")]
    MissingScope,

    #[error("invalid authorization scope: {reason}")]
    InvalidScope { reason: String },

    #[error("record {id} is outside the caller's scope")]
    OutOfScope { id: String },
}
