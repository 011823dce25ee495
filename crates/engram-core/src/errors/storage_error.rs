/// Corpus store errors, for both backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    #[error("record already exists: {id}")]
    DuplicateRecord { id: String },

    #[error("lock poisoned: {resource}")]
    LockPoisoned { resource: String },

    #[error("corpus store unreachable: {reason}")]
    Unreachable { reason: String },
}
