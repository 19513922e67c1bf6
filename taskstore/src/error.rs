use thiserror::Error;

/// Errors surfaced by the [`Store`](crate::Store).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("failed to acquire store lock: {0}")]
    LockFailed(String),

    #[error("corrupt log entry in collection {collection} at line {line}: {reason}")]
    Corrupt {
        collection: String,
        line: usize,
        reason: String,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
