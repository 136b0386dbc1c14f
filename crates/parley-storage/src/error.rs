use thiserror::Error;

use parley_core::ParleyError;

/// Errors raised by the SQLite conversation store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Query(err.to_string())
    }
}

impl From<StorageError> for ParleyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => ParleyError::Io(e),
            other => ParleyError::Storage(other.to_string()),
        }
    }
}
