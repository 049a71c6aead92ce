//! Error types for time-series table operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to a time-series table client
#[derive(Debug)]
pub enum StorageError {
    /// A table with this name already exists
    TableAlreadyExists(String),

    /// No table with this name exists
    TableNotFound(String),

    /// Connection to the storage backend failed
    ConnectionFailed(String),

    /// A range query failed
    QueryFailed(String),

    /// Writing or flushing datapoints failed
    WriteFailed(String),

    /// Invalid configuration (bad table name, missing feature, ...)
    InvalidConfig(String),

    /// Tag serialization/deserialization error
    SerializationError(String),

    /// Backend-specific error
    BackendError(String),

    /// I/O error (file access, etc.)
    IoError(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::TableAlreadyExists(name) => write!(f, "table already exists: {}", name),
            StorageError::TableNotFound(name) => write!(f, "table not found: {}", name),
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to storage backend: {}", msg)
            }
            StorageError::QueryFailed(msg) => write!(f, "storage query failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "storage write failed: {}", msg),
            StorageError::InvalidConfig(msg) => write!(f, "invalid storage configuration: {}", msg),
            StorageError::SerializationError(msg) => write!(f, "tag serialization error: {}", msg),
            StorageError::BackendError(msg) => write!(f, "storage backend error: {}", msg),
            StorageError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::IoError(io_err),
            sqlx::Error::PoolClosed => {
                StorageError::ConnectionFailed("connection pool closed".to_string())
            }
            _ => StorageError::BackendError(err.to_string()),
        }
    }
}
