//! Error taxonomy of the TSDB service

use std::fmt;

use crate::storage::StorageError;

/// Result type alias for TSDB service operations
pub type TsdbResult<T> = Result<T, TsdbError>;

/// Errors surfaced to callers of [`super::TsdbService`]
///
/// A write or query error aborts the rest of its batch. Points written
/// before the failure are not rolled back.
#[derive(Debug)]
pub enum TsdbError {
    /// The backing table could neither be created nor opened
    StorageUnavailable { table: String, source: StorageError },

    /// A datapoint could not be parsed or written
    WriteFailure {
        metric: String,
        timestamp: i64,
        reason: String,
        source: Option<StorageError>,
    },

    /// A range query failed
    QueryFailure { metric: String, source: StorageError },

    /// Flushing a write batch failed
    FlushFailure(StorageError),

    /// The operation is not supported by this service
    Unsupported { operation: &'static str },
}

impl fmt::Display for TsdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TsdbError::StorageUnavailable { table, source } => {
                write!(f, "storage table '{}' unavailable: {}", table, source)
            }
            TsdbError::WriteFailure {
                metric,
                timestamp,
                reason,
                ..
            } => write!(
                f,
                "failed to write datapoint {}@{}: {}",
                metric, timestamp, reason
            ),
            TsdbError::QueryFailure { metric, source } => {
                write!(f, "failed to query metric {}: {}", metric, source)
            }
            TsdbError::FlushFailure(source) => write!(f, "failed to flush writes: {}", source),
            TsdbError::Unsupported { operation } => {
                write!(f, "operation not supported: {}", operation)
            }
        }
    }
}

impl std::error::Error for TsdbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TsdbError::StorageUnavailable { source, .. }
            | TsdbError::QueryFailure { source, .. }
            | TsdbError::FlushFailure(source) => Some(source),
            TsdbError::WriteFailure { source, .. } => {
                source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
            }
            TsdbError::Unsupported { .. } => None,
        }
    }
}
