//! Time-series table client traits
//!
//! This module defines the boundary between the TSDB adapter and the
//! storage engine. The adapter only ever speaks to a [`TimeSeriesTable`]
//! obtained from a [`TimeSeriesClient`].

use std::sync::Arc;

use async_trait::async_trait;

use super::error::StorageResult;
use crate::entity::Tags;

/// A single scalar sample returned by a range query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub value: f64,
}

/// Entry point to a time-series storage engine
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across tasks
/// behind an `Arc`.
#[async_trait]
pub trait TimeSeriesClient: Send + Sync {
    /// Create a new table
    ///
    /// Must fail with [`StorageError::TableAlreadyExists`] when the table is
    /// already present so callers can fall back to [`Self::open_table`].
    ///
    /// [`StorageError::TableAlreadyExists`]: super::StorageError::TableAlreadyExists
    async fn create_table(&self, name: &str) -> StorageResult<Arc<dyn TimeSeriesTable>>;

    /// Open an existing table
    ///
    /// Fails with [`super::StorageError::TableNotFound`] if it does not exist.
    async fn open_table(&self, name: &str) -> StorageResult<Arc<dyn TimeSeriesTable>>;
}

/// Handle to one time-series table
///
/// ## Semantics
///
/// - **Buffered writes**: `write_metric` only stages a point, it becomes
///   visible to queries after a successful `flush`. A failed flush keeps the
///   staged points for the next attempt.
/// - **Series identity**: a point is keyed by (metric, tags, timestamp);
///   rewriting the same key replaces the value.
/// - **Range queries**: `[start, end]` is inclusive on both ends. A series
///   matches when its tags contain every pair of the filter. Results are
///   ordered by timestamp, ties are ordered by the series' canonical tag
///   encoding.
#[async_trait]
pub trait TimeSeriesTable: Send + Sync {
    fn name(&self) -> &str;

    /// Stage a single point for the series identified by `metric` and `tags`
    async fn write_metric(
        &self,
        metric: &str,
        tags: &Tags,
        timestamp: i64,
        value: f64,
    ) -> StorageResult<()>;

    /// Persist all staged points
    async fn flush(&self) -> StorageResult<()>;

    /// Fetch all flushed points of `metric` within `[start, end]` whose series
    /// carries every tag in `tags`
    async fn query_metrics(
        &self,
        start: i64,
        end: i64,
        metric: &str,
        tags: &Tags,
    ) -> StorageResult<Vec<DataPoint>>;

    /// Human-readable statistics about the table
    async fn describe(&self) -> StorageResult<String>;

    /// Flush staged points and release resources
    async fn close(&self) -> StorageResult<()>;
}
