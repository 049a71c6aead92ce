//! TSDB service interface and its table-backed implementation
//!
//! [`TsdbService`] is what callers program against. [`TableTsdbService`]
//! implements it on top of a [`crate::storage::TimeSeriesTable`].

pub mod error;
pub mod table_service;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::entity::{Annotation, AnnotationQuery, Metric, MetricQuery};

pub use error::{TsdbError, TsdbResult};
pub use table_service::{FlushStatus, TableOptions, TableTsdbService, WriteReport};

/// Write and read access to a time-series database
///
/// Batches are processed in order. The first failing item aborts the rest
/// of the batch and is reported to the caller.
#[async_trait]
pub trait TsdbService: Send + Sync {
    /// Write all datapoints of `metrics`, then flush
    async fn put_metrics(&self, metrics: &[Metric]) -> TsdbResult<WriteReport>;

    /// Run every query, mapping each one to the metrics it produced
    async fn get_metrics(
        &self,
        queries: &[MetricQuery],
    ) -> TsdbResult<HashMap<MetricQuery, Vec<Metric>>>;

    async fn put_annotations(&self, annotations: &[Annotation]) -> TsdbResult<()>;

    async fn get_annotations(&self, queries: &[AnnotationQuery]) -> TsdbResult<Vec<Annotation>>;

    /// Map a scope and optional namespace onto a storage metric name
    fn construct_tsdb_metric_name(&self, scope: &str, namespace: Option<&str>)
    -> TsdbResult<String>;

    fn get_scope_from_tsdb_metric(&self, tsdb_metric_name: &str) -> TsdbResult<String>;

    fn get_namespace_from_tsdb_metric(&self, tsdb_metric_name: &str) -> TsdbResult<String>;

    /// Release the underlying storage, flushing anything still staged
    async fn dispose(&self) -> TsdbResult<()>;
}
