//! TSDB service backed by a single time-series table
//!
//! ## Write path
//!
//! Every metric is written under the qualified name `scope.metric` with its
//! tags sorted by key. Non-empty display names and units travel as the
//! reserved `DISPLAY_NAME` / `UNITS` tags. Each datapoint value is parsed as
//! a float and written on its own, then the table is flushed once for the
//! whole batch.
//!
//! ## Read path
//!
//! Each query becomes one range query with the same name and tag
//! normalization. The returned points are turned back into a [`Metric`]
//! carrying the query's scope, metric and tags.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, trace, warn};

use super::TsdbService;
use super::error::{TsdbError, TsdbResult};
use crate::entity::{
    Annotation, AnnotationQuery, Metric, MetricQuery, ReservedField, Tags,
};
use crate::storage::{StorageError, TimeSeriesClient, TimeSeriesTable};

/// Settings injected into [`TableTsdbService::open`]
#[derive(Debug, Clone, PartialEq)]
pub struct TableOptions {
    /// Table to create or open
    pub table: String,

    /// Return [`TsdbError::FlushFailure`] when the post-batch flush fails
    /// instead of only reporting it in the [`WriteReport`]
    pub strict_flush: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            table: String::from("argus"),
            strict_flush: false,
        }
    }
}

/// Outcome of the flush issued after a write batch
#[derive(Debug, Default)]
pub enum FlushStatus {
    #[default]
    Flushed,
    Failed(StorageError),
}

/// Summary of a completed write batch
#[derive(Debug, Default)]
pub struct WriteReport {
    pub metrics: usize,
    pub datapoints: usize,
    pub flush: FlushStatus,
}

impl WriteReport {
    pub fn is_flushed(&self) -> bool {
        matches!(self.flush, FlushStatus::Flushed)
    }

    /// Turn a failed flush into an error
    pub fn into_result(self) -> TsdbResult<WriteReport> {
        let WriteReport {
            metrics,
            datapoints,
            flush,
        } = self;

        match flush {
            FlushStatus::Flushed => Ok(WriteReport {
                metrics,
                datapoints,
                flush: FlushStatus::Flushed,
            }),
            FlushStatus::Failed(source) => Err(TsdbError::FlushFailure(source)),
        }
    }
}

/// `scope.metric`, the name a metric is stored under
pub fn qualified_name(scope: &str, metric: &str) -> String {
    format!("{scope}.{metric}")
}

/// Sorted tags of `metric` plus its reserved display name and units tags
pub fn storage_tags(metric: &Metric) -> Tags {
    let mut tags = metric.sorted_tags();

    let reserved = [
        (ReservedField::DisplayName, metric.display_name.as_deref()),
        (ReservedField::Units, metric.units.as_deref()),
    ];
    for (field, value) in reserved {
        if let Some(value) = value.filter(|v| !v.is_empty())
            && let Some(previous) = tags.insert(field.tag_key().to_string(), value.to_string())
        {
            trace!("reserved tag {} overrides user value {}", field, previous);
        }
    }

    tags
}

/// Render a stored value so that it parses back to the same float
///
/// Integral values keep a fractional part (`2.0`, not `2`). Non-finite values
/// use the `NaN` / `Infinity` spelling.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{value:?}")
    }
}

/// TSDB service that maps metrics onto one time-series table
pub struct TableTsdbService {
    table: Arc<dyn TimeSeriesTable>,
    options: TableOptions,
}

impl fmt::Debug for TableTsdbService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableTsdbService")
            .field("table", &self.table.name())
            .field("options", &self.options)
            .finish()
    }
}

impl TableTsdbService {
    /// Create the configured table, or open it if it already exists
    ///
    /// Any other creation error, or a failure to open the existing table,
    /// is returned as [`TsdbError::StorageUnavailable`].
    #[instrument(skip(client), fields(table = %options.table))]
    pub async fn open(
        client: Arc<dyn TimeSeriesClient>,
        options: TableOptions,
    ) -> TsdbResult<Self> {
        let unavailable = |source: StorageError| TsdbError::StorageUnavailable {
            table: options.table.clone(),
            source,
        };

        let table = match client.create_table(&options.table).await {
            Ok(table) => {
                info!("created table {}", options.table);
                table
            }
            Err(StorageError::TableAlreadyExists(_)) => {
                debug!("table {} already exists, opening it", options.table);
                client
                    .open_table(&options.table)
                    .await
                    .map_err(unavailable)?
            }
            Err(e) => return Err(unavailable(e)),
        };

        Ok(Self { table, options })
    }

    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    /// Human-readable statistics of the backing table
    pub async fn describe(&self) -> TsdbResult<String> {
        self.table
            .describe()
            .await
            .map_err(|source| TsdbError::StorageUnavailable {
                table: self.options.table.clone(),
                source,
            })
    }

    async fn write_metric(&self, metric: &Metric) -> TsdbResult<usize> {
        let name = qualified_name(&metric.scope, &metric.metric);
        let tags = storage_tags(metric);
        debug!("writing metric {} as {}", metric, name);

        for (&timestamp, raw) in &metric.datapoints {
            let value: f64 = raw
                .trim()
                .parse()
                .map_err(|e| TsdbError::WriteFailure {
                    metric: name.clone(),
                    timestamp,
                    reason: format!("invalid datapoint value '{}': {}", raw, e),
                    source: None,
                })?;

            trace!("writing {}@{} = {}", name, timestamp, value);
            self.table
                .write_metric(&name, &tags, timestamp, value)
                .await
                .map_err(|source| TsdbError::WriteFailure {
                    metric: name.clone(),
                    timestamp,
                    reason: "storage rejected datapoint".to_string(),
                    source: Some(source),
                })?;
        }

        Ok(metric.datapoints.len())
    }

    async fn query_metric(&self, query: &MetricQuery) -> TsdbResult<Metric> {
        let name = qualified_name(&query.scope, &query.metric);
        debug!("running query {} against {}", query, name);

        let points = self
            .table
            .query_metrics(
                query.start_timestamp,
                query.end_timestamp,
                &name,
                &query.tags,
            )
            .await
            .map_err(|source| TsdbError::QueryFailure {
                metric: name.clone(),
                source,
            })?;

        let mut metric = Metric::new(&query.scope, &query.metric);
        metric.tags = query
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        // later points win on equal timestamps
        metric.add_datapoints(
            points
                .into_iter()
                .map(|point| (point.timestamp, format_value(point.value))),
        );

        trace!("query {} produced {}", query, metric);
        Ok(metric)
    }
}

#[async_trait]
impl TsdbService for TableTsdbService {
    #[instrument(skip(self, metrics), fields(count = metrics.len()))]
    async fn put_metrics(&self, metrics: &[Metric]) -> TsdbResult<WriteReport> {
        let mut report = WriteReport::default();

        for metric in metrics {
            report.datapoints += self.write_metric(metric).await?;
            report.metrics += 1;
        }

        report.flush = match self.table.flush().await {
            Ok(()) => FlushStatus::Flushed,
            Err(e) => {
                warn!("flush of {} failed: {}", self.table.name(), e);
                FlushStatus::Failed(e)
            }
        };

        debug!(
            "wrote {} datapoints across {} metrics",
            report.datapoints, report.metrics
        );

        if self.options.strict_flush {
            report.into_result()
        } else {
            Ok(report)
        }
    }

    #[instrument(skip(self, queries), fields(count = queries.len()))]
    async fn get_metrics(
        &self,
        queries: &[MetricQuery],
    ) -> TsdbResult<HashMap<MetricQuery, Vec<Metric>>> {
        let mut result = HashMap::with_capacity(queries.len());

        for query in queries {
            let metric = self.query_metric(query).await?;
            result.insert(query.clone(), vec![metric]);
        }

        debug!("returning result size {}", result.len());
        Ok(result)
    }

    async fn put_annotations(&self, _annotations: &[Annotation]) -> TsdbResult<()> {
        Err(TsdbError::Unsupported {
            operation: "put_annotations",
        })
    }

    async fn get_annotations(&self, _queries: &[AnnotationQuery]) -> TsdbResult<Vec<Annotation>> {
        Err(TsdbError::Unsupported {
            operation: "get_annotations",
        })
    }

    fn construct_tsdb_metric_name(
        &self,
        _scope: &str,
        _namespace: Option<&str>,
    ) -> TsdbResult<String> {
        Err(TsdbError::Unsupported {
            operation: "construct_tsdb_metric_name",
        })
    }

    fn get_scope_from_tsdb_metric(&self, _tsdb_metric_name: &str) -> TsdbResult<String> {
        Err(TsdbError::Unsupported {
            operation: "get_scope_from_tsdb_metric",
        })
    }

    fn get_namespace_from_tsdb_metric(&self, _tsdb_metric_name: &str) -> TsdbResult<String> {
        Err(TsdbError::Unsupported {
            operation: "get_namespace_from_tsdb_metric",
        })
    }

    async fn dispose(&self) -> TsdbResult<()> {
        info!("disposing table {}", self.table.name());
        self.table
            .close()
            .await
            .map_err(|source| TsdbError::StorageUnavailable {
                table: self.options.table.clone(),
                source,
            })
    }
}
