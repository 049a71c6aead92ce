//! In-memory time-series table client (no persistence)
//!
//! Tables live in process memory behind tokio locks. It's useful for:
//! - Testing the adapter without database dependencies
//! - Short-lived tools that don't need durability
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost when the client is dropped
//! - **No retention**: Series grow without bound

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use super::backend::{DataPoint, TimeSeriesClient, TimeSeriesTable};
use super::error::{StorageError, StorageResult};
use super::schema::{PointRow, check_value, encode_tags, tags_match, validate_table_name};
use crate::entity::Tags;

/// In-memory table client
///
/// Table names are matched case-insensitively, the same as SQLite identifiers.
#[derive(Default)]
pub struct MemoryClient {
    tables: Mutex<HashMap<String, Arc<MemoryTable>>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TimeSeriesClient for MemoryClient {
    async fn create_table(&self, name: &str) -> StorageResult<Arc<dyn TimeSeriesTable>> {
        validate_table_name(name)?;

        let key = name.to_ascii_lowercase();
        let mut tables = self.tables.lock().await;
        if tables.contains_key(&key) {
            return Err(StorageError::TableAlreadyExists(name.to_string()));
        }

        debug!("creating in-memory table {}", name);
        let table = Arc::new(MemoryTable::new(name));
        tables.insert(key, table.clone());
        Ok(table as Arc<dyn TimeSeriesTable>)
    }

    async fn open_table(&self, name: &str) -> StorageResult<Arc<dyn TimeSeriesTable>> {
        let tables = self.tables.lock().await;
        tables
            .get(&name.to_ascii_lowercase())
            .map(|table| table.clone() as Arc<dyn TimeSeriesTable>)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }
}

struct Series {
    tags: Tags,
    points: BTreeMap<i64, f64>,
}

/// One in-memory table
///
/// Series are grouped by metric name, then keyed by their canonical tag
/// encoding so iteration order matches the documented tie-break order.
pub struct MemoryTable {
    name: String,
    pending: Mutex<Vec<PointRow>>,
    series: RwLock<HashMap<String, BTreeMap<String, Series>>>,
}

impl MemoryTable {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pending: Mutex::new(Vec::new()),
            series: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TimeSeriesTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write_metric(
        &self,
        metric: &str,
        tags: &Tags,
        timestamp: i64,
        value: f64,
    ) -> StorageResult<()> {
        check_value(metric, timestamp, value)?;
        trace!("staging {}@{} = {}", metric, timestamp, value);
        self.pending.lock().await.push(PointRow {
            metric: metric.to_string(),
            tags: tags.clone(),
            timestamp,
            value,
        });
        Ok(())
    }

    async fn flush(&self) -> StorageResult<()> {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return Ok(());
        }

        // Encode everything before touching the series so a failure leaves
        // the staged points intact.
        let keyed = pending
            .iter()
            .map(|row| encode_tags(&row.tags).map(|key| (key, row)))
            .collect::<StorageResult<Vec<_>>>()?;

        let mut series = self.series.write().await;
        for (key, row) in keyed {
            series
                .entry(row.metric.clone())
                .or_default()
                .entry(key)
                .or_insert_with(|| Series {
                    tags: row.tags.clone(),
                    points: BTreeMap::new(),
                })
                .points
                .insert(row.timestamp, row.value);
        }

        debug!("flushed {} points into {}", pending.len(), self.name);
        pending.clear();
        Ok(())
    }

    async fn query_metrics(
        &self,
        start: i64,
        end: i64,
        metric: &str,
        tags: &Tags,
    ) -> StorageResult<Vec<DataPoint>> {
        if start > end {
            return Ok(Vec::new());
        }

        let series = self.series.read().await;

        let mut points: Vec<DataPoint> = series
            .get(metric)
            .map(|by_tags| {
                by_tags
                    .values()
                    .filter(|s| tags_match(&s.tags, tags))
                    .flat_map(|s| s.points.range(start..=end))
                    .map(|(&timestamp, &value)| DataPoint { timestamp, value })
                    .collect()
            })
            .unwrap_or_default();

        // stable, keeps series order for equal timestamps
        points.sort_by_key(|p| p.timestamp);

        debug!("query on {} for {} returned {} points", self.name, metric, points.len());
        Ok(points)
    }

    async fn describe(&self) -> StorageResult<String> {
        // same lock order as flush: pending before series
        let pending = self.pending.lock().await.len();
        let series = self.series.read().await;
        let series_count: usize = series.values().map(BTreeMap::len).sum();
        let point_count: usize = series
            .values()
            .flat_map(BTreeMap::values)
            .map(|s| s.points.len())
            .sum();

        Ok(format!(
            "In-Memory table {}: {} points across {} series, {} pending",
            self.name, point_count, series_count, pending
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory table {}", self.name);
        self.flush().await
    }
}
