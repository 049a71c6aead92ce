//! SQLite time-series table client
//!
//! This module provides a SQLite-based implementation of the
//! `TimeSeriesClient` and `TimeSeriesTable` traits.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Efficient resource usage
//! - **Buffered writes**: Points are staged in memory and written in one
//!   transaction per flush
//!
//! ## Layout
//!
//! Every logical table maps to one SQL table:
//!
//! ```sql
//! CREATE TABLE "<name>" (
//!     metric    TEXT    NOT NULL,
//!     tags      TEXT    NOT NULL,  -- canonical JSON, key-sorted
//!     timestamp INTEGER NOT NULL,  -- epoch milliseconds
//!     value     REAL    NOT NULL,
//!     PRIMARY KEY (metric, tags, timestamp)
//! )
//! ```
//!
//! Tag filters are applied after the (metric, timestamp) index scan, which is
//! fine for the handful of series per metric this is meant for.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::backend::{DataPoint, TimeSeriesClient, TimeSeriesTable};
use super::error::{StorageError, StorageResult};
use super::schema::{
    PointRow, check_value, decode_tags, encode_tags, tags_match, validate_table_name,
};
use crate::entity::Tags;

/// SQLite table client
///
/// Owns the connection pool shared by every table it hands out.
pub struct SqliteClient {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteClient {
    /// Open (or create) the SQLite database at `db_path`
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use tsdb_table_adapter::storage::sqlite::SqliteClient;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = SqliteClient::new("./tsdb.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite client at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!("SQLite connection pool created");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// SQLite identifiers are case-insensitive, so the lookup is too
    async fn table_exists(&self, name: &str) -> StorageResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(row.0 > 0)
    }

    fn table(&self, name: &str) -> Arc<dyn TimeSeriesTable> {
        Arc::new(SqliteTable {
            pool: self.pool.clone(),
            name: name.to_string(),
            db_path: self.db_path.clone(),
            pending: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TimeSeriesClient for SqliteClient {
    #[instrument(skip(self))]
    async fn create_table(&self, name: &str) -> StorageResult<Arc<dyn TimeSeriesTable>> {
        validate_table_name(name)?;

        if self.table_exists(name).await? {
            return Err(StorageError::TableAlreadyExists(name.to_string()));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE "{name}" (
                metric TEXT NOT NULL,
                tags TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (metric, tags, timestamp)
            )
            "#
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            // lost a race against another creator
            sqlx::Error::Database(db) if db.message().contains("already exists") => {
                StorageError::TableAlreadyExists(name.to_string())
            }
            other => StorageError::BackendError(other.to_string()),
        })?;

        sqlx::query(&format!(
            r#"CREATE INDEX "idx_{name}_metric_timestamp" ON "{name}" (metric, timestamp)"#
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::BackendError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        info!("created table {}", name);
        Ok(self.table(name))
    }

    #[instrument(skip(self))]
    async fn open_table(&self, name: &str) -> StorageResult<Arc<dyn TimeSeriesTable>> {
        validate_table_name(name)?;

        if !self.table_exists(name).await? {
            return Err(StorageError::TableNotFound(name.to_string()));
        }

        debug!("opened existing table {}", name);
        Ok(self.table(name))
    }
}

/// One SQLite-backed table
pub struct SqliteTable {
    pool: Pool<Sqlite>,
    name: String,
    db_path: String,
    pending: Mutex<Vec<PointRow>>,
}

impl SqliteTable {
    /// Helper to format epoch milliseconds for stats output
    fn format_millis(millis: i64) -> String {
        DateTime::from_timestamp_millis(millis)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| millis.to_string())
    }
}

#[async_trait]
impl TimeSeriesTable for SqliteTable {
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
        self.pending.lock().await.push(PointRow {
            metric: metric.to_string(),
            tags: tags.clone(),
            timestamp,
            value,
        });
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.name))]
    async fn flush(&self) -> StorageResult<()> {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return Ok(());
        }

        debug!("flushing {} points into SQLite", pending.len());

        // Use a transaction for atomicity and performance
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        let sql = format!(
            r#"
            INSERT INTO "{}" (metric, tags, timestamp, value)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (metric, tags, timestamp) DO UPDATE SET
                value = excluded.value
            "#,
            self.name
        );

        for row in pending.iter() {
            let tags = encode_tags(&row.tags)?;

            sqlx::query(&sql)
                .bind(&row.metric)
                .bind(tags)
                .bind(row.timestamp)
                .bind(row.value)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        pending.clear();
        debug!("flush complete");
        Ok(())
    }

    #[instrument(skip(self, tags), fields(table = %self.name))]
    async fn query_metrics(
        &self,
        start: i64,
        end: i64,
        metric: &str,
        tags: &Tags,
    ) -> StorageResult<Vec<DataPoint>> {
        let sql = format!(
            r#"
            SELECT tags, timestamp, value
            FROM "{}"
            WHERE metric = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC, tags ASC
            "#,
            self.name
        );

        let rows = sqlx::query(&sql)
            .bind(metric)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            let series_tags = decode_tags(row.get::<&str, _>("tags"))?;
            if tags_match(&series_tags, tags) {
                points.push(DataPoint {
                    timestamp: row.get("timestamp"),
                    value: row.get("value"),
                });
            }
        }

        debug!("query returned {} points", points.len());
        Ok(points)
    }

    #[instrument(skip(self))]
    async fn describe(&self) -> StorageResult<String> {
        let (total_rows, series, oldest, newest): (i64, i64, Option<i64>, Option<i64>) =
            sqlx::query_as(&format!(
                r#"
                SELECT COUNT(*), COUNT(DISTINCT metric || tags), MIN(timestamp), MAX(timestamp)
                FROM "{}"
                "#,
                self.name
            ))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        let file_size_mb = file_size as f64 / 1_000_000.0;

        let time_range = match (oldest, newest) {
            (Some(old), Some(new)) => format!(
                "{} to {}",
                Self::format_millis(old),
                Self::format_millis(new)
            ),
            _ => "no data".to_string(),
        };

        let pending = self.pending.lock().await.len();

        Ok(format!(
            "SQLite table {}: {} rows across {} series, {} pending, {:.2} MB on disk, time range: {}",
            self.name, total_rows, series, pending, file_size_mb, time_range
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite table {}", self.name);
        self.flush().await?;
        self.pool.close().await;
        Ok(())
    }
}
