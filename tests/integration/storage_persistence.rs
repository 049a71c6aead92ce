//! Integration tests for the adapter over the SQLite table client
//!
//! These tests verify that:
//! - Metrics written through the adapter are persisted
//! - A second service opens the existing table instead of failing
//! - Data survives closing and reopening the database
//! - Colliding series resolve the same way as in memory
//! - Non-finite values abort the batch without blocking later flushes
//! - Table names match regardless of case

use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tsdb_table_adapter::config::StorageConfig;
use tsdb_table_adapter::storage;
use tsdb_table_adapter::storage::{StorageError, TimeSeriesClient};
use tsdb_table_adapter::storage::sqlite::SqliteClient;
use tsdb_table_adapter::{
    Metric, MetricQuery, TableOptions, TableTsdbService, TsdbError, TsdbService,
};

async fn sqlite_service(dir: &tempfile::TempDir) -> TableTsdbService {
    let client = SqliteClient::new(dir.path().join("tsdb.db")).await.unwrap();
    TableTsdbService::open(Arc::new(client), TableOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_roundtrip_through_sqlite() {
    let temp_dir = tempdir().unwrap();
    let client = SqliteClient::new(temp_dir.path().join("tsdb.db"))
        .await
        .unwrap();
    let service = TableTsdbService::open(Arc::new(client), TableOptions::default())
        .await
        .unwrap();

    let metric = Metric::new("sys", "cpu")
        .with_tag("host", "a")
        .with_units("%")
        .with_datapoint(100, "1.5")
        .with_datapoint(200, "2.0")
        .with_datapoint(300, "7.25");
    let report = service.put_metrics(&[metric]).await.unwrap();
    assert!(report.is_flushed());

    let query = MetricQuery::new("sys", "cpu", 100, 200).with_tag("host", "a");
    let result = service.get_metrics(&[query.clone()]).await.unwrap();

    let datapoints: Vec<(i64, String)> = result[&query][0]
        .datapoints
        .iter()
        .map(|(ts, v)| (*ts, v.clone()))
        .collect();
    assert_eq!(
        datapoints,
        vec![(100, "1.5".to_string()), (200, "2.0".to_string())]
    );
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let temp_dir = tempdir().unwrap();
    let config = StorageConfig::Sqlite {
        path: temp_dir.path().join("tsdb.db"),
    };

    {
        let client = storage::connect(&config).await.unwrap();
        let service = TableTsdbService::open(client, TableOptions::default())
            .await
            .unwrap();
        service
            .put_metrics(&[Metric::new("sys", "mem").with_datapoint(1_000, "512")])
            .await
            .unwrap();
        service.dispose().await.unwrap();
    }

    // The table exists now, so creation falls back to opening it
    let client = storage::connect(&config).await.unwrap();
    let service = TableTsdbService::open(client, TableOptions::default())
        .await
        .unwrap();

    let query = MetricQuery::new("sys", "mem", 0, 2_000);
    let result = service.get_metrics(&[query.clone()]).await.unwrap();
    assert_eq!(
        result[&query][0].datapoints.get(&1_000).map(String::as_str),
        Some("512.0")
    );

    let stats = service.describe().await.unwrap();
    assert!(stats.contains("1 rows"));
}

#[tokio::test]
async fn test_colliding_series_keep_last_in_tag_order() {
    let temp_dir = tempdir().unwrap();
    let service = sqlite_service(&temp_dir).await;

    service
        .put_metrics(&[
            Metric::new("sys", "cpu")
                .with_tag("dc", "west")
                .with_tag("host", "b")
                .with_datapoint(100, "2")
                .with_datapoint(200, "5"),
            Metric::new("sys", "cpu")
                .with_tag("dc", "west")
                .with_tag("host", "a")
                .with_datapoint(100, "1"),
        ])
        .await
        .unwrap();

    let query = MetricQuery::new("sys", "cpu", 0, 1000).with_tag("dc", "west");
    let result = service.get_metrics(&[query.clone()]).await.unwrap();

    assert_eq!(
        result[&query][0]
            .datapoints
            .iter()
            .map(|(ts, v)| (*ts, v.as_str()))
            .collect::<Vec<_>>(),
        vec![(100, "2.0"), (200, "5.0")]
    );
}

#[tokio::test]
async fn test_nan_value_does_not_block_later_batches() {
    let temp_dir = tempdir().unwrap();
    let service = sqlite_service(&temp_dir).await;

    let result = service
        .put_metrics(&[Metric::new("sys", "cpu").with_datapoint(100, "NaN")])
        .await;
    assert_matches!(
        result,
        Err(TsdbError::WriteFailure {
            timestamp: 100,
            source: Some(StorageError::WriteFailed(_)),
            ..
        })
    );

    let report = service
        .put_metrics(&[Metric::new("sys", "mem").with_datapoint(100, "1.5")])
        .await
        .unwrap();
    assert!(report.is_flushed());

    let query = MetricQuery::new("sys", "mem", 0, 1000);
    let result = service.get_metrics(&[query.clone()]).await.unwrap();
    assert_eq!(
        result[&query][0].datapoints.get(&100).map(String::as_str),
        Some("1.5")
    );
}

#[tokio::test]
async fn test_table_name_case_falls_back_to_open() {
    let temp_dir = tempdir().unwrap();
    let client: Arc<dyn TimeSeriesClient> =
        Arc::new(SqliteClient::new(temp_dir.path().join("tsdb.db")).await.unwrap());

    let lower = TableTsdbService::open(client.clone(), TableOptions::default())
        .await
        .unwrap();
    lower
        .put_metrics(&[Metric::new("sys", "cpu").with_datapoint(100, "3")])
        .await
        .unwrap();

    let options = TableOptions {
        table: "Argus".to_string(),
        ..Default::default()
    };
    let upper = TableTsdbService::open(client, options).await.unwrap();

    let query = MetricQuery::new("sys", "cpu", 0, 1000);
    let result = upper.get_metrics(&[query.clone()]).await.unwrap();
    assert_eq!(result[&query][0].datapoints.len(), 1);
}
