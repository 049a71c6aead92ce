//! Failure tests for the adapter
//!
//! These tests verify that:
//! - A failing datapoint write aborts the rest of the batch
//! - A failing query aborts the rest of the batch
//! - Table creation falls back to opening only when the table exists
//! - Flush failures are reported, and raised only in strict mode
//! - A failed close on dispose reports the table as unavailable

use std::sync::Arc;
use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tsdb_table_adapter::storage::StorageError;
use tsdb_table_adapter::tsdb::FlushStatus;
use tsdb_table_adapter::{
    Metric, MetricQuery, TableOptions, TableTsdbService, TsdbError, TsdbService,
};

use crate::helpers::*;

fn five_metrics() -> Vec<Metric> {
    (1..=5)
        .map(|i| {
            Metric::new("sys", format!("m{i}"))
                .with_datapoint(100, "1.0")
                .with_datapoint(200, "2.0")
        })
        .collect()
}

#[tokio::test]
async fn test_write_failure_aborts_remaining_metrics() {
    let table = RecordingTable {
        fail_writes_for: Some("sys.m3".to_string()),
        ..Default::default()
    };
    let client = ScriptedClient::new(table, CreateBehavior::Succeed, false);
    let table = client.table.clone();
    let service = TableTsdbService::open(Arc::new(client), TableOptions::default())
        .await
        .unwrap();

    let result = service.put_metrics(&five_metrics()).await;

    assert_matches!(
        result,
        Err(TsdbError::WriteFailure { metric, timestamp: 100, source: Some(StorageError::WriteFailed(_)), .. })
            if metric == "sys.m3"
    );
    assert_eq!(table.written_metrics(), vec!["sys.m1", "sys.m2"]);
    assert_eq!(table.writes.lock().unwrap().len(), 4);
    assert_eq!(table.flush_count(), 0, "aborted batch must not flush");
}

#[tokio::test]
async fn test_query_failure_aborts_remaining_queries() {
    let table = RecordingTable {
        fail_queries_for: Some("sys.m2".to_string()),
        ..Default::default()
    };
    let client = ScriptedClient::new(table, CreateBehavior::Succeed, false);
    let table = client.table.clone();
    let service = TableTsdbService::open(Arc::new(client), TableOptions::default())
        .await
        .unwrap();

    let queries: Vec<MetricQuery> = (1..=3)
        .map(|i| MetricQuery::new("sys", format!("m{i}"), 0, 1000))
        .collect();
    let result = service.get_metrics(&queries).await;

    assert_matches!(
        result,
        Err(TsdbError::QueryFailure { metric, source: StorageError::QueryFailed(_) }) if metric == "sys.m2"
    );
    assert_eq!(*table.queries.lock().unwrap(), vec!["sys.m1".to_string()]);
}

#[tokio::test]
async fn test_existing_table_is_opened() {
    let client = Arc::new(ScriptedClient::new(
        RecordingTable::default(),
        CreateBehavior::AlreadyExists,
        false,
    ));

    let service = TableTsdbService::open(client.clone(), TableOptions::default()).await;

    assert!(service.is_ok());
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.open_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_fallback_open_is_storage_unavailable() {
    let client = ScriptedClient::new(
        RecordingTable::default(),
        CreateBehavior::AlreadyExists,
        true,
    );

    let result = TableTsdbService::open(Arc::new(client), TableOptions::default()).await;

    assert_matches!(
        result,
        Err(TsdbError::StorageUnavailable { table, source: StorageError::TableNotFound(_) })
            if table == "argus"
    );
}

#[tokio::test]
async fn test_other_create_errors_do_not_fall_back() {
    let client = Arc::new(ScriptedClient::new(
        RecordingTable::default(),
        CreateBehavior::Fail,
        false,
    ));

    let result = TableTsdbService::open(client.clone(), TableOptions::default()).await;

    assert_matches!(
        result,
        Err(TsdbError::StorageUnavailable {
            source: StorageError::ConnectionFailed(_),
            ..
        })
    );
    assert_eq!(client.open_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_flush_failure_is_reported_not_raised() {
    let table = RecordingTable {
        fail_flush: true,
        ..Default::default()
    };
    let client = ScriptedClient::new(table, CreateBehavior::Succeed, false);
    let service = TableTsdbService::open(Arc::new(client), TableOptions::default())
        .await
        .unwrap();

    let report = service.put_metrics(&five_metrics()).await.unwrap();

    assert_eq!(report.metrics, 5);
    assert_eq!(report.datapoints, 10);
    assert!(!report.is_flushed());
    assert_matches!(report.flush, FlushStatus::Failed(StorageError::WriteFailed(_)));
}

#[tokio::test]
async fn test_flush_failure_into_result() {
    let table = RecordingTable {
        fail_flush: true,
        ..Default::default()
    };
    let client = ScriptedClient::new(table, CreateBehavior::Succeed, false);
    let service = TableTsdbService::open(Arc::new(client), TableOptions::default())
        .await
        .unwrap();

    let report = service.put_metrics(&five_metrics()).await.unwrap();
    assert_matches!(report.into_result(), Err(TsdbError::FlushFailure(_)));
}

#[tokio::test]
async fn test_strict_flush_raises() {
    let table = RecordingTable {
        fail_flush: true,
        ..Default::default()
    };
    let client = ScriptedClient::new(table, CreateBehavior::Succeed, false);
    let options = TableOptions {
        strict_flush: true,
        ..Default::default()
    };
    let service = TableTsdbService::open(Arc::new(client), options)
        .await
        .unwrap();

    let result = service.put_metrics(&five_metrics()).await;
    assert_matches!(result, Err(TsdbError::FlushFailure(_)));
}

#[tokio::test]
async fn test_dispose_failure_is_storage_unavailable() {
    let table = RecordingTable {
        fail_flush: true,
        ..Default::default()
    };
    let client = ScriptedClient::new(table, CreateBehavior::Succeed, false);
    let service = TableTsdbService::open(Arc::new(client), TableOptions::default())
        .await
        .unwrap();

    let result = service.dispose().await;
    assert_matches!(
        result,
        Err(TsdbError::StorageUnavailable {
            table,
            source: StorageError::WriteFailed(_),
        }) if table == "argus"
    );
}
