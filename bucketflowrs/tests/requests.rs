//! Integration tests for serialized requests routed through a
//! `ConnectionManager`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bucketflow::error::Result;
use bucketflow::{
    run_request, AggregateRequest, BackendConnection, BucketRow, BucketflowConfig,
    BucketflowError, ConnectionManager, QueryResult,
};

/// Backend that counts executions and returns no rows.
struct CountingBackend {
    driver: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl BackendConnection for CountingBackend {
    fn driver_name(&self) -> &str {
        self.driver
    }

    async fn execute_sql(&self, _sql: &str) -> Result<QueryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(QueryResult::default())
    }
}

fn request(json: serde_json::Value) -> AggregateRequest {
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn unsupported_running_total_never_reaches_the_backend() {
    let backend = Arc::new(CountingBackend {
        driver: "pgsql",
        calls: AtomicUsize::new(0),
    });
    let mut manager = ConnectionManager::new();
    manager.insert("warehouse", backend.clone());

    let req = request(serde_json::json!({
        "datasource": "warehouse",
        "table": "orders",
        "interval": "day",
        "start": "2024-05-01T00:00:00",
        "end": "2024-05-03T00:00:00",
        "function": "cumulative",
        "column": "amount"
    }));
    let err = run_request(&manager, &req).await.unwrap_err();
    assert_eq!(err.to_string(), "PostgreSQL does not support cumulative");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

    let req = AggregateRequest {
        function: bucketflow::Operation::Sum,
        ..req
    };
    let series = run_request(&manager, &req).await.unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        series,
        vec![
            BucketRow::new("2024-05-01", Some(0.0)),
            BucketRow::new("2024-05-02", Some(0.0)),
            BucketRow::new("2024-05-03", Some(0.0)),
        ]
    );
}

#[tokio::test]
async fn missing_interval_without_default_fails() {
    let manager = {
        let mut m = ConnectionManager::new();
        m.insert(
            "app",
            Arc::new(CountingBackend {
                driver: "sqlite",
                calls: AtomicUsize::new(0),
            }),
        );
        m
    };
    let req = request(serde_json::json!({
        "datasource": "app",
        "table": "users",
        "start": "2024-05-01T00:00:00",
        "end": "2024-05-03T00:00:00",
        "function": "count"
    }));
    let err = run_request(&manager, &req).await.unwrap_err();
    assert!(matches!(err, BucketflowError::InvalidInterval(_)));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn configured_sqlite_datasource_runs_requests() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("metrics.db");
    {
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE readings (value REAL, recorded_at TEXT);
             INSERT INTO readings VALUES
                (1.5, '2024-02-03 10:00:00'),
                (2.5, '2024-02-17 12:30:00'),
                (4.0, '2024-04-01 00:00:00');",
        )
        .unwrap();
    }

    let toml = format!(
        r#"
[defaults.query]
date_column = "recorded_at"

[datasources.metrics.query]
bucket_alias = "month"
interval = "month"

[datasources.metrics.sqlite]
path = "{}"
max_concurrency = 2
"#,
        db.display()
    );
    let config = BucketflowConfig::from_toml(&toml).unwrap();
    let mut manager = ConnectionManager::with_config(config);
    assert_eq!(manager.connect_configured().unwrap(), vec!["metrics".to_string()]);

    let req = request(serde_json::json!({
        "datasource": "metrics",
        "table": "readings",
        "start": "2024-01-15T00:00:00",
        "end": "2024-04-15T00:00:00",
        "function": "sum",
        "column": "value"
    }));
    let series = run_request(&manager, &req).await.unwrap();
    assert_eq!(
        series,
        vec![
            BucketRow::new("2024-01", Some(0.0)),
            BucketRow::new("2024-02", Some(4.0)),
            BucketRow::new("2024-03", Some(0.0)),
            BucketRow::new("2024-04", Some(4.0)),
        ]
    );

    let yearly = AggregateRequest {
        interval: Some("year".to_string()),
        function: bucketflow::Operation::Max,
        ..req
    };
    let series = run_request(&manager, &yearly).await.unwrap();
    assert_eq!(series, vec![BucketRow::new("2024", Some(4.0))]);
}
