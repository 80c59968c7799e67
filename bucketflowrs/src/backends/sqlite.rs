//! SQLite backend implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::error::{BucketflowError, Result};
use crate::executor::{ColumnMeta, QueryResult};

use super::BackendConnection;

/// Where connections are opened from.
#[derive(Clone, Debug)]
enum Target {
    File(PathBuf),
    /// A single shared in-memory database; every checkout reuses it.
    Memory,
}

/// SQLite connection implementing the unified backend trait.
#[derive(Clone)]
pub struct SqliteConnection {
    target: Target,
    limiter: Arc<Semaphore>,
    pool: Arc<Mutex<Vec<rusqlite::Connection>>>,
}

impl SqliteConnection {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        tracing::info!(path = %path.display(), max_concurrency = 16, "creating SQLite connection");
        Self {
            target: Target::File(path),
            limiter: Arc::new(Semaphore::new(16)),
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Wrap an already-open connection, typically an in-memory database that
    /// has been seeded by the caller. Executions are serialized.
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        tracing::info!("creating SQLite connection from existing handle");
        Self {
            target: Target::Memory,
            limiter: Arc::new(Semaphore::new(1)),
            pool: Arc::new(Mutex::new(vec![conn])),
        }
    }

    /// Configure maximum concurrent executions; callers can tune based on hardware.
    pub fn with_max_concurrency(mut self, max_in_flight: usize) -> Self {
        if matches!(self.target, Target::Memory) {
            tracing::debug!("ignoring concurrency setting for a shared in-memory database");
            return self;
        }
        tracing::debug!(max_concurrency = max_in_flight, "configuring SQLite concurrency");
        self.limiter = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>> {
        let available = self.limiter.available_permits();
        if available == 0 {
            tracing::debug!("all SQLite slots in use, waiting for permit");
        }
        self.limiter
            .acquire()
            .await
            .map_err(|e| BucketflowError::Execution(format!("limiter closed: {e}")))
    }

    async fn checkout_connection(&self) -> Result<rusqlite::Connection> {
        let mut guard = self.pool.lock().await;
        if let Some(conn) = guard.pop() {
            let pool_size = guard.len();
            drop(guard);
            tracing::trace!(pool_remaining = pool_size, "reusing pooled SQLite connection");
            return Ok(conn);
        }
        drop(guard);
        match &self.target {
            Target::File(path) => {
                tracing::debug!(path = %path.display(), "opening new SQLite connection");
                rusqlite::Connection::open(path)
                    .map_err(|e| BucketflowError::Execution(format!("open sqlite: {e}")))
            }
            Target::Memory => Err(BucketflowError::Execution(
                "in-memory SQLite connection is not available".to_string(),
            )),
        }
    }
}

#[async_trait]
impl BackendConnection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    async fn execute_sql(&self, sql: &str) -> Result<QueryResult> {
        let sql = sql.to_string();
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let pool = self.pool.clone();
        let (result, conn) = tokio::task::spawn_blocking(
            move || -> (Result<QueryResult>, rusqlite::Connection) {
                let start = Instant::now();
                let result = run_query(&conn, &sql);
                if let Ok(res) = &result {
                    tracing::debug!(
                        rows = res.rows.len(),
                        columns = res.columns.len(),
                        ms = start.elapsed().as_millis(),
                        "sqlite execute_sql"
                    );
                }
                (result, conn)
            },
        )
        .await
        .map_err(|e| BucketflowError::Execution(format!("task join error: {e}")))?;

        {
            let mut guard = pool.lock().await;
            guard.push(conn);
        }
        result.map_err(|e| {
            tracing::error!(error = %e, "SQLite query execution failed");
            e
        })
    }
}

fn run_query(conn: &rusqlite::Connection, sql: &str) -> Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows_iter = stmt.query([])?;
    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut map = serde_json::Map::new();
        for (idx, name) in column_names.iter().enumerate() {
            let value: rusqlite::types::Value = row.get(idx)?;
            map.insert(name.clone(), crate::executor::sqlite_value_to_json(value));
        }
        rows.push(map);
    }

    let columns = column_names
        .into_iter()
        .map(|name| ColumnMeta { name })
        .collect();
    Ok(QueryResult { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn executes_against_existing_connection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (k TEXT, v INTEGER);
             INSERT INTO t VALUES ('a', 1), ('a', 2), ('b', 5);",
        )
        .unwrap();
        let backend = SqliteConnection::from_connection(conn);

        let result = backend
            .execute_sql("SELECT k, SUM(v) AS total FROM t GROUP BY k ORDER BY k")
            .await
            .unwrap();
        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0]["total"], serde_json::json!(3));

        // the connection is returned to the pool after each execution
        let again = backend.execute_sql("SELECT COUNT(*) AS n FROM t").await.unwrap();
        assert_eq!(again.rows[0]["n"], serde_json::json!(3));
    }

    #[tokio::test]
    async fn surfaces_driver_errors_unchanged() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let backend = SqliteConnection::from_connection(conn);
        let err = backend.execute_sql("SELECT * FROM missing").await.unwrap_err();
        assert!(matches!(err, BucketflowError::Sqlite(_)));

        // a failed statement still hands the connection back
        assert!(backend.execute_sql("SELECT 1 AS one").await.is_ok());
    }

    #[tokio::test]
    async fn opens_file_databases_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buckets.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (4);")
                .unwrap();
        }
        let backend = SqliteConnection::new(&path).with_max_concurrency(2);
        let result = backend.execute_sql("SELECT v FROM t").await.unwrap();
        assert_eq!(result.rows[0]["v"], serde_json::json!(4));
    }
}
