//! PostgreSQL backend implementation.

use std::time::Instant;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde_json::{Map, Number, Value};
use tokio_postgres::types::{FromSqlOwned, Type};
use tokio_postgres::{NoTls, Row};

use crate::config::PostgresConfig;
use crate::error::{BucketflowError, Result};
use crate::executor::{ColumnMeta, QueryResult};

use super::BackendConnection;

pub struct PostgresConnection {
    pool: Pool,
}

impl PostgresConnection {
    /// Connect with default pool settings. Accepts key-value
    /// (`host=localhost dbname=app`) and URL (`postgresql://u@host/app`) forms.
    pub fn new(connection_string: &str) -> Result<Self> {
        Self::with_config(connection_string, &PostgresConfig::default())
    }

    pub fn with_config(connection_string: &str, settings: &PostgresConfig) -> Result<Self> {
        let client = client_config(connection_string, settings)?;
        let manager = Manager::from_config(
            client,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(settings.pool_size.max(1))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| BucketflowError::Config(format!("postgres pool: {e}")))?;

        tracing::info!(
            max_size = pool.status().max_size,
            statement_timeout_ms = settings.statement_timeout_ms,
            "PostgreSQL pool ready"
        );
        Ok(Self { pool })
    }
}

/// Parse the connection string and apply per-session settings.
fn client_config(
    connection_string: &str,
    settings: &PostgresConfig,
) -> Result<tokio_postgres::Config> {
    let mut config: tokio_postgres::Config = connection_string.parse()?;
    if settings.statement_timeout_ms > 0 {
        config.options(&format!("-c statement_timeout={}", settings.statement_timeout_ms));
    }
    Ok(config)
}

#[async_trait]
impl BackendConnection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "pgsql"
    }

    async fn execute_sql(&self, sql: &str) -> Result<QueryResult> {
        let started = Instant::now();
        let client = self.pool.get().await.inspect_err(|e| {
            let available = self.pool.status().available;
            tracing::error!(error = %e, available, "no PostgreSQL connection");
        })?;
        let rows = client.query(sql, &[]).await.inspect_err(|e| {
            tracing::error!(error = %e, "PostgreSQL bucket query failed");
        })?;

        let columns: Vec<ColumnMeta> = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnMeta {
                        name: col.name().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let rows: Vec<Map<String, Value>> = rows.iter().map(row_to_map).collect();

        tracing::debug!(
            rows = rows.len(),
            ms = started.elapsed().as_millis(),
            "postgres execute_sql"
        );
        Ok(QueryResult { columns, rows })
    }
}

fn row_to_map(row: &Row) -> Map<String, Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name().to_string(), cell_to_json(row, idx, col.type_())))
        .collect()
}

/// Bucket queries yield text keys and integer or double aggregates; anything
/// else is read as text.
fn cell_to_json(row: &Row, idx: usize, ty: &Type) -> Value {
    let value = match *ty {
        Type::INT2 => cell::<i16>(row, idx).map(Value::from),
        Type::INT4 => cell::<i32>(row, idx).map(Value::from),
        Type::INT8 => cell::<i64>(row, idx).map(Value::from),
        Type::FLOAT4 => cell::<f32>(row, idx)
            .and_then(|v| Number::from_f64(f64::from(v)))
            .map(Value::Number),
        Type::FLOAT8 => cell::<f64>(row, idx).and_then(Number::from_f64).map(Value::Number),
        _ => cell::<String>(row, idx).map(Value::String),
    };
    value.unwrap_or(Value::Null)
}

fn cell<T: FromSqlOwned>(row: &Row, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_connection_string_forms() {
        let settings = PostgresConfig::default();
        let kv = client_config("host=db.internal port=5433 user=app dbname=metrics", &settings)
            .unwrap();
        assert_eq!(kv.get_ports(), &[5433]);
        assert_eq!(kv.get_dbname(), Some("metrics"));

        let url = client_config("postgresql://app@db.internal/metrics", &settings).unwrap();
        assert_eq!(url.get_user(), Some("app"));
        assert_eq!(url.get_dbname(), Some("metrics"));
    }

    #[test]
    fn statement_timeout_becomes_a_session_option() {
        let mut settings = PostgresConfig::default();
        settings.statement_timeout_ms = 1500;
        let config = client_config("host=localhost", &settings).unwrap();
        assert_eq!(config.get_options(), Some("-c statement_timeout=1500"));

        settings.statement_timeout_ms = 0;
        let config = client_config("host=localhost", &settings).unwrap();
        assert_eq!(config.get_options(), None);
    }

    #[test]
    fn driver_errors_keep_their_type() {
        let err = PostgresConnection::new("host=localhost port=not-a-port")
            .err()
            .unwrap();
        assert!(matches!(err, BucketflowError::Postgres(_)));
        assert!(err.to_string().starts_with("postgres error:"));
    }
}
