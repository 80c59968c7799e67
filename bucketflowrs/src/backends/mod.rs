//! Database backend implementations.
//!
//! Each backend is implemented in its own file and gated behind a feature flag.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BucketflowConfig, ResolvedDatasourceConfig};
use crate::dialect::{dialect_for_driver, Dialect};
use crate::error::Result;
use crate::executor::QueryResult;
use crate::sql_ast::{BucketStatement, SqlRenderer};

/// Unified interface for all database backends.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Driver identifier used to pick the SQL dialect (`sqlite`, `pgsql`, ...).
    fn driver_name(&self) -> &str;

    async fn execute_sql(&self, sql: &str) -> Result<QueryResult>;

    /// Render and run a bucket statement in this backend's dialect.
    async fn execute_bucket_query(&self, statement: &BucketStatement) -> Result<QueryResult> {
        let dialect = self.dialect()?;
        let sql = SqlRenderer::new(dialect).render(statement);
        tracing::trace!(sql = %sql, "rendered bucket query");
        self.execute_sql(&sql).await
    }

    fn dialect(&self) -> Result<&'static dyn Dialect> {
        dialect_for_driver(self.driver_name())
    }
}

/// Minimal connection manager keyed by data source name.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    connections: HashMap<String, Arc<dyn BackendConnection>>,
    config: Option<BucketflowConfig>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            config: None,
        }
    }

    /// Create a connection manager with configuration.
    pub fn with_config(config: BucketflowConfig) -> Self {
        Self {
            connections: HashMap::new(),
            config: Some(config),
        }
    }

    /// Get the configuration, if set.
    pub fn config(&self) -> Option<&BucketflowConfig> {
        self.config.as_ref()
    }

    /// Get resolved configuration for a specific datasource.
    pub fn config_for(&self, name: &str) -> ResolvedDatasourceConfig {
        match &self.config {
            Some(cfg) => cfg.for_datasource(name),
            None => BucketflowConfig::default().for_datasource(name),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, conn: Arc<dyn BackendConnection>) {
        self.connections.insert(name.into(), conn);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn BackendConnection>> {
        self.connections.get(name)
    }

    /// Open a connection for every configured datasource that names a
    /// database. Returns the names registered.
    pub fn connect_configured(&mut self) -> Result<Vec<String>> {
        let Some(config) = self.config.clone() else {
            return Ok(Vec::new());
        };
        let mut names: Vec<&String> = config.datasources.keys().collect();
        names.sort();

        let mut registered = Vec::new();
        for name in names {
            let resolved = config.for_datasource(name);
            if let Some(conn) = open_configured(name, &resolved)? {
                self.insert(name.clone(), conn);
                registered.push(name.clone());
            }
        }
        Ok(registered)
    }
}

#[allow(unused_variables)]
fn open_configured(
    name: &str,
    resolved: &ResolvedDatasourceConfig,
) -> Result<Option<Arc<dyn BackendConnection>>> {
    #[cfg(feature = "sqlite")]
    if let Some(path) = &resolved.sqlite.path {
        tracing::info!(datasource = name, "registering configured SQLite datasource");
        let conn = SqliteConnection::new(path).with_max_concurrency(resolved.sqlite_concurrency());
        return Ok(Some(Arc::new(conn)));
    }

    #[cfg(feature = "postgres")]
    if let Some(url) = &resolved.postgres.url {
        tracing::info!(datasource = name, "registering configured PostgreSQL datasource");
        let conn = PostgresConnection::with_config(url, &resolved.postgres)?;
        return Ok(Some(Arc::new(conn)));
    }

    tracing::debug!(
        datasource = name,
        "datasource has no connection settings for enabled backends"
    );
    Ok(None)
}

// Feature-gated backend implementations
#[cfg(feature = "sqlite")]
mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConnection;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::PostgresConnection;
