//! Serialized aggregate requests.
//!
//! An [`AggregateRequest`] names a registered data source and carries every
//! setting of an [`AggregateQuery`]; missing optional settings fall back to the
//! data source's resolved configuration.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateQuery, Operation};
use crate::backends::{BackendConnection, ConnectionManager};
use crate::config::QueryDefaults;
use crate::error::{BucketflowError, Result};
use crate::executor::QueryResult;
use crate::merge::BucketRow;
use crate::sql_ast::Filter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub datasource: String,
    pub table: String,
    /// Interval name; the configured default applies when absent.
    #[serde(default)]
    pub interval: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub function: Operation,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub date_column: Option<String>,
    #[serde(default)]
    pub bucket_alias: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl AggregateRequest {
    fn column(&self) -> Result<&str> {
        self.column
            .as_deref()
            .or_else(|| self.function.default_column())
            .ok_or_else(|| {
                BucketflowError::Validation(format!(
                    "function {:?} requires a column",
                    self.function
                ))
            })
    }

    fn query<'c>(
        &self,
        connection: &'c dyn BackendConnection,
        defaults: &QueryDefaults,
    ) -> AggregateQuery<'c> {
        let mut query = AggregateQuery::new(connection, self.table.clone());
        if let Some(interval) = &self.interval {
            query = query.interval_str(interval);
        }
        query = query.with_defaults(defaults);
        if let Some(date_column) = &self.date_column {
            query = query.date_column(date_column.clone());
        }
        if let Some(alias) = &self.bucket_alias {
            query = query.bucket_alias(alias.clone());
        }
        for filter in &self.filters {
            query = query.filter(filter.clone());
        }
        query.between(self.start, self.end)
    }
}

/// Execute a request against the data source it names.
pub async fn run_request(
    connections: &ConnectionManager,
    request: &AggregateRequest,
) -> Result<Vec<BucketRow>> {
    let connection = connections.get(&request.datasource).ok_or_else(|| {
        BucketflowError::Validation(format!(
            "data source {} not registered",
            request.datasource
        ))
    })?;
    let defaults = connections.config_for(&request.datasource).query;
    let column = request.column()?;

    tracing::info!(
        datasource = %request.datasource,
        table = %request.table,
        function = ?request.function,
        "running aggregate request"
    );
    request
        .query(connection.as_ref(), &defaults)
        .run(request.function, column)
        .await
}

/// Render the SQL a request would run on `driver`, without a database.
pub fn render_request(
    driver: &str,
    defaults: &QueryDefaults,
    request: &AggregateRequest,
) -> Result<String> {
    let connection = DryRun {
        driver: driver.to_string(),
    };
    let column = request.column()?;
    request
        .query(&connection, defaults)
        .to_sql(request.function, column)
}

/// Backend stand-in that only reports a driver name.
struct DryRun {
    driver: String,
}

#[async_trait]
impl BackendConnection for DryRun {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    async fn execute_sql(&self, _sql: &str) -> Result<QueryResult> {
        Err(BucketflowError::Execution(
            "dry-run connection cannot execute SQL".to_string(),
        ))
    }
}
