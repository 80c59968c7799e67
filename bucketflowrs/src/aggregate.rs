//! Bucketed aggregate queries.
//!
//! An [`AggregateQuery`] is configured with chained setters and consumed by
//! one terminal operation, which runs a single grouped query and returns a
//! gap-free series with one [`BucketRow`] per bucket of the requested range.
//!
//! ```no_run
//! # async fn demo(conn: &dyn bucketflow::BackendConnection) -> bucketflow::error::Result<()> {
//! use chrono::NaiveDate;
//! use bucketflow::AggregateQuery;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let series = AggregateQuery::new(conn, "orders")
//!     .between(day.and_hms_opt(0, 0, 0).unwrap(), day.and_hms_opt(23, 59, 59).unwrap())
//!     .per_hour()
//!     .sum("amount")
//!     .await?;
//! assert_eq!(series.len(), 24);
//! # Ok(())
//! # }
//! ```

use std::time::Instant;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backends::BackendConnection;
use crate::calendar::dialect_bucket_keys;
use crate::config::QueryDefaults;
use crate::dialect::Dialect;
use crate::error::{BucketflowError, Result};
use crate::interval::Interval;
use crate::merge::{AggregationMode, BucketRow};
use crate::sql_ast::{
    AggregateExpr, AggregateFunction, BucketStatement, Filter, FilterOp, SqlRenderer,
};

/// Terminal operations of an aggregate query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Count,
    Sum,
    #[serde(alias = "avg")]
    Average,
    Min,
    Max,
    /// Sum of time-of-day values converted to seconds.
    SumTime,
    /// Running total of the per-bucket sum.
    Cumulative,
    /// Running total of time-of-day values.
    CumulativeTime,
}

impl Operation {
    pub fn mode(&self) -> AggregationMode {
        match self {
            Operation::Cumulative | Operation::CumulativeTime => AggregationMode::Cumulative,
            _ => AggregationMode::Plain,
        }
    }

    /// Column used when the caller does not name one.
    pub fn default_column(&self) -> Option<&'static str> {
        match self {
            Operation::Count => Some("*"),
            _ => None,
        }
    }

    fn expression(
        &self,
        dialect: &dyn Dialect,
        column: &str,
        bucket_alias: &str,
    ) -> Result<AggregateExpr> {
        let plain = |func: AggregateFunction, column: String| AggregateExpr::Plain { func, column };
        Ok(match self {
            Operation::Count => plain(AggregateFunction::Count, column.to_string()),
            Operation::Sum => plain(AggregateFunction::Sum, column.to_string()),
            Operation::Average => plain(AggregateFunction::Avg, column.to_string()),
            Operation::Min => plain(AggregateFunction::Min, column.to_string()),
            Operation::Max => plain(AggregateFunction::Max, column.to_string()),
            Operation::SumTime => plain(AggregateFunction::Sum, dialect.sum_time(column)),
            Operation::Cumulative => AggregateExpr::Windowed {
                func: AggregateFunction::Sum,
                window: dialect.cumulative(column, bucket_alias)?,
            },
            Operation::CumulativeTime => AggregateExpr::Windowed {
                func: AggregateFunction::Sum,
                window: dialect.cumulative_time(column, bucket_alias)?,
            },
        })
    }
}

/// Builder and executor for one bucketed aggregate.
pub struct AggregateQuery<'c> {
    connection: &'c dyn BackendConnection,
    table: String,
    filters: Vec<Filter>,
    interval: Option<std::result::Result<Interval, String>>,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    date_column: Option<String>,
    bucket_alias: Option<String>,
}

impl<'c> AggregateQuery<'c> {
    pub fn new(connection: &'c dyn BackendConnection, table: impl Into<String>) -> Self {
        Self {
            connection,
            table: table.into(),
            filters: Vec::new(),
            interval: None,
            start: None,
            end: None,
            date_column: None,
            bucket_alias: None,
        }
    }

    /// Fill the settings not chosen yet from configured defaults.
    pub fn with_defaults(mut self, defaults: &QueryDefaults) -> Self {
        self.date_column.get_or_insert_with(|| defaults.date_column.clone());
        self.bucket_alias.get_or_insert_with(|| defaults.bucket_alias.clone());
        if self.interval.is_none() {
            self.interval = defaults.interval.map(Ok);
        }
        self
    }

    /// Inclusive range of the query.
    pub fn between(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn interval(mut self, interval: Interval) -> Self {
        self.interval = Some(Ok(interval));
        self
    }

    /// Set the interval by name; an unknown name fails when the query runs.
    pub fn interval_str(mut self, interval: &str) -> Self {
        self.interval = Some(interval.parse::<Interval>().map_err(|_| interval.to_string()));
        self
    }

    pub fn per_minute(self) -> Self {
        self.interval(Interval::Minute)
    }

    pub fn per_hour(self) -> Self {
        self.interval(Interval::Hour)
    }

    pub fn per_day(self) -> Self {
        self.interval(Interval::Day)
    }

    pub fn per_week(self) -> Self {
        self.interval(Interval::Week)
    }

    pub fn per_month(self) -> Self {
        self.interval(Interval::Month)
    }

    pub fn per_year(self) -> Self {
        self.interval(Interval::Year)
    }

    pub fn date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = Some(column.into());
        self
    }

    pub fn bucket_alias(mut self, alias: impl Into<String>) -> Self {
        self.bucket_alias = Some(alias.into());
        self
    }

    /// Restrict source rows before grouping.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_op(
        self,
        column: impl Into<String>,
        op: FilterOp,
        value: impl Into<Value>,
    ) -> Self {
        self.filter(Filter::new(column, op, value))
    }

    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub async fn count(self) -> Result<Vec<BucketRow>> {
        self.run(Operation::Count, "*").await
    }

    pub async fn count_of(self, column: &str) -> Result<Vec<BucketRow>> {
        self.run(Operation::Count, column).await
    }

    pub async fn sum(self, column: &str) -> Result<Vec<BucketRow>> {
        self.run(Operation::Sum, column).await
    }

    pub async fn average(self, column: &str) -> Result<Vec<BucketRow>> {
        self.run(Operation::Average, column).await
    }

    pub async fn min(self, column: &str) -> Result<Vec<BucketRow>> {
        self.run(Operation::Min, column).await
    }

    pub async fn max(self, column: &str) -> Result<Vec<BucketRow>> {
        self.run(Operation::Max, column).await
    }

    pub async fn sum_time(self, column: &str) -> Result<Vec<BucketRow>> {
        self.run(Operation::SumTime, column).await
    }

    pub async fn cumulative(self, column: &str) -> Result<Vec<BucketRow>> {
        self.run(Operation::Cumulative, column).await
    }

    pub async fn cumulative_time(self, column: &str) -> Result<Vec<BucketRow>> {
        self.run(Operation::CumulativeTime, column).await
    }

    /// Render the SQL an operation would execute, without running it.
    pub fn to_sql(&self, operation: Operation, column: &str) -> Result<String> {
        let dialect = self.connection.dialect()?;
        let statement = self.statement(dialect, operation, column)?;
        Ok(SqlRenderer::new(dialect).render(&statement))
    }

    /// Execute `operation` over `column` and merge the rows into the dense
    /// bucket series.
    pub async fn run(self, operation: Operation, column: &str) -> Result<Vec<BucketRow>> {
        let dialect = self.connection.dialect()?;
        let statement = self.statement(dialect, operation, column)?;
        let interval = self.resolved_interval()?;
        let mode = operation.mode();

        let started = Instant::now();
        tracing::debug!(
            driver = self.connection.driver_name(),
            table = %self.table,
            interval = %interval,
            operation = ?operation,
            "executing bucket query"
        );
        let result = self.connection.execute_bucket_query(&statement).await?;
        let rows = result.bucket_rows(&statement.bucket_alias)?;

        let keys = dialect_bucket_keys(dialect, statement.start, statement.end, interval);
        let fetched = rows.len();
        let series = mode.merge(rows, &keys);
        tracing::debug!(
            rows = fetched,
            buckets = series.len(),
            ms = started.elapsed().as_millis(),
            "bucket query merged"
        );
        Ok(series)
    }

    fn statement(
        &self,
        dialect: &dyn Dialect,
        operation: Operation,
        column: &str,
    ) -> Result<BucketStatement> {
        let interval = self.resolved_interval()?;
        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(BucketflowError::Validation(
                    "query range is not set; call between(start, end)".to_string(),
                ))
            }
        };

        let fallback = QueryDefaults::default();
        let date_column = self.date_column.clone().unwrap_or(fallback.date_column);
        let bucket_alias = self.bucket_alias.clone().unwrap_or(fallback.bucket_alias);

        let aggregate = operation.expression(dialect, column, &bucket_alias)?;
        let qualified = format!("{}.{date_column}", self.table);
        let bucket_expr = dialect.format(&qualified, interval)?;

        Ok(BucketStatement {
            bucket_expr,
            bucket_alias,
            order_by_bucket: !aggregate.is_windowed(),
            aggregate,
            table: self.table.clone(),
            date_column,
            filters: self.filters.clone(),
            start,
            end,
        })
    }

    fn resolved_interval(&self) -> Result<Interval> {
        match &self.interval {
            Some(Ok(interval)) => Ok(*interval),
            Some(Err(name)) => Err(BucketflowError::InvalidInterval(name.clone())),
            None => Err(BucketflowError::InvalidInterval(
                "interval is not set".to_string(),
            )),
        }
    }
}
