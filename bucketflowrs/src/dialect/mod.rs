//! SQL dialect abstractions for different database backends.
//!
//! Each dialect is implemented in its own file. Dialects only build SQL text;
//! they hold no state and never touch a connection.

use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{BucketflowError, Result};
use crate::interval::Interval;

mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

/// Dialects map a bucket interval, a time column or a running total to the
/// SQL fragment the backend understands. Column names are interpolated as
/// given, so callers must only pass trusted identifiers.
pub trait Dialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    fn quote_ident(&self, ident: &str) -> String;

    /// Whether `GROUP BY` may reference the bucket alias instead of repeating
    /// the bucket expression.
    fn groups_by_alias(&self) -> bool {
        true
    }

    /// Expression truncating `column` to `interval`.
    fn format(&self, column: &str, interval: Interval) -> Result<String>;

    /// Expression turning a time-of-day column into a summable quantity.
    fn sum_time(&self, column: &str) -> String;

    /// Running total of `column` ordered by the bucket alias.
    fn cumulative(&self, _column: &str, _bucket_alias: &str) -> Result<WindowFragment> {
        Err(BucketflowError::Unsupported {
            dialect: self.kind().name(),
            operation: "cumulative",
        })
    }

    /// Running total of [`Dialect::sum_time`] ordered by the bucket alias.
    fn cumulative_time(&self, _column: &str, _bucket_alias: &str) -> Result<WindowFragment> {
        Err(BucketflowError::Unsupported {
            dialect: self.kind().name(),
            operation: "cumulativeTime",
        })
    }

    /// Key [`Dialect::format`] yields for a row stamped `at`. Calendar buckets
    /// are labelled with it so they line up with the database rows.
    fn bucket_key(&self, at: &NaiveDateTime, interval: Interval) -> String {
        interval.key(at)
    }

    /// Hook for backends whose drivers cannot decode the native aggregate type.
    fn wrap_aggregate(&self, expr: String) -> String {
        expr
    }

    fn render_literal(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => "NULL".to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            serde_json::Value::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|v| self.render_literal(v)).collect();
                rendered.join(", ")
            }
            serde_json::Value::Object(_) => {
                format!("'{}'", value.to_string().replace('\'', "''"))
            }
        }
    }

    fn render_timestamp(&self, at: &NaiveDateTime) -> String {
        format!("'{}'", at.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Closed set of supported backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    MySql,
    SqlServer,
    Postgres,
    Sqlite,
}

impl DialectKind {
    /// Map a driver name reported by a backend connection to its dialect.
    pub fn from_driver(driver: &str) -> Result<Self> {
        match driver.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DialectKind::MySql),
            "sqlsrv" | "sqlserver" | "mssql" => Ok(DialectKind::SqlServer),
            "pgsql" | "postgres" | "postgresql" => Ok(DialectKind::Postgres),
            "sqlite" => Ok(DialectKind::Sqlite),
            _ => Err(BucketflowError::UnsupportedDriver(driver.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DialectKind::MySql => "MySQL",
            DialectKind::SqlServer => "SQL Server",
            DialectKind::Postgres => "PostgreSQL",
            DialectKind::Sqlite => "SQLite",
        }
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            DialectKind::MySql => &MySqlDialect,
            DialectKind::SqlServer => &SqlServerDialect,
            DialectKind::Postgres => &PostgresDialect,
            DialectKind::Sqlite => &SqliteDialect,
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the dialect for a driver name.
pub fn dialect_for_driver(driver: &str) -> Result<&'static dyn Dialect> {
    DialectKind::from_driver(driver).map(|kind| kind.dialect())
}

/// A windowed running sum, kept in pieces until the statement wraps it in the
/// outer aggregate function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFragment {
    /// Per-bucket aggregate, e.g. `SUM(t)`.
    pub inner: String,
    /// Window ordering key, already quoted for the dialect.
    pub order_by: String,
    /// Optional frame clause following the ordering key.
    pub frame: Option<&'static str>,
}

impl WindowFragment {
    pub fn new(inner: impl Into<String>, order_by: impl Into<String>) -> Self {
        Self {
            inner: inner.into(),
            order_by: order_by.into(),
            frame: None,
        }
    }

    pub fn with_frame(mut self, frame: &'static str) -> Self {
        self.frame = Some(frame);
        self
    }

    /// The open-ended text that becomes a full expression once placed inside
    /// `func(...)`.
    pub fn fragment(&self) -> String {
        match self.frame {
            Some(frame) => format!("{}) OVER (ORDER BY {} {frame}", self.inner, self.order_by),
            None => format!("{}) OVER (ORDER BY {}", self.inner, self.order_by),
        }
    }

    /// Finished expression with `func` applied over the window.
    pub fn complete(&self, func: &str) -> String {
        format!("{func}({})", self.fragment())
    }
}

/// Pattern for `interval`, or an error when the dialect has none.
pub(crate) fn pattern_or_unsupported(
    kind: DialectKind,
    interval: Interval,
    pattern: Option<&'static str>,
) -> Result<&'static str> {
    pattern.ok_or(BucketflowError::UnsupportedDialectInterval {
        dialect: kind.name(),
        interval: interval.as_str(),
    })
}
