//! PostgreSQL dialect implementation.

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::interval::Interval;

use super::{Dialect, DialectKind};

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn pattern(interval: Interval) -> &'static str {
        match interval {
            Interval::Minute => "YYYY-MM-DD HH24:MI:00",
            Interval::Hour => "YYYY-MM-DD HH24:00:00",
            Interval::Day => "YYYY-MM-DD",
            Interval::Week => "IYYY-IW",
            Interval::Month => "YYYY-MM",
            Interval::Year => "YYYY",
        }
    }

    /// Quote each segment of a possibly table-qualified column.
    fn quote_path(&self, column: &str) -> String {
        column
            .split('.')
            .map(|part| self.quote_ident(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn format(&self, column: &str, interval: Interval) -> Result<String> {
        Ok(format!(
            "to_char({}, '{}')",
            self.quote_path(column),
            Self::pattern(interval)
        ))
    }

    fn sum_time(&self, column: &str) -> String {
        format!("EXTRACT(EPOCH FROM {})", self.quote_path(column))
    }

    fn bucket_key(&self, at: &NaiveDateTime, interval: Interval) -> String {
        match interval {
            Interval::Hour => at.format("%Y-%m-%d %H:00:00").to_string(),
            _ => interval.key(at),
        }
    }

    // avg/sum come back as NUMERIC, which tokio-postgres cannot decode into f64.
    fn wrap_aggregate(&self, expr: String) -> String {
        format!("CAST({expr} AS double precision)")
    }
}
