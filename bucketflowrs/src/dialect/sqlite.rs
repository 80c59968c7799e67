//! SQLite dialect implementation.

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::interval::Interval;

use super::{Dialect, DialectKind, WindowFragment};

const RUNNING_FRAME: &str = "rows between unbounded preceding and current row";

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn pattern(interval: Interval) -> &'static str {
        match interval {
            Interval::Minute => "%Y-%m-%d %H:%M:00",
            Interval::Hour => "%Y-%m-%d %H:00",
            Interval::Day => "%Y-%m-%d",
            Interval::Week => "%Y-%W",
            Interval::Month => "%Y-%m",
            Interval::Year => "%Y",
        }
    }
}

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn format(&self, column: &str, interval: Interval) -> Result<String> {
        Ok(format!("strftime('{}', {column})", Self::pattern(interval)))
    }

    // time() yields 'HH:MM:SS' text; SUM coerces it through its leading hour digits.
    fn sum_time(&self, column: &str) -> String {
        format!("time({column})")
    }

    fn cumulative(&self, column: &str, bucket_alias: &str) -> Result<WindowFragment> {
        Ok(
            WindowFragment::new(format!("SUM({column})"), format!("'{bucket_alias}'"))
                .with_frame(RUNNING_FRAME),
        )
    }

    fn cumulative_time(&self, column: &str, bucket_alias: &str) -> Result<WindowFragment> {
        Ok(WindowFragment::new(
            format!("SUM({})", self.sum_time(column)),
            format!("'{bucket_alias}'"),
        )
        .with_frame(RUNNING_FRAME))
    }

    fn bucket_key(&self, at: &NaiveDateTime, interval: Interval) -> String {
        match interval {
            // chrono's %W matches strftime: week 00 runs up to the first Monday
            Interval::Week => at.format("%Y-%W").to_string(),
            _ => interval.key(at),
        }
    }
}
