//! SQL Server dialect implementation.
//!
//! Weekly buckets and running totals are not available.

use crate::error::Result;
use crate::interval::Interval;

use super::{pattern_or_unsupported, Dialect, DialectKind};

#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    fn pattern(interval: Interval) -> Option<&'static str> {
        match interval {
            Interval::Minute => Some("yyyy-MM-dd HH:mm:00"),
            Interval::Hour => Some("yyyy-MM-dd HH:00"),
            Interval::Day => Some("yyyy-MM-dd"),
            Interval::Week => None,
            Interval::Month => Some("yyyy-MM"),
            Interval::Year => Some("yyyy"),
        }
    }
}

impl Dialect for SqlServerDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    // T-SQL cannot group by a select-list alias.
    fn groups_by_alias(&self) -> bool {
        false
    }

    fn format(&self, column: &str, interval: Interval) -> Result<String> {
        let pattern = pattern_or_unsupported(self.kind(), interval, Self::pattern(interval))?;
        Ok(format!("FORMAT({column}, '{pattern}')"))
    }

    fn sum_time(&self, column: &str) -> String {
        format!("DATEDIFF(second,0,{column})")
    }
}
