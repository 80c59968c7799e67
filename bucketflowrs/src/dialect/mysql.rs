//! MySQL / MariaDB dialect implementation.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};

use crate::error::Result;
use crate::interval::Interval;

use super::{Dialect, DialectKind, WindowFragment};

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl MySqlDialect {
    fn pattern(interval: Interval) -> &'static str {
        match interval {
            Interval::Minute => "%Y-%m-%d %H:%i:00",
            Interval::Hour => "%Y-%m-%d %H:00",
            Interval::Day => "%Y-%m-%d",
            Interval::Week => "%Y-%u",
            Interval::Month => "%Y-%m",
            Interval::Year => "%Y",
        }
    }
}

/// `%u` week number of `date`: weeks start on Monday and week 1 is the
/// first one with four or more days in the year, so early January days can
/// land in week 00.
fn week_of_year(date: NaiveDate) -> i64 {
    match NaiveDate::from_isoywd_opt(date.year(), 1, Weekday::Mon) {
        Some(first) if date >= first => (date - first).num_days() / 7 + 1,
        _ => 0,
    }
}

impl Dialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn format(&self, column: &str, interval: Interval) -> Result<String> {
        Ok(format!("date_format({column}, '{}')", Self::pattern(interval)))
    }

    fn sum_time(&self, column: &str) -> String {
        format!("TIME_TO_SEC({column})")
    }

    fn cumulative(&self, column: &str, bucket_alias: &str) -> Result<WindowFragment> {
        Ok(WindowFragment::new(
            format!("SUM({column})"),
            format!("`{bucket_alias}`"),
        ))
    }

    fn cumulative_time(&self, column: &str, bucket_alias: &str) -> Result<WindowFragment> {
        Ok(WindowFragment::new(
            format!("SUM({})", self.sum_time(column)),
            format!("`{bucket_alias}`"),
        ))
    }

    fn bucket_key(&self, at: &NaiveDateTime, interval: Interval) -> String {
        match interval {
            Interval::Week => {
                let date = at.date();
                format!("{}-{:02}", date.year(), week_of_year(date))
            }
            _ => interval.key(at),
        }
    }
}
