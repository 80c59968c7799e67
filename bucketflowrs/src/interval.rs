//! Bucketing intervals and their canonical text keys.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::BucketflowError;

/// Width of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Interval {
    pub const ALL: [Interval; 6] = [
        Interval::Minute,
        Interval::Hour,
        Interval::Day,
        Interval::Week,
        Interval::Month,
        Interval::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute => "minute",
            Interval::Hour => "hour",
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
            Interval::Year => "year",
        }
    }

    /// chrono format string used to label a bucket and to match it against
    /// the keys returned by the database.
    ///
    /// Weeks use the ISO year together with the ISO week so that the last days
    /// of December land in the same key as the following January when they
    /// belong to week 1.
    pub fn key_format(&self) -> &'static str {
        match self {
            Interval::Minute => "%Y-%m-%d %H:%M:00",
            Interval::Hour => "%Y-%m-%d %H:00",
            Interval::Day => "%Y-%m-%d",
            Interval::Week => "%G-%V",
            Interval::Month => "%Y-%m",
            Interval::Year => "%Y",
        }
    }

    /// Render a bucket boundary as its canonical key.
    pub fn key(&self, at: &NaiveDateTime) -> String {
        at.format(self.key_format()).to_string()
    }

    /// Start of the bucket containing `at`.
    pub fn floor(&self, at: NaiveDateTime) -> NaiveDateTime {
        let date = at.date();
        match self {
            Interval::Minute => date.and_time(
                NaiveTime::from_hms_opt(at.hour(), at.minute(), 0).unwrap_or(NaiveTime::MIN),
            ),
            Interval::Hour => {
                date.and_time(NaiveTime::from_hms_opt(at.hour(), 0, 0).unwrap_or(NaiveTime::MIN))
            }
            Interval::Day => date.and_time(NaiveTime::MIN),
            Interval::Week => {
                let back = u64::from(date.weekday().num_days_from_monday());
                date.checked_sub_days(Days::new(back))
                    .unwrap_or(date)
                    .and_time(NaiveTime::MIN)
            }
            Interval::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .unwrap_or(date)
                .and_time(NaiveTime::MIN),
            Interval::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)
                .unwrap_or(date)
                .and_time(NaiveTime::MIN),
        }
    }

    /// `anchor` advanced by `steps` whole intervals. Month and year steps clamp
    /// to the last day of a shorter month. Returns `None` past chrono's range.
    pub fn advance(&self, anchor: NaiveDateTime, steps: u32) -> Option<NaiveDateTime> {
        match self {
            Interval::Minute => anchor.checked_add_signed(Duration::minutes(i64::from(steps))),
            Interval::Hour => anchor.checked_add_signed(Duration::hours(i64::from(steps))),
            Interval::Day => anchor.checked_add_days(Days::new(u64::from(steps))),
            Interval::Week => anchor.checked_add_days(Days::new(u64::from(steps) * 7)),
            Interval::Month => anchor.checked_add_months(Months::new(steps)),
            Interval::Year => anchor.checked_add_months(Months::new(steps.checked_mul(12)?)),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = BucketflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == name)
            .ok_or(BucketflowError::InvalidInterval(name))
    }
}
