//! Dense bucket sequences for a date range.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::dialect::Dialect;
use crate::interval::Interval;

/// Every bucket boundary between `start` and `end` (inclusive), one
/// `interval` apart.
///
/// The sequence is anchored on the bucket containing `start` and each step is
/// computed from that anchor rather than from the previous step, so month and
/// year sequences never skip a short month. An inverted range is empty.
pub fn bucket_sequence(
    start: NaiveDateTime,
    end: NaiveDateTime,
    interval: Interval,
) -> Vec<NaiveDateTime> {
    if start > end {
        return Vec::new();
    }

    let anchor = interval.floor(start);
    let mut buckets = Vec::new();
    let mut step = 0u32;
    while let Some(boundary) = interval.advance(anchor, step) {
        if boundary > end {
            break;
        }
        buckets.push(boundary);
        step = match step.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }
    buckets
}

/// Canonical keys for [`bucket_sequence`].
pub fn bucket_keys(start: NaiveDateTime, end: NaiveDateTime, interval: Interval) -> Vec<String> {
    bucket_sequence(start, end, interval)
        .iter()
        .map(|boundary| interval.key(boundary))
        .collect()
}

/// Keys `dialect` labels the range's buckets with, in order.
///
/// MySQL and SQLite number weeks within the calendar year, so the week
/// holding 1 January comes back from the database as two rows. Each year
/// start inside the range is an extra boundary for weeks; boundaries whose
/// key repeats the previous one collapse.
pub fn dialect_bucket_keys(
    dialect: &dyn Dialect,
    start: NaiveDateTime,
    end: NaiveDateTime,
    interval: Interval,
) -> Vec<String> {
    let mut boundaries = bucket_sequence(start, end, interval);
    if interval == Interval::Week && !boundaries.is_empty() {
        let year_starts = (start.year() + 1..=end.year())
            .filter_map(|year| NaiveDate::from_ymd_opt(year, 1, 1))
            .map(|day| day.and_time(NaiveTime::MIN));
        boundaries.extend(year_starts);
        boundaries.sort();
    }

    // The first boundary may precede `start`; key the start itself.
    let mut keys: Vec<String> = boundaries
        .iter()
        .map(|boundary| dialect.bucket_key(&(*boundary).max(start), interval))
        .collect();
    keys.dedup();
    keys
}
