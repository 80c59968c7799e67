//! Reconcile sparse query rows with the dense bucket sequence.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BucketflowError, Result};

/// One bucket of a result series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRow {
    pub date: String,
    pub aggregate: Option<f64>,
}

impl BucketRow {
    pub fn new(date: impl Into<String>, aggregate: Option<f64>) -> Self {
        Self {
            date: date.into(),
            aggregate,
        }
    }
}

/// How empty buckets are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationMode {
    /// Missing buckets are zero.
    #[default]
    Plain,
    /// Missing buckets repeat the last running total.
    Cumulative,
}

impl AggregationMode {
    pub fn merge(&self, rows: Vec<BucketRow>, bucket_keys: &[String]) -> Vec<BucketRow> {
        match self {
            AggregationMode::Plain => fill_with_zero(rows, bucket_keys),
            AggregationMode::Cumulative => fill_cumulative(rows, bucket_keys),
        }
    }
}

/// Zero-fill every bucket without a row. Rows take precedence over
/// placeholders, the first row wins for a duplicated key, and the output is
/// sorted by key.
pub fn fill_with_zero(rows: Vec<BucketRow>, bucket_keys: &[String]) -> Vec<BucketRow> {
    let placeholders = bucket_keys
        .iter()
        .map(|key| BucketRow::new(key.clone(), Some(0.0)));
    dedupe_sorted(rows.into_iter().chain(placeholders))
}

/// Walk the buckets carrying the last seen running total into buckets without
/// a row. Buckets before the first row stay null.
pub fn fill_cumulative(rows: Vec<BucketRow>, bucket_keys: &[String]) -> Vec<BucketRow> {
    let mut by_key: HashMap<String, BucketRow> = HashMap::with_capacity(rows.len());
    for row in rows {
        by_key.entry(row.date.clone()).or_insert(row);
    }

    let mut previous: Option<f64> = None;
    let mut walked = Vec::with_capacity(bucket_keys.len());
    for key in bucket_keys {
        match by_key.get(key) {
            Some(row) => {
                previous = row.aggregate;
                walked.push(row.clone());
            }
            None => walked.push(BucketRow::new(key.clone(), previous)),
        }
    }
    dedupe_sorted(walked)
}

fn dedupe_sorted(rows: impl IntoIterator<Item = BucketRow>) -> Vec<BucketRow> {
    let mut unique: BTreeMap<String, BucketRow> = BTreeMap::new();
    for row in rows {
        unique.entry(row.date.clone()).or_insert(row);
    }
    unique.into_values().collect()
}

/// Pull `(bucket, aggregate)` pairs out of raw result rows.
pub fn rows_from_maps(rows: &[Map<String, Value>], bucket_alias: &str) -> Result<Vec<BucketRow>> {
    rows.iter()
        .map(|row| {
            let date = match row.get(bucket_alias) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => {
                    return Err(BucketflowError::Execution(format!(
                        "result row has no {bucket_alias} value"
                    )))
                }
                Some(other) => other.to_string(),
            };
            let aggregate = numeric(row.get("aggregate").unwrap_or(&Value::Null))?;
            Ok(BucketRow { date, aggregate })
        })
        .collect()
}

fn numeric(value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        // decimals arrive as text from some drivers
        Value::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            BucketflowError::Execution(format!("aggregate value {s:?} is not numeric"))
        }),
        other => Err(BucketflowError::Execution(format!(
            "aggregate value {other} is not numeric"
        ))),
    }
}
