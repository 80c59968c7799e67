#[cfg(feature = "sqlite")]
use rusqlite::types::Value as SqliteValue;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::merge::{rows_from_maps, BucketRow};

#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
}

/// Raw rows returned by a backend, keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Map<String, Value>>,
}

impl QueryResult {
    /// Interpret the rows of a bucket query.
    pub fn bucket_rows(&self, bucket_alias: &str) -> Result<Vec<BucketRow>> {
        rows_from_maps(&self.rows, bucket_alias)
    }
}

#[cfg(feature = "sqlite")]
pub(crate) fn sqlite_value_to_json(value: SqliteValue) -> Value {
    match value {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(i) => Value::from(i),
        SqliteValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqliteValue::Text(s) => Value::String(s),
        SqliteValue::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[test]
    fn converts_sqlite_values() {
        assert_eq!(sqlite_value_to_json(SqliteValue::Null), Value::Null);
        assert_eq!(sqlite_value_to_json(SqliteValue::Integer(5)), Value::from(5));
        assert_eq!(sqlite_value_to_json(SqliteValue::Real(1.5)), Value::from(1.5));
        assert_eq!(
            sqlite_value_to_json(SqliteValue::Real(f64::NAN)),
            Value::Null
        );
        assert_eq!(
            sqlite_value_to_json(SqliteValue::Text("2024-01".into())),
            Value::String("2024-01".into())
        );
    }
}
