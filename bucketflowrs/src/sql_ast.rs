use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dialect::{Dialect, WindowFragment};

/// Aggregate functions a bucket query can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// The value column of a bucket query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateExpr {
    /// `func(column)`; `column` may itself be a dialect expression.
    Plain {
        func: AggregateFunction,
        column: String,
    },
    /// `func(inner) OVER (...)`, a running total across buckets.
    Windowed {
        func: AggregateFunction,
        window: WindowFragment,
    },
}

impl AggregateExpr {
    pub fn is_windowed(&self) -> bool {
        matches!(self, AggregateExpr::Windowed { .. })
    }

    fn render(&self) -> String {
        match self {
            AggregateExpr::Plain { func, column } => format!("{func}({column})"),
            AggregateExpr::Windowed { func, window } => window.complete(func.as_sql()),
        }
    }
}

/// Comparison operators available to row filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "like")]
    Like,
}

impl FilterOp {
    fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Neq => "!=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Like => "LIKE",
        }
    }
}

/// `column op value`, applied to source rows before grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }
}

/// Everything a backend needs to run one grouped, filtered aggregate.
#[derive(Debug, Clone)]
pub struct BucketStatement {
    /// Dialect expression computing the bucket key.
    pub bucket_expr: String,
    pub bucket_alias: String,
    pub aggregate: AggregateExpr,
    pub table: String,
    pub date_column: String,
    pub filters: Vec<Filter>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Sort by the bucket alias. Running totals carry their own ordering.
    pub order_by_bucket: bool,
}

pub struct SqlRenderer<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> SqlRenderer<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    pub fn render(&self, statement: &BucketStatement) -> String {
        let alias = self.dialect.quote_ident(&statement.bucket_alias);
        let aggregate = self.dialect.wrap_aggregate(statement.aggregate.render());

        let mut sql = format!(
            "SELECT {} AS {alias}, {aggregate} AS aggregate FROM {}",
            statement.bucket_expr,
            self.dialect.quote_ident(&statement.table)
        );

        let mut predicates: Vec<String> = statement
            .filters
            .iter()
            .map(|f| {
                format!(
                    "{} {} {}",
                    self.qualified(&statement.table, &f.column),
                    f.op.as_sql(),
                    self.dialect.render_literal(&f.value)
                )
            })
            .collect();
        predicates.push(format!(
            "{} BETWEEN {} AND {}",
            self.qualified(&statement.table, &statement.date_column),
            self.dialect.render_timestamp(&statement.start),
            self.dialect.render_timestamp(&statement.end)
        ));
        sql.push_str(&format!(" WHERE {}", predicates.join(" AND ")));

        if self.dialect.groups_by_alias() {
            sql.push_str(&format!(" GROUP BY {alias}"));
        } else {
            sql.push_str(&format!(" GROUP BY {}", statement.bucket_expr));
        }

        if statement.order_by_bucket {
            sql.push_str(&format!(" ORDER BY {alias} ASC"));
        }

        sql
    }

    fn qualified(&self, table: &str, column: &str) -> String {
        format!(
            "{}.{}",
            self.dialect.quote_ident(table),
            self.dialect.quote_ident(column)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, SqlServerDialect, SqliteDialect};
    use chrono::NaiveDate;

    fn statement(aggregate: AggregateExpr, order_by_bucket: bool) -> BucketStatement {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        BucketStatement {
            bucket_expr: "strftime('%Y-%m-%d', users.created_at)".to_string(),
            bucket_alias: "date".to_string(),
            aggregate,
            table: "users".to_string(),
            date_column: "created_at".to_string(),
            filters: vec![],
            start: day.and_hms_opt(0, 0, 0).unwrap(),
            end: day.and_hms_opt(23, 59, 59).unwrap(),
            order_by_bucket,
        }
    }

    #[test]
    fn renders_plain_statement() {
        let stmt = statement(
            AggregateExpr::Plain {
                func: AggregateFunction::Sum,
                column: "t".to_string(),
            },
            true,
        );
        let sql = SqlRenderer::new(&SqliteDialect).render(&stmt);
        assert_eq!(
            sql,
            "SELECT strftime('%Y-%m-%d', users.created_at) AS \"date\", sum(t) AS aggregate \
             FROM \"users\" WHERE \"users\".\"created_at\" BETWEEN '2024-05-01 00:00:00' AND \
             '2024-05-01 23:59:59' GROUP BY \"date\" ORDER BY \"date\" ASC"
        );
    }

    #[test]
    fn renders_window_without_order_by() {
        let stmt = statement(
            AggregateExpr::Windowed {
                func: AggregateFunction::Sum,
                window: MySqlDialect.cumulative("t", "date").unwrap(),
            },
            false,
        );
        let sql = SqlRenderer::new(&MySqlDialect).render(&stmt);
        assert!(sql.contains("sum(SUM(t)) OVER (ORDER BY `date`) AS aggregate"));
        assert!(sql.ends_with("GROUP BY `date`"));
        assert!(!sql.contains("ORDER BY `date` ASC"));
    }

    #[test]
    fn renders_filters_before_range() {
        let mut stmt = statement(
            AggregateExpr::Plain {
                func: AggregateFunction::Count,
                column: "*".to_string(),
            },
            true,
        );
        stmt.filters.push(Filter::eq("name", "no-name"));
        stmt.filters.push(Filter::new("id", FilterOp::Gt, 1));
        let sql = SqlRenderer::new(&SqliteDialect).render(&stmt);
        assert!(sql.contains(
            "WHERE \"users\".\"name\" = 'no-name' AND \"users\".\"id\" > 1 AND \"users\".\"created_at\" BETWEEN"
        ));
        assert!(sql.contains("count(*) AS aggregate"));
    }

    #[test]
    fn groups_by_expression_when_alias_is_not_allowed() {
        let mut stmt = statement(
            AggregateExpr::Plain {
                func: AggregateFunction::Max,
                column: "t".to_string(),
            },
            true,
        );
        stmt.bucket_expr = "FORMAT(users.created_at, 'yyyy-MM-dd')".to_string();
        let sql = SqlRenderer::new(&SqlServerDialect).render(&stmt);
        assert!(sql.contains("GROUP BY FORMAT(users.created_at, 'yyyy-MM-dd')"));
        assert!(sql.ends_with("ORDER BY [date] ASC"));
        assert!(sql.contains("FROM [users]"));
    }

    #[test]
    fn filter_ops_deserialize_from_symbols() {
        let f: Filter =
            serde_json::from_str(r#"{"column":"id","op":">=","value":3}"#).unwrap();
        assert_eq!(f.op, FilterOp::Gte);
        assert_eq!(f.value, serde_json::json!(3));
    }
}
