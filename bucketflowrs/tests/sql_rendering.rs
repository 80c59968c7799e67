//! Integration tests for bucket statement rendering.
//!
//! These tests render complete requests for every supported driver without a
//! database behind them.

use bucketflow::config::QueryDefaults;
use bucketflow::{render_request, AggregateRequest, BucketflowError};

fn request(function: &str, column: Option<&str>, interval: &str) -> AggregateRequest {
    let mut value = serde_json::json!({
        "datasource": "app",
        "table": "users",
        "interval": interval,
        "start": "2024-05-01T00:00:00",
        "end": "2024-05-31T23:59:59",
        "function": function,
    });
    if let Some(column) = column {
        value["column"] = serde_json::json!(column);
    }
    serde_json::from_value(value).unwrap()
}

fn render(driver: &str, req: &AggregateRequest) -> Result<String, BucketflowError> {
    render_request(driver, &QueryDefaults::default(), req)
}

#[test]
fn renders_mysql_plain_and_running_total() {
    let sql = render("mysql", &request("sum", Some("t"), "day")).unwrap();
    assert_eq!(
        sql,
        "SELECT date_format(users.created_at, '%Y-%m-%d') AS `date`, sum(t) AS aggregate \
         FROM `users` WHERE `users`.`created_at` BETWEEN '2024-05-01 00:00:00' AND '2024-05-31 23:59:59' \
         GROUP BY `date` ORDER BY `date` ASC"
    );

    let sql = render("mariadb", &request("cumulative_time", Some("d"), "month")).unwrap();
    assert_eq!(
        sql,
        "SELECT date_format(users.created_at, '%Y-%m') AS `date`, \
         sum(SUM(TIME_TO_SEC(d))) OVER (ORDER BY `date`) AS aggregate \
         FROM `users` WHERE `users`.`created_at` BETWEEN '2024-05-01 00:00:00' AND '2024-05-31 23:59:59' \
         GROUP BY `date`"
    );
}

#[test]
fn renders_sqlite_window_with_frame() {
    let sql = render("sqlite", &request("cumulative", Some("t"), "week")).unwrap();
    assert_eq!(
        sql,
        "SELECT strftime('%Y-%W', users.created_at) AS \"date\", \
         sum(SUM(t)) OVER (ORDER BY 'date' rows between unbounded preceding and current row) AS aggregate \
         FROM \"users\" WHERE \"users\".\"created_at\" BETWEEN '2024-05-01 00:00:00' AND '2024-05-31 23:59:59' \
         GROUP BY \"date\""
    );
}

#[test]
fn renders_sql_server_grouping_by_expression() {
    let sql = render("sqlsrv", &request("count", None, "month")).unwrap();
    assert_eq!(
        sql,
        "SELECT FORMAT(users.created_at, 'yyyy-MM') AS [date], count(*) AS aggregate \
         FROM [users] WHERE [users].[created_at] BETWEEN '2024-05-01 00:00:00' AND '2024-05-31 23:59:59' \
         GROUP BY FORMAT(users.created_at, 'yyyy-MM') ORDER BY [date] ASC"
    );

    let sql = render("sqlserver", &request("sum_time", Some("d"), "day")).unwrap();
    assert!(sql.contains("sum(DATEDIFF(second,0,d)) AS aggregate"), "{sql}");
}

#[test]
fn renders_postgres_with_quoted_paths_and_cast() {
    let sql = render("pgsql", &request("sum_time", Some("d"), "day")).unwrap();
    assert_eq!(
        sql,
        "SELECT to_char(\"users\".\"created_at\", 'YYYY-MM-DD') AS \"date\", \
         CAST(sum(EXTRACT(EPOCH FROM \"d\")) AS double precision) AS aggregate \
         FROM \"users\" WHERE \"users\".\"created_at\" BETWEEN '2024-05-01 00:00:00' AND '2024-05-31 23:59:59' \
         GROUP BY \"date\" ORDER BY \"date\" ASC"
    );
}

#[test]
fn running_totals_are_rejected_where_unsupported() {
    for driver in ["pgsql", "postgres", "sqlsrv", "mssql"] {
        for function in ["cumulative", "cumulative_time"] {
            let err = render(driver, &request(function, Some("t"), "day")).unwrap_err();
            assert!(
                matches!(err, BucketflowError::Unsupported { .. }),
                "{driver}/{function}: {err}"
            );
        }
    }
}

#[test]
fn week_is_rejected_on_sql_server_only() {
    let err = render("sqlsrv", &request("count", None, "week")).unwrap_err();
    assert_eq!(err.to_string(), "SQL Server does not support the week interval");

    for driver in ["mysql", "sqlite", "pgsql"] {
        assert!(render(driver, &request("count", None, "week")).is_ok());
    }
}

#[test]
fn unknown_interval_and_driver_fail() {
    let err = render("sqlite", &request("count", None, "fortnight")).unwrap_err();
    assert!(matches!(err, BucketflowError::InvalidInterval(ref s) if s == "fortnight"));

    let err = render("oracle", &request("count", None, "day")).unwrap_err();
    assert!(matches!(err, BucketflowError::UnsupportedDriver(ref d) if d == "oracle"));
}
