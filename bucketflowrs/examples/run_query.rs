use std::{fs, path::Path, sync::Arc};

use bucketflow::{run_request, AggregateRequest, ConnectionManager, SqliteConnection};
use tracing_subscriber::EnvFilter;

fn bootstrap_sqlite(path: &Path) -> anyhow::Result<()> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch(
        "
        CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT,
            created_at TEXT
        );
        CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            amount REAL,
            status TEXT,
            created_at TEXT
        );
        INSERT INTO users (name, created_at) VALUES
            ('Alice', '2024-01-04 09:12:00'),
            ('Bob', '2024-01-20 17:40:00'),
            ('Carla', '2024-03-02 08:00:00'),
            ('Dmitri', '2024-06-30 23:00:00');
        INSERT INTO orders (amount, status, created_at) VALUES
            (100.0, 'paid', '2024-03-01 10:00:00'),
            (50.0, 'paid', '2024-03-03 11:30:00'),
            (75.0, 'refunded', '2024-03-03 12:00:00'),
            (25.0, 'paid', '2024-03-06 15:45:00');
        ",
    )?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let db_path = Path::new("examples/demo.sqlite");
    if db_path.exists() {
        fs::remove_file(db_path)?;
    }
    bootstrap_sqlite(db_path)?;

    let mut connections = ConnectionManager::new();
    connections.insert("demo", Arc::new(SqliteConnection::new(db_path)));

    for request_path in [
        "examples/requests/monthly_signups.json",
        "examples/requests/daily_running_total.json",
    ] {
        let request: AggregateRequest = serde_json::from_str(&fs::read_to_string(request_path)?)?;
        let series = run_request(&connections, &request).await?;
        println!("{request_path}: {} buckets", series.len());
        for row in series {
            println!("  {}  {:?}", row.date, row.aggregate);
        }
    }
    Ok(())
}
