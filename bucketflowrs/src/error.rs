use thiserror::Error;

pub type Result<T> = std::result::Result<T, BucketflowError>;

#[derive(Debug, Error)]
pub enum BucketflowError {
    #[error("invalid interval: {0}")]
    InvalidInterval(String),
    #[error("{dialect} does not support the {interval} interval")]
    UnsupportedDialectInterval {
        dialect: &'static str,
        interval: &'static str,
    },
    #[error("unsupported database driver: {0}")]
    UnsupportedDriver(String),
    #[error("{dialect} does not support {operation}")]
    Unsupported {
        dialect: &'static str,
        operation: &'static str,
    },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[cfg(feature = "postgres")]
    #[error("postgres pool error: {0}")]
    PostgresPool(#[from] deadpool_postgres::PoolError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
