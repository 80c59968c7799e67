pub mod aggregate;
pub mod backends;
pub mod calendar;
pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod interval;
pub mod merge;
pub mod runtime;
pub mod sql_ast;

pub use aggregate::{AggregateQuery, Operation};
pub use backends::{BackendConnection, ConnectionManager};
#[cfg(feature = "postgres")]
pub use backends::PostgresConnection;
#[cfg(feature = "sqlite")]
pub use backends::SqliteConnection;
pub use config::BucketflowConfig;
pub use dialect::{dialect_for_driver, Dialect, DialectKind};
pub use error::BucketflowError;
pub use executor::QueryResult;
pub use interval::Interval;
pub use merge::{AggregationMode, BucketRow};
pub use runtime::{render_request, run_request, AggregateRequest};
pub use sql_ast::{AggregateFunction, Filter, FilterOp};
