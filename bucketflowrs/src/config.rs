//! Configuration system for bucketflow.
//!
//! Supports TOML-based configuration with global defaults and per-datasource overrides.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BucketflowError, Result};
use crate::interval::Interval;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BucketflowConfig {
    /// Global defaults applied to all datasources unless overridden.
    pub defaults: GlobalDefaults,

    /// Per-datasource configuration overrides (keyed by datasource name).
    #[serde(default)]
    pub datasources: HashMap<String, DatasourceConfig>,
}

/// Global default settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalDefaults {
    pub query: QueryDefaults,
    pub pool: PoolConfig,
}

/// Defaults for bucket queries that do not set these explicitly.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryDefaults {
    /// Timestamp column grouped on (default: `created_at`).
    pub date_column: String,
    /// Name of the bucket key column (default: `date`).
    pub bucket_alias: String,
    /// Interval used when a request omits one.
    pub interval: Option<Interval>,
}

/// Query settings a datasource replaces; unset fields keep the global value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryOverrides {
    pub date_column: Option<String>,
    pub bucket_alias: Option<String>,
    pub interval: Option<Interval>,
}

impl QueryOverrides {
    fn apply(&self, defaults: &QueryDefaults) -> QueryDefaults {
        QueryDefaults {
            date_column: self
                .date_column
                .clone()
                .unwrap_or_else(|| defaults.date_column.clone()),
            bucket_alias: self
                .bucket_alias
                .clone()
                .unwrap_or_else(|| defaults.bucket_alias.clone()),
            interval: self.interval.or(defaults.interval),
        }
    }
}

/// Connection pooling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum pool size / concurrent executions (default: 16).
    pub size: usize,
}

/// Per-datasource configuration (can override globals).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatasourceConfig {
    pub query: QueryOverrides,
    pub pool: Option<PoolConfig>,

    /// SQLite-specific options.
    pub sqlite: Option<SqliteConfig>,

    /// PostgreSQL-specific options.
    pub postgres: Option<PostgresConfig>,
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file.
    pub path: Option<PathBuf>,
    /// Maximum concurrent queries (overrides pool.size for SQLite).
    pub max_concurrency: Option<usize>,
}

/// PostgreSQL-specific configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Connection string, URL or key-value form.
    pub url: Option<String>,
    /// Connection pool size (default: 16).
    pub pool_size: usize,
    /// Statement timeout in milliseconds (0 = server default).
    pub statement_timeout_ms: u64,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            date_column: "created_at".to_string(),
            bucket_alias: "date".to_string(),
            interval: None,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 16 }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 16,
            statement_timeout_ms: 30_000,
        }
    }
}

impl BucketflowConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| BucketflowError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| BucketflowError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `BUCKETFLOW_CONFIG` environment variable
    /// 2. `./bucketflow.toml` (current directory)
    /// 3. `~/.config/bucketflow/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("BUCKETFLOW_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from BUCKETFLOW_CONFIG");
                    return cfg;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring BUCKETFLOW_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("bucketflow.toml") {
            tracing::info!("loaded config from ./bucketflow.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("bucketflow").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    /// Get resolved config for a specific datasource (merges global defaults).
    pub fn for_datasource(&self, name: &str) -> ResolvedDatasourceConfig {
        ResolvedDatasourceConfig::merge(&self.defaults, self.datasources.get(name))
    }
}

/// Fully resolved configuration for a datasource (no Option fields).
#[derive(Debug, Clone)]
pub struct ResolvedDatasourceConfig {
    pub query: QueryDefaults,
    pub pool: PoolConfig,
    pub sqlite: SqliteConfig,
    pub postgres: PostgresConfig,
}

impl ResolvedDatasourceConfig {
    fn merge(defaults: &GlobalDefaults, override_cfg: Option<&DatasourceConfig>) -> Self {
        match override_cfg {
            Some(ds) => Self {
                query: ds.query.apply(&defaults.query),
                pool: ds.pool.clone().unwrap_or_else(|| defaults.pool.clone()),
                sqlite: ds.sqlite.clone().unwrap_or_default(),
                postgres: ds.postgres.clone().unwrap_or_default(),
            },
            None => Self {
                query: defaults.query.clone(),
                pool: defaults.pool.clone(),
                sqlite: SqliteConfig::default(),
                postgres: PostgresConfig::default(),
            },
        }
    }

    /// Concurrency limit for the SQLite backend.
    pub fn sqlite_concurrency(&self) -> usize {
        self.sqlite.max_concurrency.unwrap_or(self.pool.size)
    }
}
