//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::NameCase;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database rows are extracted from.
    pub source: DatabaseConfig,

    /// Database rows are written to.
    pub target: DatabaseConfig,

    /// Loader behavior.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Jobs, run in order.
    pub jobs: Vec<JobConfig>,
}

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "sqlserver")]
    Mssql,
}

impl DbType {
    /// Default listening port of the engine.
    pub fn default_port(&self) -> u16 {
        match self {
            DbType::Postgres => 5432,
            DbType::Mssql => 1433,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Postgres => "postgres",
            DbType::Mssql => "mssql",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings for one database.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database engine.
    #[serde(rename = "type")]
    pub db_type: DbType,

    /// Database host.
    pub host: String,

    /// Database port (default depends on `type`).
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// PostgreSQL SSL mode: disable, require, verify-ca, verify-full (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,

    /// SQL Server: encrypt the connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// SQL Server: accept any server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Pool size (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection (default: 15).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Configured port, or the engine default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.db_type.default_port())
    }

    /// `host:port/database`, for logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port(), self.database)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Batch loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Rows per batch write (default: 2000).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Row channel capacity. Unset means unbounded.
    #[serde(default)]
    pub channel_capacity: Option<usize>,

    /// Log progress every this many rows (default: 10000).
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Case folding for column and parameter names (default: upper).
    #[serde(default)]
    pub column_case: NameCase,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            channel_capacity: None,
            progress_interval: default_progress_interval(),
            column_case: NameCase::default(),
        }
    }
}

/// One extract/write pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name, used in logs.
    pub name: String,

    /// Query run against the source.
    pub extract: String,

    /// Statement executed against the target for every extracted row.
    pub write: String,
}

fn default_require() -> String {
    "require".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_chunk_size() -> usize {
    2000
}

fn default_progress_interval() -> u64 {
    10_000
}
