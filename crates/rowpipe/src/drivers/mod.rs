//! Database driver implementations.
//!
//! - [`mssql`]: Microsoft SQL Server (tiberius + bb8)
//! - [`postgres`]: PostgreSQL (tokio-postgres + deadpool-postgres)
//! - [`memory`]: in-process source and target
//! - [`common`]: shared TLS setup
//!
//! The pipeline only sees [`SourceReader`] and [`TargetWriter`] trait
//! objects; [`connect_source`] and [`connect_target`] pick the driver from
//! the configured database type.

pub mod common;
pub mod memory;
pub mod mssql;
pub mod postgres;

use std::sync::Arc;

pub use common::SslMode;
pub use memory::{MemorySource, MemoryTarget};
pub use mssql::{MssqlReader, MssqlWriter};
pub use postgres::{PostgresReader, PostgresWriter};

use crate::config::{DatabaseConfig, DbType};
use crate::core::traits::{SourceReader, TargetWriter};
use crate::error::Result;
use crate::statement::PlaceholderStyle;

/// Open a reader on the database described by `config`.
pub async fn connect_source(config: &DatabaseConfig) -> Result<Arc<dyn SourceReader>> {
    let reader: Arc<dyn SourceReader> = match config.db_type {
        DbType::Postgres => Arc::new(PostgresReader::connect(config).await?),
        DbType::Mssql => Arc::new(MssqlReader::connect(config).await?),
    };
    Ok(reader)
}

/// Open a writer on the database described by `config`.
pub async fn connect_target(config: &DatabaseConfig) -> Result<Arc<dyn TargetWriter>> {
    let writer: Arc<dyn TargetWriter> = match config.db_type {
        DbType::Postgres => Arc::new(PostgresWriter::connect(config).await?),
        DbType::Mssql => Arc::new(MssqlWriter::connect(config).await?),
    };
    Ok(writer)
}

/// Placeholder syntax of a database type, without connecting.
pub fn placeholder_style(db_type: DbType) -> PlaceholderStyle {
    match db_type {
        DbType::Postgres => PlaceholderStyle::Dollar,
        DbType::Mssql => PlaceholderStyle::AtP,
    }
}
