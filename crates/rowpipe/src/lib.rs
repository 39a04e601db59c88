//! # rowpipe
//!
//! Streaming database-to-database ETL with runtime schema discovery.
//!
//! A job is an extract query run against the source database and a write
//! statement run against the target for every row. Nothing about the shape
//! of the rows is declared up front:
//!
//! - **Schema discovery** learns column names and canonical types from the
//!   first row of each result set
//! - **Streaming** rows flow through a channel from the extractor task to
//!   the loader, so a result set is never held in memory
//! - **Chunked batches** the loader writes `chunk_size` rows per transaction
//! - **Typed binding** NULLs are bound with the type discovered for their column
//!
//! PostgreSQL and SQL Server are supported on either side.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rowpipe::{connect_source, connect_target, select_jobs, Config, JobRunner};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> rowpipe::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let source = connect_source(&config.source).await?;
//! let target = connect_target(&config.target).await?;
//!
//! let jobs = select_jobs(&config.jobs, &[])?;
//! let runner = JobRunner::new(source, target, config.loader.clone());
//! let summary = runner.run(&jobs, &CancellationToken::new()).await?;
//! println!("Loaded {} rows", summary.total_rows);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod seed;
pub mod statement;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, DbType, JobConfig, LoaderConfig};
pub use crate::core::{Record, SqlValue, ValueType};
pub use drivers::{connect_source, connect_target, placeholder_style};
pub use error::{EtlError, Result};
pub use pipeline::{select_jobs, HealthCheckResult, Job, JobRunner, JobStats, RunSummary};
pub use schema::{NameCase, TypeRegistry};
pub use statement::{PlaceholderStyle, WriteStatement};
