//! Core traits for schema-less data transfer.
//!
//! This module defines the seams between the pipeline and the database drivers:
//!
//! - [`DriverRow`]: one row of a result set, as the driver sees it
//! - [`RowSink`]: receives rows from a driver while a query streams
//! - [`SourceReader`]: runs extract queries against the source database
//! - [`TargetWriter`]: executes batches of bound rows against the target database
//!
//! Readers and writers are used through `Arc<dyn _>` so that the same pipeline
//! drives PostgreSQL, SQL Server and the in-memory driver.

use async_trait::async_trait;

use crate::error::Result;
use crate::statement::{PlaceholderStyle, WriteStatement};

use super::value::{Param, SqlValue, ValueType};

/// Column metadata reported by a driver for one result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Underlying column name.
    pub name: String,
    /// Alias from the select list, when the driver reports one separately.
    pub label: Option<String>,
    /// Driver-specific type name (e.g. `int4`, `datetime2`).
    pub native_type: String,
}

impl ColumnMeta {
    /// Create column metadata without an alias.
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            native_type: native_type.into(),
        }
    }

    /// Set the alias.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Effective display name: the alias if present, else the column name.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// One row of a result set, before schema discovery.
pub trait DriverRow: Send + Sync {
    /// Describe the columns of the result set this row belongs to.
    ///
    /// Only called for the first row of a query.
    fn describe(&self) -> Vec<ColumnMeta>;

    /// Map a driver type name to its canonical value type.
    ///
    /// Driver-private temporal wrappers map to [`ValueType::Timestamp`].
    fn resolve_type(&self, native_type: &str) -> Option<ValueType>;

    /// Decode the value at `idx` as `ty`, unwrapping driver temporal wrappers.
    fn decode(&self, idx: usize, ty: ValueType) -> Result<SqlValue>;
}

/// Receives rows from a driver while a query streams.
#[async_trait]
pub trait RowSink: Send {
    /// Handle one row. An error stops the query.
    async fn accept(&mut self, row: &dyn DriverRow) -> Result<()>;
}

/// Read rows from a source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Run `sql` and hand every row of its first result set to `sink`.
    ///
    /// Returns the number of rows handed over.
    async fn query(&self, sql: &str, sink: &mut dyn RowSink) -> Result<u64>;

    /// Check that a connection can be obtained and used.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mssql", "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Write rows to a target database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Placeholder syntax the write statement is rewritten to.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Execute one chunk of bound rows as a single atomic batch.
    ///
    /// Each inner vector holds the parameters of one row in placeholder order.
    /// Returns the number of rows written.
    async fn execute_batch(&self, statement: &WriteStatement, rows: Vec<Vec<Param>>)
        -> Result<u64>;

    /// Execute a statement without parameters (DDL and the like).
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Check that a connection can be obtained and used.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mssql", "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_label() {
        let col = ColumnMeta::new("customer_id", "int4");
        assert_eq!(col.display_name(), "customer_id");

        let col = col.with_label("id");
        assert_eq!(col.display_name(), "id");
    }
}
