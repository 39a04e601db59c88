//! In-memory source and target.
//!
//! [`MemorySource`] serves canned result sets keyed by query text, and
//! [`MemoryTarget`] records what would have been written. The seeding command
//! uses the source to feed generated rows through the regular pipeline; tests
//! use both.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::traits::{ColumnMeta, DriverRow, RowSink, SourceReader, TargetWriter};
use crate::core::value::{Param, SqlValue, ValueType};
use crate::error::{EtlError, Result};
use crate::statement::{PlaceholderStyle, WriteStatement};

#[derive(Debug, Clone)]
struct ResultSet {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<SqlValue>>,
    fail_after: Option<usize>,
}

/// Source serving registered result sets.
///
/// Column native types are [`ValueType`] names (`i32`, `text`, `timestamp`, ...).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    results: HashMap<String, ResultSet>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the result of `sql`.
    pub fn with_result(
        mut self,
        sql: impl Into<String>,
        columns: Vec<ColumnMeta>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        self.results.insert(
            sql.into(),
            ResultSet {
                columns,
                rows,
                fail_after: None,
            },
        );
        self
    }

    /// Make `sql` fail after handing over `rows` rows.
    pub fn fail_after(mut self, sql: &str, rows: usize) -> Self {
        if let Some(result) = self.results.get_mut(sql) {
            result.fail_after = Some(rows);
        }
        self
    }
}

struct MemoryRow<'a> {
    columns: &'a [ColumnMeta],
    values: &'a [SqlValue],
}

impl DriverRow for MemoryRow<'_> {
    fn describe(&self) -> Vec<ColumnMeta> {
        self.columns.to_vec()
    }

    fn resolve_type(&self, native_type: &str) -> Option<ValueType> {
        ValueType::from_name(native_type)
    }

    fn decode(&self, idx: usize, _ty: ValueType) -> Result<SqlValue> {
        self.values.get(idx).cloned().ok_or_else(|| {
            EtlError::Source(format!("row has no value at column {}", idx))
        })
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn query(&self, sql: &str, sink: &mut dyn RowSink) -> Result<u64> {
        let result = self.results.get(sql).ok_or_else(|| {
            EtlError::Source(format!("no result registered for query: {}", sql))
        })?;

        let injected = |rows: usize| {
            EtlError::Source(format!("injected failure after {} rows", rows))
        };

        let mut count = 0u64;
        for (i, values) in result.rows.iter().enumerate() {
            if result.fail_after == Some(i) {
                return Err(injected(i));
            }
            let row = MemoryRow {
                columns: &result.columns,
                values,
            };
            sink.accept(&row).await?;
            count += 1;
        }
        if result.fail_after == Some(result.rows.len()) {
            return Err(injected(result.rows.len()));
        }
        Ok(count)
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

#[derive(Debug, Default)]
struct TargetState {
    batches: Vec<Vec<Vec<Param>>>,
    executed_sql: Vec<String>,
    statements: Vec<String>,
    attempts: usize,
}

/// Target that keeps every committed batch in memory.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    state: Mutex<TargetState>,
    fail_on_batch: Option<usize>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th batch (1-based). Nothing from that batch is kept.
    pub fn fail_on_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    /// Committed batches, each a list of bound rows.
    pub fn batches(&self) -> Vec<Vec<Vec<Param>>> {
        self.lock().batches.clone()
    }

    /// Rewritten statement text of every committed batch.
    pub fn executed_sql(&self) -> Vec<String> {
        self.lock().executed_sql.clone()
    }

    /// Statements run through [`TargetWriter::execute`].
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TargetState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }

    async fn execute_batch(&self, statement: &WriteStatement, rows: Vec<Vec<Param>>) -> Result<u64> {
        let mut state = self.lock();
        state.attempts += 1;
        if self.fail_on_batch == Some(state.attempts) {
            return Err(EtlError::Statement(format!(
                "injected failure on batch {}",
                state.attempts
            )));
        }

        let count = rows.len() as u64;
        state.batches.push(rows);
        state.executed_sql.push(statement.sql().to_string());
        Ok(count)
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.lock().statements.push(sql.to_string());
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}
