//! SQL Server source reader.

use async_trait::async_trait;
use futures::TryStreamExt;
use tiberius::{QueryItem, Row};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::core::traits::{ColumnMeta, DriverRow, RowSink, SourceReader};
use crate::core::value::{SqlValue, ValueType};
use crate::error::{EtlError, Result};

use super::connection::{checkout, connect_pool, MssqlPool};
use super::types;

/// Streams extract queries from SQL Server.
///
/// Queries go out as plain batches (`simple_query`), so any T-SQL the
/// server accepts works as long as its first result set is the data.
pub struct MssqlReader {
    pool: MssqlPool,
}

impl MssqlReader {
    /// Connect to the source database described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = connect_pool(config, "source").await?;
        Ok(Self { pool })
    }
}

/// One tiberius row seen through [`DriverRow`].
pub(crate) struct MssqlRow {
    row: Row,
}

impl MssqlRow {
    pub(crate) fn new(row: Row) -> Self {
        Self { row }
    }
}

impl DriverRow for MssqlRow {
    fn describe(&self) -> Vec<ColumnMeta> {
        self.row
            .cells()
            .map(|(column, first)| {
                ColumnMeta::new(
                    column.name(),
                    types::native_type_name(column.column_type(), first),
                )
            })
            .collect()
    }

    fn resolve_type(&self, native_type: &str) -> Option<ValueType> {
        types::resolve(native_type)
    }

    fn decode(&self, idx: usize, _ty: ValueType) -> Result<SqlValue> {
        let (_, data) = self.row.cells().nth(idx).ok_or_else(|| {
            EtlError::Source(format!("row has no value at column {}", idx))
        })?;
        types::cell_to_value(data)
    }
}

#[async_trait]
impl SourceReader for MssqlReader {
    async fn query(&self, sql: &str, sink: &mut dyn RowSink) -> Result<u64> {
        let mut conn = checkout(&self.pool, "source").await?;
        let mut stream = conn.simple_query(sql).await?;

        let mut count = 0u64;
        while let Some(item) = stream.try_next().await? {
            match item {
                QueryItem::Metadata(meta) if meta.result_index() > 0 => {
                    debug!("Ignoring result set {} of extract query", meta.result_index());
                    break;
                }
                QueryItem::Metadata(_) => {}
                QueryItem::Row(row) => {
                    sink.accept(&MssqlRow::new(row)).await?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    async fn test_connection(&self) -> Result<()> {
        let mut conn = checkout(&self.pool, "source").await?;
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mssql"
    }

    async fn close(&self) {
        // bb8 pools close when dropped
    }
}
