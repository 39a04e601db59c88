//! PostgreSQL source reader.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use futures::TryStreamExt;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::config::DatabaseConfig;
use crate::core::traits::{ColumnMeta, DriverRow, RowSink, SourceReader};
use crate::core::value::{SqlValue, ValueType};
use crate::error::{EtlError, Result};

use super::connection::{checkout, connect_pool};
use super::types;

/// Streams extract queries from PostgreSQL.
///
/// Rows are pulled with `query_raw`, so the result set is never buffered
/// client side.
pub struct PostgresReader {
    pool: Pool,
}

impl PostgresReader {
    /// Connect to the source database described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = connect_pool(config, "source").await?;
        Ok(Self { pool })
    }
}

pub(crate) struct PgRow {
    row: Row,
}

impl DriverRow for PgRow {
    fn describe(&self) -> Vec<ColumnMeta> {
        self.row
            .columns()
            .iter()
            .map(|c| ColumnMeta::new(c.name(), c.type_().name()))
            .collect()
    }

    fn resolve_type(&self, native_type: &str) -> Option<ValueType> {
        types::resolve(native_type)
    }

    fn decode(&self, idx: usize, ty: ValueType) -> Result<SqlValue> {
        let column = self.row.columns().get(idx).ok_or_else(|| {
            EtlError::Source(format!("row has no value at column {}", idx))
        })?;
        // Decode with the column's own type; the discoverer widens to `ty`.
        let own = types::resolve(column.type_().name()).unwrap_or(ty);
        types::decode(&self.row, idx, own)
    }
}

#[async_trait]
impl SourceReader for PostgresReader {
    async fn query(&self, sql: &str, sink: &mut dyn RowSink) -> Result<u64> {
        let client = checkout(&self.pool, "source").await?;
        let stream = client
            .query_raw(sql, std::iter::empty::<&(dyn ToSql + Sync)>())
            .await?;
        futures::pin_mut!(stream);

        let mut count = 0u64;
        while let Some(row) = stream.try_next().await? {
            sink.accept(&PgRow { row }).await?;
            count += 1;
        }
        Ok(count)
    }

    async fn test_connection(&self) -> Result<()> {
        let client = checkout(&self.pool, "source").await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}
