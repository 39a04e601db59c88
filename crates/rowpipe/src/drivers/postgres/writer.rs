//! PostgreSQL target writer.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use futures::future::try_join_all;
use tokio_postgres::types::ToSql;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::core::traits::TargetWriter;
use crate::core::value::Param;
use crate::error::Result;
use crate::statement::{PlaceholderStyle, WriteStatement};

use super::connection::{checkout, connect_pool};
use super::types::{to_pg_param, BoxedParam};

/// Executes write statements against PostgreSQL.
///
/// The statement is prepared once per connection (`prepare_cached`). A batch
/// runs in one transaction with the row executions pipelined on the
/// connection.
pub struct PostgresWriter {
    pool: Pool,
}

impl PostgresWriter {
    /// Connect to the target database described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = connect_pool(config, "target").await?;
        Ok(Self { pool })
    }
}

/// Parameter label for errors: `:NAME` for named statements, `$n` otherwise.
fn param_label(statement: &WriteStatement, idx: usize) -> String {
    match statement.parameters().get(idx) {
        Some(name) => format!(":{}", name),
        None => format!("${}", idx + 1),
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }

    async fn execute_batch(&self, statement: &WriteStatement, rows: Vec<Vec<Param>>) -> Result<u64> {
        let mut client = checkout(&self.pool, "target").await?;
        let tx = client.transaction().await?;
        let prepared = tx.prepare_cached(statement.sql()).await?;
        let declared = prepared.params();

        let bound = rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(declared)
                    .enumerate()
                    .map(|(idx, (param, ty))| to_pg_param(param, ty, &param_label(statement, idx)))
                    .collect::<Result<Vec<BoxedParam>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let tx_ref = &tx;
        let prepared_ref = &prepared;
        let executions = bound.iter().map(|params| {
            let refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            async move { tx_ref.execute(prepared_ref, &refs).await }
        });
        let affected: u64 = try_join_all(executions).await?.into_iter().sum();

        tx.commit().await?;
        debug!("Committed {} rows ({} affected)", rows.len(), affected);
        Ok(rows.len() as u64)
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let client = checkout(&self.pool, "target").await?;
        client.batch_execute(sql).await?;
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        let client = checkout(&self.pool, "target").await?;
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
