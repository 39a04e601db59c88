//! SQL Server target writer.

use async_trait::async_trait;
use tiberius::{ColumnData, ToSql};
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::core::traits::TargetWriter;
use crate::core::value::Param;
use crate::error::Result;
use crate::statement::{PlaceholderStyle, WriteStatement};

use super::connection::{checkout, connect_pool, MssqlClient, MssqlPool};
use super::types::param_to_column_data;

/// SQL Server caps an RPC call at 2100 parameters.
const MAX_PARAMS_PER_CALL: usize = 2000;

/// Rows per call when a statement has no parameters.
const MAX_ROWS_PER_CALL: usize = 1000;

/// Executes write statements against SQL Server.
///
/// A batch runs inside one explicit transaction. Rows are stacked into
/// multi-statement `sp_executesql` calls, each row's copy of the statement
/// shifted to its own range of `@Pn` parameters.
pub struct MssqlWriter {
    pool: MssqlPool,
}

impl MssqlWriter {
    /// Connect to the target database described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = connect_pool(config, "target").await?;
        Ok(Self { pool })
    }
}

/// Converted parameter handed to tiberius.
struct MssqlParam(ColumnData<'static>);

impl ToSql for MssqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        self.0.clone()
    }
}

/// Rows that fit in one call for a statement with `params` parameters.
fn rows_per_call(params: usize) -> usize {
    if params == 0 {
        MAX_ROWS_PER_CALL
    } else {
        (MAX_PARAMS_PER_CALL / params).max(1)
    }
}

/// One call's SQL text: the statement repeated for `rows` rows.
fn stacked_sql(statement: &WriteStatement, rows: usize) -> String {
    let params = statement.parameter_count();
    (0..rows)
        .map(|row| {
            let mut sql = statement.render(row * params);
            let trimmed = sql.trim_end().trim_end_matches(';').len();
            sql.truncate(trimmed);
            sql
        })
        .collect::<Vec<_>>()
        .join(";\n")
}

async fn write_rows(
    conn: &mut MssqlClient,
    statement: &WriteStatement,
    rows: &[Vec<Param>],
) -> Result<u64> {
    let mut written = 0u64;
    let per_call = rows_per_call(statement.parameter_count());
    let full_sql = stacked_sql(statement, per_call.min(rows.len()));

    for group in rows.chunks(per_call) {
        let params = group
            .iter()
            .flatten()
            .map(|p| param_to_column_data(p).map(MssqlParam))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        if group.len() == per_call {
            conn.execute(full_sql.as_str(), &refs).await?;
        } else {
            conn.execute(stacked_sql(statement, group.len()), &refs).await?;
        }
        written += group.len() as u64;
    }
    Ok(written)
}

async fn rollback(conn: &mut MssqlClient) -> Result<()> {
    conn.simple_query("ROLLBACK TRANSACTION")
        .await?
        .into_results()
        .await?;
    Ok(())
}

#[async_trait]
impl TargetWriter for MssqlWriter {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::AtP
    }

    async fn execute_batch(&self, statement: &WriteStatement, rows: Vec<Vec<Param>>) -> Result<u64> {
        let mut conn = checkout(&self.pool, "target").await?;

        conn.simple_query("BEGIN TRANSACTION").await?.into_results().await?;
        match write_rows(&mut conn, statement, &rows).await {
            Ok(written) => {
                conn.simple_query("COMMIT TRANSACTION").await?.into_results().await?;
                debug!("Committed {} rows", written);
                Ok(written)
            }
            Err(e) => {
                if let Err(rb) = rollback(&mut conn).await {
                    warn!("Rollback failed: {}", rb);
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let mut conn = checkout(&self.pool, "target").await?;
        conn.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        let mut conn = checkout(&self.pool, "target").await?;
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mssql"
    }

    async fn close(&self) {
        // bb8 handles cleanup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{SqlValue, ValueType};

    use crate::schema::NameCase;

    fn statement(sql: &str) -> WriteStatement {
        WriteStatement::parse(sql, PlaceholderStyle::AtP, NameCase::Upper).unwrap()
    }

    #[test]
    fn test_rows_per_call_stays_under_parameter_limit() {
        assert_eq!(rows_per_call(5), 400);
        assert_eq!(rows_per_call(3), 666);
        assert_eq!(rows_per_call(2500), 1);
        assert_eq!(rows_per_call(0), MAX_ROWS_PER_CALL);
        assert!(rows_per_call(7) * 7 <= 2100);
    }

    #[test]
    fn test_stacked_sql_shifts_parameters_per_row() {
        let stmt = statement("INSERT INTO t (id, name) VALUES (:id, :name);");
        assert_eq!(
            stacked_sql(&stmt, 3),
            "INSERT INTO t (id, name) VALUES (@P1, @P2);\n\
             INSERT INTO t (id, name) VALUES (@P3, @P4);\n\
             INSERT INTO t (id, name) VALUES (@P5, @P6)"
        );
    }

    #[test]
    fn test_stacked_sql_single_row_is_statement() {
        let stmt = statement("UPDATE t SET a = ? WHERE id = ?");
        assert_eq!(stacked_sql(&stmt, 1), stmt.sql());
    }

    #[test]
    fn test_param_wrapper_yields_converted_value() {
        let param = Param {
            ty: ValueType::I64,
            value: SqlValue::I64(42),
        };
        let wrapped = MssqlParam(param_to_column_data(&param).unwrap());
        assert!(matches!(wrapped.to_sql(), ColumnData::I64(Some(42))));
    }
}
