//! Dummy address data for trying a pipeline out.
//!
//! `seed` creates an `addresses`-style table in the source database and
//! fills it with random rows. The rows go through the regular job runner,
//! fed by an in-memory source, so seeding exercises the same loader path as
//! a real run.

use std::sync::Arc;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{DatabaseConfig, DbType, LoaderConfig};
use crate::core::traits::{ColumnMeta, TargetWriter};
use crate::core::value::SqlValue;
use crate::drivers::{connect_target, MemorySource};
use crate::error::{EtlError, Result};
use crate::pipeline::{Job, JobRunner, RunSummary};

const STREETS: [&str; 5] = ["Main St", "Oak Ave", "Park Rd", "Cedar Ln", "Elm St"];
const CITIES: [&str; 5] = ["Springfield", "Rivertown", "Lakeside", "Hillview", "Maplewood"];
const STATES: [&str; 5] = ["CA", "NY", "TX", "FL", "IL"];
const COUNTRIES: [&str; 5] = ["USA", "Canada", "UK", "Australia", "Germany"];

const COLUMNS: [&str; 5] = ["street_address", "city", "state", "postal_code", "country"];

/// Query text the generated rows are registered under.
const GENERATED_QUERY: &str = "generated addresses";

/// One generated address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

fn pick<R: Rng + ?Sized>(rng: &mut R, choices: &[&str]) -> String {
    choices[rng.gen_range(0..choices.len())].to_string()
}

impl Address {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            street_address: format!("{} {}", rng.gen_range(1..9999), pick(rng, &STREETS)),
            city: pick(rng, &CITIES),
            state: pick(rng, &STATES),
            postal_code: rng.gen_range(10000..99999).to_string(),
            country: pick(rng, &COUNTRIES),
        }
    }

    fn into_values(self) -> Vec<SqlValue> {
        vec![
            self.street_address.into(),
            self.city.into(),
            self.state.into(),
            self.postal_code.into(),
            self.country.into(),
        ]
    }
}

/// Plain identifiers only; the name is spliced into DDL.
fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(EtlError::Config(format!(
            "table name '{}' must be a plain identifier",
            table
        )))
    }
}

/// `CREATE TABLE` for the address table, skipped when it already exists.
pub fn create_table_sql(db_type: DbType, table: &str) -> String {
    match db_type {
        DbType::Postgres => format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id SERIAL PRIMARY KEY, \
             street_address VARCHAR(100), \
             city VARCHAR(50), \
             state VARCHAR(50), \
             postal_code VARCHAR(20), \
             country VARCHAR(50))",
            table
        ),
        DbType::Mssql => format!(
            "IF OBJECT_ID(N'{0}', N'U') IS NULL CREATE TABLE {0} (\
             id INT IDENTITY(1,1) PRIMARY KEY, \
             street_address NVARCHAR(100), \
             city NVARCHAR(50), \
             state NVARCHAR(50), \
             postal_code NVARCHAR(20), \
             country NVARCHAR(50))",
            table
        ),
    }
}

fn insert_sql(table: &str) -> String {
    let placeholders: Vec<String> = COLUMNS.iter().map(|c| format!(":{}", c)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

/// In-memory source holding `rows` random addresses.
pub fn generated_source<R: Rng + ?Sized>(rows: usize, rng: &mut R) -> MemorySource {
    let columns = COLUMNS.iter().map(|c| ColumnMeta::new(*c, "text")).collect();
    let values = (0..rows)
        .map(|_| Address::random(rng).into_values())
        .collect();
    MemorySource::new().with_result(GENERATED_QUERY, columns, values)
}

/// Create `table` through `writer` and load `rows` generated addresses into it.
pub async fn seed_into(
    writer: Arc<dyn TargetWriter>,
    db_type: DbType,
    loader: LoaderConfig,
    rows: usize,
    table: &str,
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    validate_table_name(table)?;
    writer.execute(&create_table_sql(db_type, table)).await?;
    info!("Table {} ready, generating {} addresses", table, rows);

    let source = generated_source(rows, &mut rand::thread_rng());
    let runner = JobRunner::new(Arc::new(source), writer, loader);
    let job = Job::new(format!("seed {}", table), GENERATED_QUERY, insert_sql(table));
    runner.run(&[job], cancel).await
}

/// Seed the source database described by `source`.
pub async fn seed(
    source: &DatabaseConfig,
    loader: LoaderConfig,
    rows: usize,
    table: &str,
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    validate_table_name(table)?;
    let writer = connect_target(source).await?;
    let result = seed_into(writer.clone(), source.db_type, loader, rows, table, cancel).await;
    writer.close().await;
    result
}
