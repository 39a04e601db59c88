//! PostgreSQL driver.
//!
//! Both sides share a deadpool-postgres pool set up with the configured
//! `ssl_mode`. Placeholders are `$1..$n`.

mod connection;
mod reader;
mod types;
mod writer;

pub use reader::PostgresReader;
pub use writer::PostgresWriter;
