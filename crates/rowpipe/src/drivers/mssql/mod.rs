//! Microsoft SQL Server driver.
//!
//! - [`MssqlReader`]: streams extract queries through a bb8 pool of tiberius clients
//! - [`MssqlWriter`]: executes write statements with `@Pn` placeholders

mod connection;
mod reader;
mod types;
mod writer;

pub use connection::TiberiusConnectionManager;
pub use reader::MssqlReader;
pub use writer::MssqlWriter;
