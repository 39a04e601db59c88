//! Helpers shared by the database drivers.

pub mod tls;

pub use tls::{tls_connector, SslMode};
