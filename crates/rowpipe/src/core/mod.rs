//! Core abstractions for schema-less transfer.
//!
//! - [`value`]: dynamic SQL values and their canonical types
//! - [`record`]: extracted rows as ordered name→value records
//! - [`traits`]: driver seams for reading and writing

pub mod record;
pub mod traits;
pub mod value;

pub use record::Record;
pub use traits::{ColumnMeta, DriverRow, RowSink, SourceReader, TargetWriter};
pub use value::{Param, SqlValue, ValueType};
