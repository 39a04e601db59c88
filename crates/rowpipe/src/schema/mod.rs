//! Runtime schema discovery.
//!
//! Column names and types are not declared anywhere: the first row of every
//! extract query defines them. [`SchemaDiscoverer`] reads that row and fills the
//! job's [`TypeRegistry`], which the loader later uses to bind values.

pub mod discover;
pub mod registry;

pub use discover::{NameCase, SchemaDiscoverer};
pub use registry::{TypeRegistry, TypeSnapshot};
