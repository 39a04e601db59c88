//! Runtime schema discovery for result sets.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::record::Record;
use crate::core::traits::DriverRow;
use crate::core::value::{SqlValue, ValueType};
use crate::error::{EtlError, Result};

use super::registry::TypeRegistry;

/// Case folding applied to every column name and named parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCase {
    #[default]
    Upper,
    Lower,
}

impl NameCase {
    /// Normalize a name.
    pub fn apply(&self, name: &str) -> String {
        match self {
            NameCase::Upper => name.to_uppercase(),
            NameCase::Lower => name.to_lowercase(),
        }
    }
}

/// Columns of the result set currently being read.
#[derive(Debug)]
struct ResultHeader {
    names: Arc<[String]>,
    types: Vec<ValueType>,
}

/// Turns driver rows into [`Record`]s, discovering the schema on the first row.
///
/// The first row of a result set fixes its column names and types; later rows
/// reuse that header. Types go through the shared [`TypeRegistry`], so a name
/// already known to the job is never resolved again.
pub struct SchemaDiscoverer {
    registry: Arc<TypeRegistry>,
    case: NameCase,
    header: Option<ResultHeader>,
}

impl SchemaDiscoverer {
    pub fn new(registry: Arc<TypeRegistry>, case: NameCase) -> Self {
        Self {
            registry,
            case,
            header: None,
        }
    }

    /// Forget the current result set so the next row is discovered again.
    ///
    /// Registry entries are kept.
    pub fn reset(&mut self) {
        self.header = None;
    }

    /// Build a record from one driver row.
    pub fn map_row(&mut self, row: &dyn DriverRow) -> Result<Record> {
        let header = match self.header.take() {
            Some(header) => header,
            None => self.discover(row)?,
        };

        let values = header
            .names
            .iter()
            .zip(header.types.iter())
            .enumerate()
            .map(|(idx, (name, ty))| canonical(name, *ty, row.decode(idx, *ty)?))
            .collect::<Result<Vec<_>>>();

        let record = values.map(|values| Record::new(header.names.clone(), values));
        self.header = Some(header);
        record
    }

    fn discover(&self, row: &dyn DriverRow) -> Result<ResultHeader> {
        let columns = row.describe();
        let mut seen = HashSet::with_capacity(columns.len());
        let mut names = Vec::with_capacity(columns.len());
        let mut types = Vec::with_capacity(columns.len());

        for column in &columns {
            let name = self.case.apply(column.display_name());
            if !seen.insert(name.clone()) {
                return Err(EtlError::DuplicateColumn { column: name });
            }

            let ty = self.registry.get_or_insert_with(&name, || {
                let ty = row.resolve_type(&column.native_type).ok_or_else(|| {
                    EtlError::TypeResolution {
                        column: name.clone(),
                        native_type: column.native_type.clone(),
                    }
                })?;
                info!("Add {} type: {} ({})", name, ty, column.native_type);
                Ok(ty)
            })?;

            names.push(name);
            types.push(ty);
        }

        Ok(ResultHeader {
            names: Arc::from(names),
            types,
        })
    }
}

/// Check a decoded value against its column type, widening where lossless.
fn canonical(column: &str, ty: ValueType, value: SqlValue) -> Result<SqlValue> {
    let actual = value.value_type();
    value.coerce_to(ty).ok_or_else(|| EtlError::TypeMismatch {
        column: column.to_string(),
        expected: ty.to_string(),
        actual: actual.map_or("null", |t| t.name()).to_string(),
    })
}
