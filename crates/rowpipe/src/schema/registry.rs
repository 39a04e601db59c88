//! Per-job registry of column name → canonical value type.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::value::ValueType;
use crate::error::Result;

/// Column types discovered during extraction of one job.
///
/// The extractor writes, the loader reads, both concurrently. Entries are only
/// ever added: the first type recorded for a name is kept for the rest of the
/// job. The extractor records a column before sending any record that carries
/// it, and the row channel orders that write before the loader's read.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<HashMap<String, ValueType>>,
}

/// Immutable copy of the registry taken by the loader for one chunk.
pub type TypeSnapshot = Arc<HashMap<String, ValueType>>;

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type recorded for `name`, if any.
    pub fn get(&self, name: &str) -> Option<ValueType> {
        self.read().get(name).copied()
    }

    /// Return the recorded type for `name`, resolving and recording it first if
    /// the name has not been seen yet.
    ///
    /// `resolve` runs at most once per distinct name for the registry's lifetime.
    pub fn get_or_insert_with<F>(&self, name: &str, resolve: F) -> Result<ValueType>
    where
        F: FnOnce() -> Result<ValueType>,
    {
        if let Some(ty) = self.get(name) {
            return Ok(ty);
        }

        let mut types = self.write();
        if let Some(ty) = types.get(name) {
            return Ok(*ty);
        }
        let ty = resolve()?;
        types.insert(name.to_string(), ty);
        Ok(ty)
    }

    /// Number of distinct names recorded.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy the current contents.
    pub fn snapshot(&self) -> TypeSnapshot {
        Arc::new(self.read().clone())
    }

    // A poisoned lock still holds a consistent map: entries are inserted whole.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ValueType>> {
        self.types.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ValueType>> {
        self.types.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;

    #[test]
    fn test_first_occurrence_wins() {
        let registry = TypeRegistry::new();
        let ty = registry
            .get_or_insert_with("ID", || Ok(ValueType::I32))
            .unwrap();
        assert_eq!(ty, ValueType::I32);

        let ty = registry
            .get_or_insert_with("ID", || Ok(ValueType::Text))
            .unwrap();
        assert_eq!(ty, ValueType::I32);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failed_resolution_records_nothing() {
        let registry = TypeRegistry::new();
        let err = registry
            .get_or_insert_with("X", || {
                Err(EtlError::TypeResolution {
                    column: "X".into(),
                    native_type: "sql_variant".into(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, EtlError::TypeResolution { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = TypeRegistry::new();
        registry
            .get_or_insert_with("A", || Ok(ValueType::Bool))
            .unwrap();
        let snapshot = registry.snapshot();
        registry
            .get_or_insert_with("B", || Ok(ValueType::Date))
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("A"), Some(&ValueType::Bool));
        assert_eq!(registry.get("B"), Some(ValueType::Date));
    }
}
