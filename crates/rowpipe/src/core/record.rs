//! Extracted rows as ordered name→value records.

use std::sync::Arc;

use super::value::SqlValue;

/// One extracted row.
///
/// Column names are normalized and shared by every record of the same query,
/// so a record only owns its values. Column order is discovery order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Record {
    /// Create a record. `values` must be in the same order as `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Normalized column names in discovery order.
    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    /// Values in discovery order.
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Number of name→value entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of a column by normalized name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of a column by normalized name.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.position(name).map(|idx| &self.values[idx])
    }

    /// Iterate `(name, value)` pairs in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Arc<[String]> {
        Arc::from(vec!["ID".to_string(), "NAME".to_string()])
    }

    #[test]
    fn test_lookup_by_name() {
        let record = Record::new(header(), vec![SqlValue::I32(1), SqlValue::from("alice")]);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("NAME"), Some(&SqlValue::Text("alice".into())));
        assert_eq!(record.get("name"), None);
        assert_eq!(record.position("ID"), Some(0));
    }

    #[test]
    fn test_iter_keeps_discovery_order() {
        let record = Record::new(header(), vec![SqlValue::I32(1), SqlValue::Null]);
        let names: Vec<&str> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["ID", "NAME"]);
    }

    #[test]
    fn test_records_share_header() {
        let columns = header();
        let a = Record::new(columns.clone(), vec![SqlValue::I32(1), SqlValue::Null]);
        let b = Record::new(columns, vec![SqlValue::I32(2), SqlValue::Null]);
        assert!(Arc::ptr_eq(a.columns(), b.columns()));
    }
}
