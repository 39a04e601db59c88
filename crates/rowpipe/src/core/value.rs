//! SQL value types for schema-less row transfer.
//!
//! Rows move through the pipeline as [`SqlValue`]s whose shape is only known
//! at runtime. The canonical type of each column is tracked separately as a
//! [`ValueType`] so that NULLs can be bound with the right type on the target.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical value type recorded for a column in the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    Text,
    Bytes,
    Uuid,
    Json,
    Date,
    Time,
    /// Timestamp without timezone. Driver-specific temporal wrappers resolve here.
    Timestamp,
    /// Timestamp with timezone offset.
    #[serde(rename = "timestamptz")]
    TimestampTz,
}

impl ValueType {
    pub const ALL: [ValueType; 15] = [
        ValueType::Bool,
        ValueType::I16,
        ValueType::I32,
        ValueType::I64,
        ValueType::F32,
        ValueType::F64,
        ValueType::Decimal,
        ValueType::Text,
        ValueType::Bytes,
        ValueType::Uuid,
        ValueType::Json,
        ValueType::Date,
        ValueType::Time,
        ValueType::Timestamp,
        ValueType::TimestampTz,
    ];

    /// Look a type up by its [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<ValueType> {
        Self::ALL.iter().copied().find(|ty| ty.name() == name)
    }

    /// Short lowercase name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::Decimal => "decimal",
            ValueType::Text => "text",
            ValueType::Bytes => "bytes",
            ValueType::Uuid => "uuid",
            ValueType::Json => "json",
            ValueType::Date => "date",
            ValueType::Time => "time",
            ValueType::Timestamp => "timestamp",
            ValueType::TimestampTz => "timestamptz",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single database value of dynamic type.
///
/// `Null` carries no type of its own: the binder takes it from the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Runtime type of this value, `None` for NULL.
    #[must_use]
    pub fn value_type(&self) -> Option<ValueType> {
        let ty = match self {
            SqlValue::Null => return None,
            SqlValue::Bool(_) => ValueType::Bool,
            SqlValue::I16(_) => ValueType::I16,
            SqlValue::I32(_) => ValueType::I32,
            SqlValue::I64(_) => ValueType::I64,
            SqlValue::F32(_) => ValueType::F32,
            SqlValue::F64(_) => ValueType::F64,
            SqlValue::Decimal(_) => ValueType::Decimal,
            SqlValue::Text(_) => ValueType::Text,
            SqlValue::Bytes(_) => ValueType::Bytes,
            SqlValue::Uuid(_) => ValueType::Uuid,
            SqlValue::Json(_) => ValueType::Json,
            SqlValue::Date(_) => ValueType::Date,
            SqlValue::Time(_) => ValueType::Time,
            SqlValue::Timestamp(_) => ValueType::Timestamp,
            SqlValue::TimestampTz(_) => ValueType::TimestampTz,
        };
        Some(ty)
    }

    /// Convert this value to `target` if that loses nothing.
    ///
    /// NULL converts to any type. Integers widen to larger integers and to
    /// decimal, floats widen to f64 and to decimal. Returns `None` otherwise.
    #[must_use]
    pub fn coerce_to(self, target: ValueType) -> Option<SqlValue> {
        if self.value_type().map_or(true, |ty| ty == target) {
            return Some(self);
        }

        match (self, target) {
            (SqlValue::I16(v), ValueType::I32) => Some(SqlValue::I32(v.into())),
            (SqlValue::I16(v), ValueType::I64) => Some(SqlValue::I64(v.into())),
            (SqlValue::I32(v), ValueType::I64) => Some(SqlValue::I64(v.into())),
            (SqlValue::I16(v), ValueType::Decimal) => Some(SqlValue::Decimal(v.into())),
            (SqlValue::I32(v), ValueType::Decimal) => Some(SqlValue::Decimal(v.into())),
            (SqlValue::I64(v), ValueType::Decimal) => Some(SqlValue::Decimal(v.into())),
            (SqlValue::F32(v), ValueType::F64) => Some(SqlValue::F64(v.into())),
            (SqlValue::F32(v), ValueType::Decimal) => {
                Decimal::try_from(v).ok().map(SqlValue::Decimal)
            }
            (SqlValue::F64(v), ValueType::Decimal) => {
                Decimal::try_from(v).ok().map(SqlValue::Decimal)
            }
            _ => None,
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::I16(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<DateTime<FixedOffset>> for SqlValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        SqlValue::TimestampTz(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// A value ready to bind, paired with the type it must be bound as.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Declared type from the type registry.
    pub ty: ValueType,
    /// Value, either NULL or of type `ty`.
    pub value: SqlValue,
}

impl Param {
    /// Typed NULL.
    pub fn null(ty: ValueType) -> Self {
        Self {
            ty,
            value: SqlValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_of_null() {
        assert_eq!(SqlValue::Null.value_type(), None);
        assert_eq!(SqlValue::I32(1).value_type(), Some(ValueType::I32));
        assert!(SqlValue::Null.is_null());
    }

    #[test]
    fn test_coerce_same_type_and_null() {
        assert_eq!(
            SqlValue::Text("a".into()).coerce_to(ValueType::Text),
            Some(SqlValue::Text("a".into()))
        );
        assert_eq!(SqlValue::Null.coerce_to(ValueType::Uuid), Some(SqlValue::Null));
    }

    #[test]
    fn test_coerce_widening() {
        assert_eq!(SqlValue::I16(7).coerce_to(ValueType::I64), Some(SqlValue::I64(7)));
        assert_eq!(SqlValue::I32(-3).coerce_to(ValueType::I64), Some(SqlValue::I64(-3)));
        assert_eq!(SqlValue::F32(1.5).coerce_to(ValueType::F64), Some(SqlValue::F64(1.5)));
        assert_eq!(
            SqlValue::I64(42).coerce_to(ValueType::Decimal),
            Some(SqlValue::Decimal(Decimal::from(42)))
        );
    }

    #[test]
    fn test_coerce_rejects_narrowing_and_cross_kind() {
        assert_eq!(SqlValue::I64(1).coerce_to(ValueType::I32), None);
        assert_eq!(SqlValue::Text("1".into()).coerce_to(ValueType::I32), None);
        assert_eq!(SqlValue::F64(f64::NAN).coerce_to(ValueType::Decimal), None);
    }

    #[test]
    fn test_from_name_matches_name() {
        for ty in ValueType::ALL {
            assert_eq!(ValueType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(ValueType::from_name("varchar"), None);
    }

    #[test]
    fn test_from_option() {
        let v: SqlValue = Some(5i32).into();
        assert_eq!(v, SqlValue::I32(5));
        let v: SqlValue = None::<String>.into();
        assert_eq!(v, SqlValue::Null);
    }
}
