//! PostgreSQL type names and value conversion.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::core::value::{Param, SqlValue, ValueType};
use crate::error::{EtlError, Result};

pub(crate) type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Canonical type for a PostgreSQL type name (`pg_type.typname`).
pub(crate) fn resolve(native_type: &str) -> Option<ValueType> {
    let ty = match native_type {
        "bool" => ValueType::Bool,
        "int2" => ValueType::I16,
        "int4" => ValueType::I32,
        "int8" => ValueType::I64,
        "float4" => ValueType::F32,
        "float8" => ValueType::F64,
        "numeric" => ValueType::Decimal,
        "text" | "varchar" | "bpchar" | "name" | "citext" => ValueType::Text,
        "bytea" => ValueType::Bytes,
        "uuid" => ValueType::Uuid,
        "json" | "jsonb" => ValueType::Json,
        "date" => ValueType::Date,
        "time" => ValueType::Time,
        "timestamp" => ValueType::Timestamp,
        "timestamptz" => ValueType::TimestampTz,
        _ => return None,
    };
    Some(ty)
}

/// Decode column `idx` of `row` as `ty`.
pub(crate) fn decode(row: &Row, idx: usize, ty: ValueType) -> Result<SqlValue> {
    let value = match ty {
        ValueType::Bool => row.try_get::<_, Option<bool>>(idx)?.into(),
        ValueType::I16 => row.try_get::<_, Option<i16>>(idx)?.into(),
        ValueType::I32 => row.try_get::<_, Option<i32>>(idx)?.into(),
        ValueType::I64 => row.try_get::<_, Option<i64>>(idx)?.into(),
        ValueType::F32 => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(SqlValue::Null, SqlValue::F32),
        ValueType::F64 => row.try_get::<_, Option<f64>>(idx)?.into(),
        ValueType::Decimal => row.try_get::<_, Option<Decimal>>(idx)?.into(),
        ValueType::Text => row.try_get::<_, Option<String>>(idx)?.into(),
        ValueType::Bytes => row.try_get::<_, Option<Vec<u8>>>(idx)?.into(),
        ValueType::Uuid => row.try_get::<_, Option<Uuid>>(idx)?.into(),
        ValueType::Json => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Json),
        ValueType::Date => row.try_get::<_, Option<NaiveDate>>(idx)?.into(),
        ValueType::Time => row.try_get::<_, Option<NaiveTime>>(idx)?.into(),
        ValueType::Timestamp => row.try_get::<_, Option<NaiveDateTime>>(idx)?.into(),
        ValueType::TimestampTz => row
            .try_get::<_, Option<DateTime<FixedOffset>>>(idx)?
            .into(),
    };
    Ok(value)
}

/// Bring a value to the type the server declared for its placeholder.
///
/// Beyond lossless widening, JSON binds to text columns as its serialized
/// form, text binds to JSON columns when it parses, and timestamps without
/// a zone bind to `timestamptz` as UTC.
fn adapt(value: SqlValue, declared: ValueType) -> Option<SqlValue> {
    match (value, declared) {
        (SqlValue::Json(v), ValueType::Text) => Some(SqlValue::Text(v.to_string())),
        (SqlValue::Text(s), ValueType::Json) => serde_json::from_str(&s).ok().map(SqlValue::Json),
        (SqlValue::Timestamp(ts), ValueType::TimestampTz) => {
            Some(SqlValue::TimestampTz(DateTime::<FixedOffset>::from(ts.and_utc())))
        }
        (value, declared) => value.coerce_to(declared),
    }
}

fn typed_null(ty: ValueType) -> BoxedParam {
    match ty {
        ValueType::Bool => Box::new(None::<bool>),
        ValueType::I16 => Box::new(None::<i16>),
        ValueType::I32 => Box::new(None::<i32>),
        ValueType::I64 => Box::new(None::<i64>),
        ValueType::F32 => Box::new(None::<f32>),
        ValueType::F64 => Box::new(None::<f64>),
        ValueType::Decimal => Box::new(None::<Decimal>),
        ValueType::Text => Box::new(None::<String>),
        ValueType::Bytes => Box::new(None::<Vec<u8>>),
        ValueType::Uuid => Box::new(None::<Uuid>),
        ValueType::Json => Box::new(None::<serde_json::Value>),
        ValueType::Date => Box::new(None::<NaiveDate>),
        ValueType::Time => Box::new(None::<NaiveTime>),
        ValueType::Timestamp => Box::new(None::<NaiveDateTime>),
        ValueType::TimestampTz => Box::new(None::<DateTime<FixedOffset>>),
    }
}

/// Convert a bound parameter for a placeholder the server typed `declared`.
///
/// `column` names the parameter in errors.
pub(crate) fn to_pg_param(param: &Param, declared: &Type, column: &str) -> Result<BoxedParam> {
    let target = resolve(declared.name()).unwrap_or(param.ty);
    let value = adapt(param.value.clone(), target).ok_or_else(|| EtlError::TypeMismatch {
        column: column.to_string(),
        expected: declared.name().to_string(),
        actual: param.ty.to_string(),
    })?;

    let boxed: BoxedParam = match value {
        SqlValue::Null => typed_null(target),
        SqlValue::Bool(v) => Box::new(v),
        SqlValue::I16(v) => Box::new(v),
        SqlValue::I32(v) => Box::new(v),
        SqlValue::I64(v) => Box::new(v),
        SqlValue::F32(v) => Box::new(v),
        SqlValue::F64(v) => Box::new(v),
        SqlValue::Decimal(v) => Box::new(v),
        SqlValue::Text(v) => Box::new(v),
        SqlValue::Bytes(v) => Box::new(v),
        SqlValue::Uuid(v) => Box::new(v),
        SqlValue::Json(v) => Box::new(v),
        SqlValue::Date(v) => Box::new(v),
        SqlValue::Time(v) => Box::new(v),
        SqlValue::Timestamp(v) => Box::new(v),
        SqlValue::TimestampTz(v) => Box::new(v),
    };
    Ok(boxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(value: SqlValue) -> Param {
        Param {
            ty: value.value_type().unwrap_or(ValueType::Text),
            value,
        }
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("int8"), Some(ValueType::I64));
        assert_eq!(resolve("bpchar"), Some(ValueType::Text));
        assert_eq!(resolve("jsonb"), Some(ValueType::Json));
        assert_eq!(resolve("timestamptz"), Some(ValueType::TimestampTz));
        assert_eq!(resolve("tsvector"), None);
    }

    #[test]
    fn test_adapt_widens_to_declared_type() {
        assert_eq!(adapt(SqlValue::I32(7), ValueType::I64), Some(SqlValue::I64(7)));
        assert_eq!(adapt(SqlValue::I64(7), ValueType::I32), None);
        assert_eq!(
            adapt(SqlValue::Json(serde_json::json!({"a": 1})), ValueType::Text),
            Some(SqlValue::Text(r#"{"a":1}"#.to_string()))
        );
        assert_eq!(adapt(SqlValue::from("not json"), ValueType::Json), None);
    }

    #[test]
    fn test_naive_timestamp_binds_as_utc() {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        match adapt(SqlValue::Timestamp(ts), ValueType::TimestampTz) {
            Some(SqlValue::TimestampTz(tz)) => {
                assert_eq!(tz.naive_utc(), ts);
                assert_eq!(tz.offset().local_minus_utc(), 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_to_pg_param() {
        let boxed = to_pg_param(&param(SqlValue::I32(7)), &Type::INT8, "ID").unwrap();
        assert_eq!(format!("{:?}", boxed), "7");

        let boxed = to_pg_param(&Param::null(ValueType::I16), &Type::TIMESTAMP, "X").unwrap();
        assert_eq!(format!("{:?}", boxed), "None");

        let err = to_pg_param(&param(SqlValue::I64(1)), &Type::INT4, "QTY").unwrap_err();
        assert!(matches!(err, EtlError::TypeMismatch { ref column, .. } if column == "QTY"));
    }
}
