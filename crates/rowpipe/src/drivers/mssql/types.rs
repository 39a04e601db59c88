//! SQL Server type names and value conversion.

use std::borrow::Cow;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, ColumnType, FromSql};

use crate::core::value::{Param, SqlValue, ValueType};
use crate::error::{EtlError, Result};

/// Type name of a column as SQL Server spells it.
///
/// Nullable fixed-width columns (`intn`, `floatn`, ...) only carry their
/// width on the value, so `first` is the column's cell in the first row. A
/// NULL there gives the widest member of the family.
pub(crate) fn native_type_name(ty: ColumnType, first: &ColumnData<'_>) -> &'static str {
    match ty {
        ColumnType::Null => "null",
        ColumnType::Bit | ColumnType::Bitn => "bit",
        ColumnType::Int1 => "tinyint",
        ColumnType::Int2 => "smallint",
        ColumnType::Int4 => "int",
        ColumnType::Int8 => "bigint",
        ColumnType::Intn => match first {
            ColumnData::U8(_) => "tinyint",
            ColumnData::I16(_) => "smallint",
            ColumnData::I32(_) => "int",
            _ => "bigint",
        },
        ColumnType::Float4 => "real",
        ColumnType::Float8 => "float",
        ColumnType::Floatn => match first {
            ColumnData::F32(Some(_)) => "real",
            _ => "float",
        },
        ColumnType::Money => "money",
        ColumnType::Money4 => "smallmoney",
        ColumnType::Decimaln => "decimal",
        ColumnType::Numericn => "numeric",
        ColumnType::Guid => "uniqueidentifier",
        ColumnType::Datetime => "datetime",
        ColumnType::Datetime4 => "smalldatetime",
        ColumnType::Datetimen => match first {
            ColumnData::SmallDateTime(Some(_)) => "smalldatetime",
            _ => "datetime",
        },
        ColumnType::Daten => "date",
        ColumnType::Timen => "time",
        ColumnType::Datetime2 => "datetime2",
        ColumnType::DatetimeOffsetn => "datetimeoffset",
        ColumnType::BigVarChar => "varchar",
        ColumnType::BigChar => "char",
        ColumnType::NVarchar => "nvarchar",
        ColumnType::NChar => "nchar",
        ColumnType::Text => "text",
        ColumnType::NText => "ntext",
        ColumnType::Xml => "xml",
        ColumnType::BigVarBin => "varbinary",
        ColumnType::BigBinary => "binary",
        ColumnType::Image => "image",
        ColumnType::Udt => "udt",
        ColumnType::SSVariant => "sql_variant",
    }
}

/// Canonical type for a SQL Server type name.
pub(crate) fn resolve(native_type: &str) -> Option<ValueType> {
    let ty = match native_type.to_lowercase().as_str() {
        "bit" => ValueType::Bool,
        "tinyint" | "smallint" => ValueType::I16,
        "int" => ValueType::I32,
        "bigint" => ValueType::I64,
        "real" => ValueType::F32,
        "float" => ValueType::F64,
        "decimal" | "numeric" | "money" | "smallmoney" => ValueType::Decimal,
        "uniqueidentifier" => ValueType::Uuid,
        "date" => ValueType::Date,
        "time" => ValueType::Time,
        "datetime" | "smalldatetime" | "datetime2" => ValueType::Timestamp,
        "datetimeoffset" => ValueType::TimestampTz,
        "char" | "varchar" | "nchar" | "nvarchar" | "text" | "ntext" | "xml" => ValueType::Text,
        "binary" | "varbinary" | "image" => ValueType::Bytes,
        _ => return None,
    };
    Some(ty)
}

/// Decode one cell. The legacy `datetime`/`smalldatetime` wrappers come out
/// as plain timestamps.
pub(crate) fn cell_to_value(data: &ColumnData<'static>) -> Result<SqlValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(i16::from).into(),
        ColumnData::I16(v) => (*v).into(),
        ColumnData::I32(v) => (*v).into(),
        ColumnData::I64(v) => (*v).into(),
        ColumnData::F32(v) => v.map_or(SqlValue::Null, SqlValue::F32),
        ColumnData::F64(v) => (*v).into(),
        ColumnData::Bit(v) => (*v).into(),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()).into(),
        ColumnData::Guid(v) => (*v).into(),
        ColumnData::Binary(v) => v.as_ref().map(|b| b.to_vec()).into(),
        ColumnData::Numeric(v) => match v {
            Some(n) => SqlValue::Decimal(numeric_to_decimal(n)?),
            None => SqlValue::Null,
        },
        ColumnData::Xml(v) => v.as_ref().map(|xml| (**xml).clone().into_string()).into(),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.into()
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?.into(),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?.into(),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)?.into(),
    };
    Ok(value)
}

fn numeric_to_decimal(n: &Numeric) -> Result<Decimal> {
    Decimal::try_from_i128_with_scale(n.value(), u32::from(n.scale())).map_err(|e| {
        EtlError::Mssql(tiberius::error::Error::Conversion(
            format!(
                "numeric {} (scale {}) out of decimal range: {}",
                n.value(),
                n.scale(),
                e
            )
            .into(),
        ))
    })
}

/// Typed NULL for a declared parameter type.
fn null_column_data(ty: ValueType) -> ColumnData<'static> {
    match ty {
        ValueType::Bool => ColumnData::Bit(None),
        ValueType::I16 => ColumnData::I16(None),
        ValueType::I32 => ColumnData::I32(None),
        ValueType::I64 => ColumnData::I64(None),
        ValueType::F32 => ColumnData::F32(None),
        ValueType::F64 => ColumnData::F64(None),
        ValueType::Decimal => ColumnData::Numeric(None),
        ValueType::Text | ValueType::Json => ColumnData::String(None),
        ValueType::Bytes => ColumnData::Binary(None),
        ValueType::Uuid => ColumnData::Guid(None),
        ValueType::Date => ColumnData::Date(None),
        ValueType::Time => ColumnData::Time(None),
        ValueType::Timestamp => ColumnData::DateTime2(None),
        ValueType::TimestampTz => ColumnData::DateTimeOffset(None),
    }
}

/// Convert a bound parameter to the value sent over TDS.
pub(crate) fn param_to_column_data(param: &Param) -> Result<ColumnData<'static>> {
    let data = match &param.value {
        SqlValue::Null => null_column_data(param.ty),
        SqlValue::Bool(b) => ColumnData::Bit(Some(*b)),
        SqlValue::I16(i) => ColumnData::I16(Some(*i)),
        SqlValue::I32(i) => ColumnData::I32(Some(*i)),
        SqlValue::I64(i) => ColumnData::I64(Some(*i)),
        SqlValue::F32(f) => ColumnData::F32(Some(*f).filter(|f| f.is_finite())),
        SqlValue::F64(f) => ColumnData::F64(Some(*f).filter(|f| f.is_finite())),
        SqlValue::Decimal(d) => ColumnData::Numeric(Some(Numeric::new_with_scale(
            d.mantissa(),
            d.scale() as u8,
        ))),
        SqlValue::Text(s) => ColumnData::String(Some(Cow::Owned(s.clone()))),
        SqlValue::Json(j) => ColumnData::String(Some(Cow::Owned(j.to_string()))),
        SqlValue::Bytes(b) => ColumnData::Binary(Some(Cow::Owned(b.clone()))),
        SqlValue::Uuid(u) => ColumnData::Guid(Some(*u)),
        SqlValue::Date(d) => ColumnData::Date(Some(tds_date(*d)?)),
        SqlValue::Time(t) => ColumnData::Time(Some(tds_time(*t))),
        SqlValue::Timestamp(ts) => ColumnData::DateTime2(Some(tds_datetime2(*ts)?)),
        SqlValue::TimestampTz(ts) => {
            let offset_minutes = ts.offset().local_minus_utc() / 60;
            ColumnData::DateTimeOffset(Some(tiberius::time::DateTimeOffset::new(
                tds_datetime2(ts.naive_utc())?,
                offset_minutes as i16,
            )))
        }
    };
    Ok(data)
}

/// Days since 0001-01-01.
fn tds_date(date: NaiveDate) -> Result<tiberius::time::Date> {
    let days = date.num_days_from_ce() - 1;
    u32::try_from(days)
        .map(tiberius::time::Date::new)
        .map_err(|_| EtlError::Statement(format!("date {} is before 0001-01-01", date)))
}

/// 100ns increments since midnight, scale 7.
fn tds_time(time: NaiveTime) -> tiberius::time::Time {
    let nanos =
        u64::from(time.num_seconds_from_midnight()) * 1_000_000_000 + u64::from(time.nanosecond());
    tiberius::time::Time::new(nanos / 100, 7)
}

fn tds_datetime2(ts: NaiveDateTime) -> Result<tiberius::time::DateTime2> {
    Ok(tiberius::time::DateTime2::new(
        tds_date(ts.date())?,
        tds_time(ts.time()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_int_width_from_first_cell() {
        assert_eq!(native_type_name(ColumnType::Intn, &ColumnData::I32(Some(1))), "int");
        assert_eq!(native_type_name(ColumnType::Intn, &ColumnData::U8(None)), "tinyint");
        assert_eq!(native_type_name(ColumnType::Intn, &ColumnData::I64(None)), "bigint");
        assert_eq!(native_type_name(ColumnType::Floatn, &ColumnData::F64(None)), "float");
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("datetime"), Some(ValueType::Timestamp));
        assert_eq!(resolve("smalldatetime"), Some(ValueType::Timestamp));
        assert_eq!(resolve("DATETIMEOFFSET"), Some(ValueType::TimestampTz));
        assert_eq!(resolve("money"), Some(ValueType::Decimal));
        assert_eq!(resolve("tinyint"), Some(ValueType::I16));
        assert_eq!(resolve("sql_variant"), None);
    }

    #[test]
    fn test_legacy_datetime_decodes_to_timestamp() {
        // 1/300 s fragments since midnight, days since 1900-01-01
        let cell = ColumnData::DateTime(Some(tiberius::time::DateTime::new(0, 300 * 3600)));
        let expected = NaiveDate::from_ymd_opt(1900, 1, 1)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        assert_eq!(cell_to_value(&cell).unwrap(), SqlValue::Timestamp(expected));
    }

    #[test]
    fn test_tinyint_widens_to_i16() {
        assert_eq!(cell_to_value(&ColumnData::U8(Some(200))).unwrap(), SqlValue::I16(200));
        assert_eq!(cell_to_value(&ColumnData::U8(None)).unwrap(), SqlValue::Null);
    }

    #[test]
    fn test_numeric_to_decimal() {
        let cell = ColumnData::Numeric(Some(Numeric::new_with_scale(12345, 2)));
        assert_eq!(
            cell_to_value(&cell).unwrap(),
            SqlValue::Decimal(Decimal::new(12345, 2))
        );
    }

    #[test]
    fn test_typed_nulls() {
        assert!(matches!(
            param_to_column_data(&Param::null(ValueType::Timestamp)).unwrap(),
            ColumnData::DateTime2(None)
        ));
        assert!(matches!(
            param_to_column_data(&Param::null(ValueType::Json)).unwrap(),
            ColumnData::String(None)
        ));
        assert!(matches!(
            param_to_column_data(&Param::null(ValueType::Uuid)).unwrap(),
            ColumnData::Guid(None)
        ));
    }

    #[test]
    fn test_timestamp_param_survives_tds_encoding() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(13, 45, 10, 250_000)
            .unwrap();
        let param = Param {
            ty: ValueType::Timestamp,
            value: SqlValue::Timestamp(ts),
        };
        let data = param_to_column_data(&param).unwrap();
        assert_eq!(NaiveDateTime::from_sql(&data).unwrap(), Some(ts));
    }

    #[test]
    fn test_non_finite_float_binds_as_null() {
        let param = Param {
            ty: ValueType::F64,
            value: SqlValue::F64(f64::NAN),
        };
        assert!(matches!(
            param_to_column_data(&param).unwrap(),
            ColumnData::F64(None)
        ));
    }
}
