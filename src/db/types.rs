//! Decoding result rows into JSON.
//!
//! Each column's declared type is first classified into a [`TypeCategory`];
//! per-driver decoders then try the Rust types that category can hold, in
//! order, and render the first one that decodes. NULL is always `null`.

use crate::models::{ColumnMetadata, DatabaseType};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Other,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Before the integer check: "numeric" would otherwise be unknown and
    // "decimal" never matches "int".
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity stores plain floats
        if db == DatabaseType::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    TypeCategory::Other
}

/// Raw DECIMAL/NUMERIC text, so no precision is lost on the way to JSON.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// UTF-8 binary values become text, anything else base64.
pub fn binary_to_json(bytes: &[u8]) -> JsonValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn iso_datetime(v: chrono::NaiveDateTime) -> JsonValue {
    JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn text_to_json(v: String, type_name: &str) -> JsonValue {
    if type_name.to_lowercase().contains("json") {
        if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
            return json;
        }
    }
    JsonValue::String(v)
}

/// Try each `type => conversion` in order; the first that decodes wins.
macro_rules! first_decoded {
    ($row:expr, $idx:expr, $($ty:ty => $conv:expr),+ $(,)?) => {{
        let mut value: Option<JsonValue> = None;
        $(
            if value.is_none() {
                if let Ok(decoded) = $row.try_get::<Option<$ty>, _>($idx) {
                    value = Some(decoded.map($conv).unwrap_or(JsonValue::Null));
                }
            }
        )+
        value.unwrap_or(JsonValue::Null)
    }};
}

/// Converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue>;
    fn column_metadata(&self) -> Vec<ColumnMetadata>;
}

macro_rules! impl_sqlx_row_to_json {
    ($row:ty, $db:expr, $decode:path) => {
        impl RowToJson for $row {
            fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
                self.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| {
                        let type_name = col.type_info().name();
                        let category = categorize_type(type_name, $db);
                        (col.name().to_string(), $decode(self, idx, type_name, category))
                    })
                    .collect()
            }

            fn column_metadata(&self) -> Vec<ColumnMetadata> {
                self.columns()
                    .iter()
                    .map(|col| {
                        ColumnMetadata::new(
                            col.name(),
                            col.type_info().name(),
                            !col.type_info().is_null(),
                        )
                    })
                    .collect()
            }
        }
    };
}

impl_sqlx_row_to_json!(MySqlRow, DatabaseType::MySQL, mysql::decode_column);
impl_sqlx_row_to_json!(PgRow, DatabaseType::PostgreSQL, postgres::decode_column);
impl_sqlx_row_to_json!(SqliteRow, DatabaseType::SQLite, sqlite::decode_column);

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        match category {
            TypeCategory::Decimal => first_decoded!(row, idx, RawDecimal => |v| JsonValue::String(v.0)),
            TypeCategory::Integer => first_decoded!(row, idx,
                i64 => JsonValue::from,
                u64 => JsonValue::from,
                i32 => JsonValue::from,
                u32 => JsonValue::from,
                i8 => JsonValue::from,
                u8 => JsonValue::from,
            ),
            TypeCategory::Boolean => first_decoded!(row, idx, bool => JsonValue::Bool, i8 => |v| JsonValue::Bool(v != 0)),
            TypeCategory::Float => first_decoded!(row, idx,
                f64 => float_to_json,
                f32 => |v| float_to_json(v as f64),
            ),
            TypeCategory::Binary => first_decoded!(row, idx, Vec<u8> => |v| binary_to_json(&v)),
            TypeCategory::Json => first_decoded!(row, idx, JsonValue => |v| v),
            TypeCategory::Other => first_decoded!(row, idx,
                String => |v| text_to_json(v, type_name),
                NaiveDateTime => iso_datetime,
                DateTime<Utc> => |v| JsonValue::String(v.to_rfc3339()),
                NaiveDate => |v| JsonValue::String(v.to_string()),
                NaiveTime => |v| JsonValue::String(v.to_string()),
                Vec<u8> => |v| binary_to_json(&v),
            ),
        }
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        _type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        match category {
            TypeCategory::Decimal => first_decoded!(row, idx, RawDecimal => |v| JsonValue::String(v.0)),
            TypeCategory::Integer => first_decoded!(row, idx,
                i64 => JsonValue::from,
                i32 => JsonValue::from,
                i16 => JsonValue::from,
            ),
            TypeCategory::Boolean => first_decoded!(row, idx, bool => JsonValue::Bool),
            TypeCategory::Float => first_decoded!(row, idx,
                f64 => float_to_json,
                f32 => |v| float_to_json(v as f64),
            ),
            TypeCategory::Binary => first_decoded!(row, idx, Vec<u8> => |v| binary_to_json(&v)),
            TypeCategory::Json => first_decoded!(row, idx, JsonValue => |v| v),
            TypeCategory::Other => first_decoded!(row, idx,
                String => JsonValue::String,
                DateTime<Utc> => |v| JsonValue::String(v.to_rfc3339()),
                NaiveDateTime => iso_datetime,
                NaiveDate => |v| JsonValue::String(v.to_string()),
                NaiveTime => |v| JsonValue::String(v.to_string()),
            ),
        }
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        match category {
            TypeCategory::Integer => first_decoded!(row, idx, i64 => JsonValue::from),
            TypeCategory::Boolean => first_decoded!(row, idx, bool => JsonValue::Bool),
            TypeCategory::Float | TypeCategory::Decimal => {
                first_decoded!(row, idx, f64 => float_to_json)
            }
            TypeCategory::Binary => first_decoded!(row, idx, Vec<u8> => |v| binary_to_json(&v)),
            // Columns without a declared type (expressions, aggregates) carry
            // whatever storage class the value has.
            TypeCategory::Json | TypeCategory::Other => first_decoded!(row, idx,
                String => |v| text_to_json(v, type_name),
                i64 => JsonValue::from,
                f64 => float_to_json,
                Vec<u8> => |v| binary_to_json(&v),
            ),
        }
    }
}

impl RowToJson for tiberius::Row {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.cells()
            .map(|(col, data)| (col.name().to_string(), mssql::cell_to_json(data)))
            .collect()
    }

    fn column_metadata(&self) -> Vec<ColumnMetadata> {
        self.columns()
            .iter()
            .map(|col| ColumnMetadata::new(col.name(), format!("{:?}", col.column_type()), true))
            .collect()
    }
}

mod mssql {
    use super::*;
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
    use tiberius::{ColumnData, FromSql};

    pub fn cell_to_json(data: &ColumnData<'static>) -> JsonValue {
        let value = match data {
            ColumnData::U8(v) => v.map(JsonValue::from),
            ColumnData::I16(v) => v.map(JsonValue::from),
            ColumnData::I32(v) => v.map(JsonValue::from),
            ColumnData::I64(v) => v.map(JsonValue::from),
            ColumnData::F32(v) => v.map(|f| float_to_json(f as f64)),
            ColumnData::F64(v) => v.map(float_to_json),
            ColumnData::Bit(v) => v.map(JsonValue::Bool),
            ColumnData::String(v) => v.as_ref().map(|s| JsonValue::String(s.to_string())),
            ColumnData::Guid(v) => v.as_ref().map(|g| JsonValue::String(g.to_string())),
            ColumnData::Binary(v) => v.as_ref().map(|b| binary_to_json(b)),
            ColumnData::Numeric(v) => v.as_ref().map(|n| JsonValue::String(n.to_string())),
            other => temporal(other),
        };
        value.unwrap_or(JsonValue::Null)
    }

    fn temporal(data: &ColumnData<'static>) -> Option<JsonValue> {
        if let Ok(v) = NaiveDateTime::from_sql(data) {
            return v.map(iso_datetime);
        }
        if let Ok(v) = DateTime::<FixedOffset>::from_sql(data) {
            return v.map(|v| JsonValue::String(v.to_rfc3339()));
        }
        if let Ok(v) = NaiveDate::from_sql(data) {
            return v.map(|v| JsonValue::String(v.to_string()));
        }
        if let Ok(v) = NaiveTime::from_sql(data) {
            return v.map(|v| JsonValue::String(v.to_string()));
        }
        Some(JsonValue::String(format!("{:?}", data)))
    }
}
