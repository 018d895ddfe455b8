//! Column type to PostgreSQL type mapping.

use super::{enum_type_name, quote_ident};
use crate::model::{Column, Table};

/// PostgreSQL rendering of a column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgType {
    pub sql: String,
    /// Default the type implies when the column has none of its own.
    pub implied_default: Option<&'static str>,
}

impl PgType {
    fn plain(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            implied_default: None,
        }
    }

    fn with_default(sql: &str, default: Option<&'static str>) -> Self {
        Self {
            sql: sql.to_string(),
            implied_default: default,
        }
    }
}

/// Map a column to its PostgreSQL type.
pub fn map_type(table: &Table, column: &Column) -> PgType {
    let lower = column.column_type.to_lowercase();
    let base = lower.split('(').next().unwrap_or(&lower).trim();

    match base {
        "int" | "integer" if column.is_primary => PgType::plain("SERIAL"),
        "int" | "integer" => PgType::plain("INTEGER"),
        "uuid" => PgType::with_default(
            "UUID",
            column.is_primary.then_some("gen_random_uuid()"),
        ),
        "text" | "string" | "varchar" => PgType::plain("TEXT"),
        "bool" | "boolean" => PgType::plain("BOOLEAN"),
        "date" | "datetime" | "timestamp" => {
            let stamped = column.name.contains("created") || column.name.contains("at");
            PgType::with_default("TIMESTAMPTZ", stamped.then_some("NOW()"))
        }
        "json" | "jsonb" => PgType::plain("JSONB"),
        "float" => PgType::plain("DOUBLE PRECISION"),
        "enum" if column.enum_values.is_some() => {
            PgType::plain(&quote_ident(&enum_type_name(&table.name, &column.name)))
        }
        _ => PgType::plain("TEXT"),
    }
}

/// Type for a column that stores keys of `column`: like [`map_type`] but never
/// auto-incrementing and without implied defaults.
pub fn reference_type(table: &Table, column: &Column) -> String {
    let mut key = column.clone();
    key.is_primary = false;
    map_type(table, &key).sql
}
