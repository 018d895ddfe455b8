//! Canonical column type lexicon.

use super::Diagnostics;
use crate::model::Table;

/// Canonical type names. Every entry normalizes to itself.
pub const CANONICAL_TYPES: &[&str] = &[
    "varchar", "text", "int", "float", "boolean", "date", "timestamp", "uuid", "json", "enum",
];

/// Map a free-text type to its canonical name.
///
/// Case-insensitive; a parenthesized suffix (`varchar(255)`, `numeric(10, 2)`)
/// is dropped before lookup. Returns `None` for unknown types.
pub fn normalize_type(raw: &str) -> Option<&'static str> {
    let lowered = raw.trim().to_lowercase();
    let base = match lowered.find('(') {
        Some(i) => lowered[..i].trim_end(),
        None => lowered.as_str(),
    };

    let canonical = match base {
        "varchar" | "string" | "char" | "character" | "character varying" | "nvarchar" => "varchar",
        "text" | "longtext" | "mediumtext" | "clob" => "text",
        "int" | "integer" | "number" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "serial"
        | "bigserial" | "smallserial" => "int",
        "float" | "double" | "double precision" | "decimal" | "numeric" | "real" | "float4"
        | "float8" => "float",
        "boolean" | "bool" => "boolean",
        "date" => "date",
        "datetime" | "timestamp" | "timestamptz" | "timestamp with time zone"
        | "timestamp without time zone" => "timestamp",
        "uuid" | "uid" | "guid" => "uuid",
        "json" | "jsonb" | "object" => "json",
        "enum" => "enum",
        _ => return None,
    };
    Some(canonical)
}

pub(super) fn normalize_types(tables: &mut [Table], log: &mut Diagnostics) {
    for table in tables.iter_mut() {
        for column in &mut table.columns {
            if let Some(canonical) = normalize_type(&column.column_type) {
                if column.column_type != canonical {
                    column.column_type = canonical.to_string();
                }
                continue;
            }
            let message = if column.column_type.is_empty() {
                format!("{}.{} has no type; using varchar", table.name, column.name)
            } else {
                format!(
                    "{}.{} has unknown type '{}'; using varchar",
                    table.name, column.name, column.column_type
                )
            };
            log.info("TYPE_DEFAULTED", message);
            column.column_type = "varchar".to_string();
        }
    }
}
