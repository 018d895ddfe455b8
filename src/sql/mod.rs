//! PostgreSQL DDL generation from a schema graph.

mod generator;
mod types;

pub use generator::{SqlGenerator, generate_sql, generate_sql_at};
pub use types::{PgType, map_type, reference_type};

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Name of the enum type backing `table.column`.
pub fn enum_type_name(table: &str, column: &str) -> String {
    format!("enum_{table}_{column}").to_lowercase()
}
