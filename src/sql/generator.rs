//! Schema graph to PostgreSQL DDL.
//!
//! Output order: header, enum types, tables, then foreign keys and junction
//! tables once every table exists, then indices. Relations follow the graph
//! rule that `from` is the parent key and `to` the child's FK column, so
//! constraints always land on the `to` table.

use std::collections::{HashMap, HashSet};

use chrono::{SecondsFormat, Utc};

use super::types::{map_type, reference_type};
use super::{enum_type_name, quote_ident, quote_literal};
use crate::model::{Cardinality, Column, ReferentialAction, Relation, Table};

const RULE: &str = "-- =========================================================";

pub struct SqlGenerator {
    /// Longest constraint or index name emitted, in characters.
    pub identifier_limit: usize,
}

impl Default for SqlGenerator {
    fn default() -> Self {
        Self {
            identifier_limit: 60,
        }
    }
}

/// Collected `ALTER TABLE` and `CREATE INDEX` statements.
#[derive(Default)]
struct Trailer {
    foreign_keys: Vec<String>,
    indices: Vec<String>,
}

impl SqlGenerator {
    pub fn generate(&self, tables: &[Table], relations: &[Relation], generated_at: &str) -> String {
        let by_id: HashMap<&str, &Table> = tables.iter().rev().map(|t| (t.id.as_str(), t)).collect();
        let mut lines = vec![
            RULE.to_string(),
            "-- Database Schema Export".to_string(),
            format!("-- Generated at {generated_at}"),
            RULE.to_string(),
            String::new(),
        ];

        self.enum_types(tables, &mut lines);
        for table in tables {
            self.create_table(table, &mut lines);
        }

        let mut trailer = Trailer::default();
        lines.push("-- [3] Foreign Keys & Indices".to_string());
        self.foreign_keys(&by_id, relations, &mut trailer);
        lines.push("-- [4] Junction Tables".to_string());
        self.junction_tables(&by_id, relations, &mut lines, &mut trailer);
        lines.push(String::new());

        if !trailer.foreign_keys.is_empty() {
            lines.append(&mut trailer.foreign_keys);
            lines.push(String::new());
        }
        if !trailer.indices.is_empty() {
            lines.push("-- Indices".to_string());
            lines.append(&mut trailer.indices);
            lines.push(String::new());
        }

        lines.join("\n")
    }

    fn enum_types(&self, tables: &[Table], lines: &mut Vec<String>) {
        lines.push("-- [1] Enum Types".to_string());
        let mut seen = HashSet::new();
        for table in tables {
            for column in &table.columns {
                let Some(values) = column.enum_values.as_ref().filter(|_| is_enum(column)) else {
                    continue;
                };
                let name = enum_type_name(&table.name, &column.name);
                if !seen.insert(name.clone()) {
                    continue;
                }
                let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
                lines.push(format!(
                    "CREATE TYPE {} AS ENUM ({});",
                    quote_ident(&name),
                    values.join(", ")
                ));
            }
        }
        lines.push(String::new());
        lines.push("-- [2] Tables".to_string());
    }

    fn create_table(&self, table: &Table, lines: &mut Vec<String>) {
        lines.push(format!("CREATE TABLE IF NOT EXISTS {} (", quote_ident(&table.name)));

        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|column| column_definition(table, column))
            .collect();
        let keys: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.is_primary)
            .map(|c| quote_ident(&c.name))
            .collect();
        if !keys.is_empty() {
            defs.push(format!("  PRIMARY KEY ({})", keys.join(", ")));
        }

        lines.push(defs.join(",\n"));
        lines.push(");".to_string());
        lines.push(String::new());
    }

    fn foreign_keys(&self, by_id: &HashMap<&str, &Table>, relations: &[Relation], trailer: &mut Trailer) {
        let mut seen = HashSet::new();
        for relation in relations.iter().filter(|r| r.cardinality.needs_fk_column()) {
            let (Some(parent), Some(child)) = (
                by_id.get(relation.from.table_id.as_str()),
                by_id.get(relation.to.table_id.as_str()),
            ) else {
                continue;
            };
            let (Some(parent_column), Some(child_column)) = (
                parent.column(&relation.from.column_id),
                child.column(&relation.to.column_id),
            ) else {
                continue;
            };

            let key = format!(
                "{}.{}-{}.{}",
                child.name, child_column.name, parent.name, parent_column.name
            );
            if !seen.insert(key) {
                continue;
            }

            let child_name = quote_ident(&child.name);
            let fk_column = quote_ident(&child_column.name);
            trailer.foreign_keys.push(format!(
                "ALTER TABLE {child_name} ADD CONSTRAINT {} FOREIGN KEY ({fk_column}) REFERENCES {}({}){}{};",
                self.constraint_name("fk", &child.name, &child_column.name),
                quote_ident(&parent.name),
                quote_ident(&parent_column.name),
                rule_clause("DELETE", relation.delete_rule),
                rule_clause("UPDATE", relation.update_rule),
            ));
            trailer.indices.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {child_name}({fk_column});",
                self.constraint_name("idx", &child.name, &child_column.name),
            ));
        }
    }

    fn junction_tables(
        &self,
        by_id: &HashMap<&str, &Table>,
        relations: &[Relation],
        lines: &mut Vec<String>,
        trailer: &mut Trailer,
    ) {
        let mut seen = HashSet::new();
        for relation in relations
            .iter()
            .filter(|r| r.cardinality == Cardinality::ManyToMany)
        {
            let (Some(a), Some(b)) = (
                by_id.get(relation.from.table_id.as_str()),
                by_id.get(relation.to.table_id.as_str()),
            ) else {
                continue;
            };
            let (first, second) = if a.name <= b.name { (*a, *b) } else { (*b, *a) };

            let name = format!("_junction_{}_{}", first.name, second.name);
            if !seen.insert(name.clone()) {
                continue;
            }
            let (Some(first_key), Some(second_key)) = (first.primary_key(), second.primary_key()) else {
                continue;
            };

            // A self-referencing junction needs two distinct column names.
            let first_stem = first.name.clone();
            let second_stem = if first.id == second.id {
                format!("related_{}", second.name)
            } else {
                second.name.clone()
            };
            let first_column = quote_ident(&format!("{first_stem}_id"));
            let second_column = quote_ident(&format!("{second_stem}_id"));
            let junction = quote_ident(&name);

            lines.push(format!("CREATE TABLE IF NOT EXISTS {junction} ("));
            lines.push(format!("  {first_column} {} NOT NULL,", reference_type(first, first_key)));
            lines.push(format!("  {second_column} {} NOT NULL,", reference_type(second, second_key)));
            lines.push(format!("  PRIMARY KEY ({first_column}, {second_column})"));
            lines.push(");".to_string());

            for (stem, column, table, key) in [
                (&first_stem, &first_column, first, first_key),
                (&second_stem, &second_column, second, second_key),
            ] {
                trailer.foreign_keys.push(format!(
                    "ALTER TABLE {junction} ADD CONSTRAINT {} FOREIGN KEY ({column}) REFERENCES {}({}) ON DELETE CASCADE;",
                    self.constraint_name("fk_junc", &name, stem),
                    quote_ident(&table.name),
                    quote_ident(&key.name),
                ));
            }
            trailer.indices.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {junction}({second_column});",
                self.constraint_name("idx_junc", &name, &second_stem),
            ));
        }
    }

    /// `{prefix}_{table}_{column}`, cut to the identifier limit and quoted.
    fn constraint_name(&self, prefix: &str, table: &str, column: &str) -> String {
        let raw = format!("{prefix}_{table}_{column}");
        let cut: String = raw.chars().take(self.identifier_limit).collect();
        quote_ident(&cut)
    }
}

fn is_enum(column: &Column) -> bool {
    let lower = column.column_type.to_lowercase();
    lower.split('(').next().map(str::trim) == Some("enum")
}

fn column_definition(table: &Table, column: &Column) -> String {
    let pg = map_type(table, column);
    let mut def = format!("  {} {}", quote_ident(&column.name), pg.sql);

    if !column.is_nullable && !column.is_primary {
        def.push_str(" NOT NULL");
    }
    if column.is_unique {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = column.default.as_deref().or(pg.implied_default) {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    }
    def
}

fn rule_clause(event: &str, rule: Option<ReferentialAction>) -> String {
    let action = match rule {
        Some(ReferentialAction::Cascade) => "CASCADE",
        Some(ReferentialAction::SetNull) => "SET NULL",
        Some(ReferentialAction::Restrict) => "RESTRICT",
        None => return String::new(),
    };
    format!(" ON {event} {action}")
}

/// Generate DDL stamped with the current UTC time.
pub fn generate_sql(tables: &[Table], relations: &[Relation]) -> String {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    generate_sql_at(tables, relations, &now)
}

/// Generate DDL with a fixed header timestamp. Identical input gives
/// byte-identical output.
pub fn generate_sql_at(tables: &[Table], relations: &[Relation], generated_at: &str) -> String {
    SqlGenerator::default().generate(tables, relations, generated_at)
}
