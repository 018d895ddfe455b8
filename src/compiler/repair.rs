//! Id collisions and relation integrity.

use std::collections::HashSet;

use super::lower::{RawEndpoint, RawRelation};
use super::{Diagnostics, fresh_id};
use crate::model::{Column, Endpoint, Relation, Table};

/// A table whose id collided and was renamed, with the column ids it owned.
pub(super) struct Rename {
    old: String,
    new: String,
    columns: HashSet<String>,
}

/// Give every repeated table id a `{id}_{n}` suffix.
pub(super) fn dedupe_table_ids(tables: &mut [Table], log: &mut Diagnostics) -> Vec<Rename> {
    let mut taken: HashSet<String> = tables.iter().map(|t| t.id.clone()).collect();
    let mut seen = HashSet::new();
    let mut renames = Vec::new();

    for table in tables.iter_mut() {
        if seen.insert(table.id.clone()) {
            continue;
        }
        let new = fresh_id(&format!("{}_", table.id), 2, |c| taken.contains(c));
        log.warning(
            "DUPLICATE_TABLE_ID",
            format!("table id '{}' is used twice; renamed '{}' to '{new}'", table.id, table.name),
        );
        taken.insert(new.clone());
        seen.insert(new.clone());
        renames.push(Rename {
            old: std::mem::replace(&mut table.id, new.clone()),
            new,
            columns: table.columns.iter().map(|c| c.id.clone()).collect(),
        });
    }
    renames
}

/// Point `table_id` at a renamed duplicate when only that one owns the column.
fn remap(table_id: &mut String, column_id: Option<&str>, tables: &[Table], renames: &[Rename]) {
    let Some(column_id) = column_id else {
        return;
    };
    let resolves = tables
        .iter()
        .find(|t| t.id == *table_id)
        .is_some_and(|t| t.column(column_id).is_some());
    if resolves {
        return;
    }
    if let Some(rename) = renames
        .iter()
        .find(|r| r.old == *table_id && r.columns.contains(column_id))
    {
        *table_id = rename.new.clone();
    }
}

/// Resolve relation endpoints against the tables. Relations into missing
/// tables are dropped; missing columns are synthesized.
pub(super) fn resolve_relations(
    tables: &mut [Table],
    raw: Vec<RawRelation>,
    renames: &[Rename],
    log: &mut Diagnostics,
) -> Vec<Relation> {
    let reserved: HashSet<String> = raw.iter().filter_map(|r| r.id.clone()).collect();
    let mut used: HashSet<String> = HashSet::new();
    let mut relations = Vec::with_capacity(raw.len());

    for (i, mut rel) in raw.into_iter().enumerate() {
        remap(&mut rel.from.table_id, rel.from.column_id.as_deref(), tables, renames);
        remap(&mut rel.to.table_id, rel.to.column_id.as_deref(), tables, renames);
        let label = rel.id.clone().unwrap_or_else(|| format!("#{i}"));

        let from_pos = tables.iter().position(|t| t.id == rel.from.table_id);
        let to_pos = tables.iter().position(|t| t.id == rel.to.table_id);
        let (Some(from_pos), Some(to_pos)) = (from_pos, to_pos) else {
            log.warning(
                "DANGLING_RELATION",
                format!(
                    "dropped relation {label}: table '{}' or '{}' does not exist",
                    rel.from.table_id, rel.to.table_id
                ),
            );
            continue;
        };

        let from_column = ensure_column(&mut tables[from_pos], rel.from, "source", log);
        let to_column = ensure_column(&mut tables[to_pos], rel.to, "target", log);

        let id = match rel.id {
            Some(id) if !used.contains(&id) => id,
            Some(id) => {
                let fresh = fresh_id(&format!("{id}_"), 2, |c| used.contains(c) || reserved.contains(c));
                log.warning(
                    "DUPLICATE_RELATION_ID",
                    format!("relation id '{id}' is used twice; renamed to '{fresh}'"),
                );
                fresh
            }
            None => {
                let fresh = fresh_id("rel_", 1, |c| used.contains(c) || reserved.contains(c));
                log.info("RELATION_NO_ID", format!("relation {label} was given id '{fresh}'"));
                fresh
            }
        };
        used.insert(id.clone());

        relations.push(Relation {
            id,
            from: Endpoint::new(&tables[from_pos].id, from_column),
            to: Endpoint::new(&tables[to_pos].id, to_column),
            cardinality: rel.cardinality,
            is_one_to_many_reversed: rel.reversed,
            delete_rule: rel.delete_rule,
            update_rule: rel.update_rule,
        });
    }
    relations
}

/// Return the endpoint's column id, adding a placeholder column when the
/// table lacks it. An endpoint without a column id falls back to the primary
/// key.
fn ensure_column(table: &mut Table, endpoint: RawEndpoint, role: &str, log: &mut Diagnostics) -> String {
    let id = match endpoint.column_id {
        Some(id) if table.column(&id).is_some() => return id,
        Some(id) => id,
        None => {
            if let Some(pk) = table.primary_key() {
                return pk.id.clone();
            }
            fresh_id(&format!("{role}_id_"), 1, |c| table.column(c).is_some())
        }
    };

    log.warning(
        "MISSING_COLUMN",
        format!(
            "table '{}' has no column '{id}'; added placeholder '{role}_id'",
            table.name
        ),
    );
    let mut placeholder = Column::new(&id, format!("{role}_id"), "uuid");
    placeholder.is_foreign = true;
    table.columns.push(placeholder);
    id
}

/// Remap and then clear column `references` that do not resolve.
pub(super) fn clear_dangling_references(tables: &mut [Table], renames: &[Rename], log: &mut Diagnostics) {
    let mut remapped: Vec<(usize, usize, String)> = Vec::new();
    for (ti, table) in tables.iter().enumerate() {
        for (ci, column) in table.columns.iter().enumerate() {
            let Some(parent) = &column.references else {
                continue;
            };
            let mut table_id = parent.table_id.clone();
            remap(&mut table_id, Some(&parent.column_id), tables, renames);
            if table_id != parent.table_id {
                remapped.push((ti, ci, table_id));
            }
        }
    }
    for (ti, ci, table_id) in remapped {
        if let Some(parent) = tables[ti].columns[ci].references.as_mut() {
            parent.table_id = table_id;
        }
    }

    let known: HashSet<(String, String)> = tables
        .iter()
        .flat_map(|t| t.columns.iter().map(|c| (t.id.clone(), c.id.clone())))
        .collect();
    for table in tables.iter_mut() {
        for column in &mut table.columns {
            let dangling = column.references.as_ref().is_some_and(|parent| {
                !known.contains(&(parent.table_id.clone(), parent.column_id.clone()))
            });
            if dangling {
                log.info(
                    "DANGLING_REFERENCE",
                    format!("cleared reference of '{}.{}': target does not exist", table.name, column.name),
                );
                column.references = None;
                column.is_foreign = false;
            }
        }
    }
}
