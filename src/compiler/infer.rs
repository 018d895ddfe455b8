//! Relation inference from FK-style column names.

use super::{Diagnostics, fresh_id};
use crate::model::{Cardinality, Endpoint, Relation, Table};

/// The table-name stem of an FK-looking column name: `user_id`, `user_ID`
/// and `userId` all give `user`.
fn fk_stem(name: &str) -> Option<&str> {
    let bytes = name.as_bytes();
    let stem = if bytes.len() > 3 && bytes[bytes.len() - 3..].eq_ignore_ascii_case(b"_id") {
        &name[..name.len() - 3]
    } else if name.len() > 2 && name.ends_with("Id") {
        &name[..name.len() - 2]
    } else {
        return None;
    };
    (!stem.is_empty()).then_some(stem)
}

/// Add a one-to-many relation for every non-key `*_id`/`*Id` column whose stem
/// names a table (exactly or with a trailing `s`) that has a key column.
pub(super) fn infer_relations(tables: &mut [Table], relations: &mut Vec<Relation>, log: &mut Diagnostics) {
    let mut candidates = Vec::new();
    for (si, source) in tables.iter().enumerate() {
        for (ci, column) in source.columns.iter().enumerate() {
            if column.is_primary {
                continue;
            }
            let Some(stem) = fk_stem(&column.name) else {
                continue;
            };
            let singular = stem.to_lowercase();
            let plural = format!("{singular}s");
            let Some(target) = tables.iter().find(|t| {
                let name = t.name.to_lowercase();
                name == singular || name == plural
            }) else {
                continue;
            };
            let Some(key) = target.columns.iter().find(|c| c.name == "id" || c.is_primary) else {
                continue;
            };
            candidates.push((si, ci, Endpoint::new(&target.id, &key.id)));
        }
    }

    for (si, ci, parent) in candidates {
        let child = Endpoint::new(&tables[si].id, &tables[si].columns[ci].id);
        let exists = relations.iter().any(|r| {
            r.from.table_id == parent.table_id
                && r.to.table_id == child.table_id
                && r.to.column_id == child.column_id
        });
        if exists || child == parent {
            continue;
        }

        let id = fresh_id("gen_rel_", 1, |c| relations.iter().any(|r| r.id == c));
        log.info(
            "INFERRED_RELATION",
            format!(
                "'{}.{}' looks like a foreign key; added relation '{id}'",
                tables[si].name, tables[si].columns[ci].name
            ),
        );
        let column = &mut tables[si].columns[ci];
        if column.references.is_none() {
            column.references = Some(parent.clone());
            column.is_foreign = true;
        }
        relations.push(Relation::new(id, parent, child, Cardinality::OneToMany));
    }
}
