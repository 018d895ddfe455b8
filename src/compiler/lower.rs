//! Raw JSON passes: safe defaults, trimming, and lowering tables, columns and
//! relations into typed values.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::{Diagnostics, fresh_id};
use crate::model::{Cardinality, Column, Endpoint, ReferentialAction, Table, Viewport};

pub(super) struct RawProject {
    pub viewport: Viewport,
    pub tables: Vec<Value>,
    pub relations: Vec<Value>,
}

/// A relation endpoint before integrity checks. The column may be absent.
#[derive(Debug, Clone)]
pub(super) struct RawEndpoint {
    pub table_id: String,
    pub column_id: Option<String>,
}

#[derive(Debug, Clone)]
pub(super) struct RawRelation {
    pub id: Option<String>,
    pub from: RawEndpoint,
    pub to: RawEndpoint,
    pub cardinality: Cardinality,
    pub reversed: bool,
    pub delete_rule: Option<ReferentialAction>,
    pub update_rule: Option<ReferentialAction>,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Ids may arrive as strings or numbers; empty strings do not count.
fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_flag(obj: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .any(|k| obj.get(*k).and_then(Value::as_bool).unwrap_or(false))
}

fn as_coord(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn as_endpoint(value: &Value) -> Option<Endpoint> {
    let obj = value.as_object()?;
    Some(Endpoint::new(
        as_id(obj.get("tableId")?)?,
        as_id(obj.get("columnId")?)?,
    ))
}

fn as_raw_endpoint(value: &Value) -> Option<RawEndpoint> {
    let obj = value.as_object()?;
    Some(RawEndpoint {
        table_id: as_id(obj.get("tableId")?)?,
        column_id: obj.get("columnId").and_then(as_id),
    })
}

/// Trim every string and object key, recursively.
pub(super) fn sanitize(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.len() == s.len() {
                Value::String(s)
            } else {
                Value::String(trimmed.to_string())
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.trim().to_string(), sanitize(v)))
                .collect(),
        ),
        other => other,
    }
}

pub(super) fn safe_defaults(root: &Value, log: &mut Diagnostics) -> RawProject {
    let Some(obj) = root.as_object() else {
        log.error(
            "INVALID_ROOT",
            format!("expected a project object, found {}", kind(root)),
        );
        return RawProject {
            viewport: Viewport::default(),
            tables: Vec::new(),
            relations: Vec::new(),
        };
    };

    RawProject {
        viewport: viewport(obj.get("viewport"), log),
        tables: array_field(obj, "tables", log),
        relations: array_field(obj, "relations", log),
    }
}

fn array_field(obj: &Map<String, Value>, key: &str, log: &mut Diagnostics) -> Vec<Value> {
    match obj.get(key) {
        Some(Value::Array(items)) => items.clone(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            log.warning(
                &format!("INVALID_{}", key.to_uppercase()),
                format!("'{key}' is {} instead of an array; treated as empty", kind(other)),
            );
            Vec::new()
        }
    }
}

fn viewport(value: Option<&Value>, log: &mut Diagnostics) -> Viewport {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Viewport::default();
    };
    match serde_json::from_value::<Viewport>(value.clone()) {
        Ok(vp) if vp.x.is_finite() && vp.y.is_finite() && vp.scale.is_finite() && vp.scale > 0.0 => vp,
        _ => {
            log.warning("INVALID_VIEWPORT", "viewport reset to the origin at scale 1");
            Viewport::default()
        }
    }
}

pub(super) fn lower_tables(raw: Vec<Value>, log: &mut Diagnostics) -> Vec<Table> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(i, value)| lower_table(i, value, log))
        .collect()
}

fn lower_table(i: usize, value: Value, log: &mut Diagnostics) -> Option<Table> {
    let Value::Object(obj) = value else {
        log.warning("INVALID_TABLE", format!("Skipped table #{i}: not an object."));
        return None;
    };
    let Some(id) = obj.get("id").and_then(as_id) else {
        log.warning("NO_ID", format!("Skipped table #{i} without ID."));
        return None;
    };

    let columns = match obj.get("columns") {
        Some(Value::Array(columns)) => lower_columns(&id, columns, log),
        other => {
            let found = other.map_or("missing", kind);
            log.info(
                "NO_COLUMNS",
                format!("table '{id}' had no column list ({found}); using an empty one"),
            );
            Vec::new()
        }
    };

    Some(Table {
        name: obj.get("name").and_then(as_text).unwrap_or_else(|| id.clone()),
        x: as_coord(obj.get("x")),
        y: as_coord(obj.get("y")),
        columns,
        id,
    })
}

fn lower_columns(table_id: &str, raw: &[Value], log: &mut Diagnostics) -> Vec<Column> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(raw.len());

    for (i, value) in raw.iter().enumerate() {
        let Some(obj) = value.as_object() else {
            log.warning(
                "INVALID_COLUMN",
                format!("dropped column #{i} of table '{table_id}': not an object"),
            );
            continue;
        };

        let mut id = match obj.get("id").and_then(as_id) {
            Some(id) => id,
            None => {
                let id = format!("{table_id}_col_{i}");
                log.info(
                    "COLUMN_NO_ID",
                    format!("column #{i} of table '{table_id}' was given id '{id}'"),
                );
                id
            }
        };
        if seen.contains(&id) {
            let fresh = fresh_id(&format!("{id}_"), 2, |c| seen.contains(c));
            log.warning(
                "DUPLICATE_COLUMN_ID",
                format!("column id '{id}' repeats in table '{table_id}'; renamed to '{fresh}'"),
            );
            id = fresh;
        }
        seen.insert(id.clone());

        columns.push(Column {
            name: obj.get("name").and_then(as_text).unwrap_or_else(|| id.clone()),
            column_type: obj.get("type").and_then(as_text).unwrap_or_default(),
            is_primary: as_flag(obj, &["isPrimary", "isPrimaryKey"]),
            is_unique: as_flag(obj, &["isUnique"]),
            is_nullable: as_flag(obj, &["isNullable"]),
            is_foreign: as_flag(obj, &["isForeign", "isForeignKey"]),
            references: obj.get("references").and_then(as_endpoint),
            enum_values: obj
                .get("enumValues")
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(as_text).collect()),
            default: obj.get("default").and_then(as_text),
            id,
        });
    }
    columns
}

pub(super) fn lower_relations(raw: Vec<Value>, log: &mut Diagnostics) -> Vec<RawRelation> {
    let mut relations = Vec::with_capacity(raw.len());

    for (i, value) in raw.iter().enumerate() {
        let Some(obj) = value.as_object() else {
            log.warning("INVALID_RELATION", format!("dropped relation #{i}: not an object"));
            continue;
        };
        let endpoints = (
            obj.get("from").and_then(as_raw_endpoint),
            obj.get("to").and_then(as_raw_endpoint),
        );
        let (Some(from), Some(to)) = endpoints else {
            log.warning(
                "INVALID_RELATION",
                format!("dropped relation #{i}: missing or malformed endpoint"),
            );
            continue;
        };

        let cardinality = match obj.get("cardinality").and_then(Value::as_str) {
            None => Cardinality::default(),
            Some(s) => Cardinality::parse(s).unwrap_or_else(|| {
                log.warning(
                    "UNKNOWN_CARDINALITY",
                    format!("relation #{i} has cardinality '{s}'; using one-to-many"),
                );
                Cardinality::default()
            }),
        };
        let rule = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .and_then(ReferentialAction::parse)
        };

        relations.push(RawRelation {
            id: obj.get("id").and_then(as_id),
            from,
            to,
            cardinality,
            reversed: obj
                .get("isOneToManyReversed")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            delete_rule: rule("deleteRule"),
            update_rule: rule("updateRule"),
        });
    }
    relations
}
