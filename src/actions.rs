//! Structured edit commands, as produced by an assistant, applied to a graph.
//!
//! Each command arrives as `{ "type": "...", "data": { ... } }`. Commands run
//! in order; one failing does not stop the rest.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::import::{ImportError, import_value};
use crate::layout::AutoLayout;
use crate::compiler::normalize_type;
use crate::model::{Cardinality, Column, Table};
use crate::store::{LinkError, SchemaGraph, TableUpdate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unsupported action '{0}'")]
    Unsupported(String),
    #[error("invalid data for '{kind}': {source}")]
    InvalidData {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown cardinality '{0}'")]
    UnknownCardinality(String),
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("relation '{0}' not found")]
    RelationNotFound(String),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_nullable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateTable {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTable {
    pub table_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTable {
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRelation {
    pub from_table_id: String,
    pub from_column_id: String,
    pub to_table_id: String,
    pub to_column_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRelation {
    pub relation_id: String,
    pub cardinality: String,
    #[serde(default)]
    pub reverse: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRelation {
    pub relation_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportSchema {
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateTable(CreateTable),
    UpdateTable(UpdateTable),
    DeleteTable(DeleteTable),
    CreateRelation(CreateRelation),
    UpdateRelation(UpdateRelation),
    DeleteRelation(DeleteRelation),
    Layout,
    ImportSchema(ImportSchema),
}

fn data<T: for<'de> Deserialize<'de>>(envelope: &ActionEnvelope) -> Result<T, ActionError> {
    serde_json::from_value(envelope.data.clone()).map_err(|source| ActionError::InvalidData {
        kind: envelope.kind.clone(),
        source,
    })
}

impl TryFrom<&ActionEnvelope> for Action {
    type Error = ActionError;

    fn try_from(envelope: &ActionEnvelope) -> Result<Self, Self::Error> {
        Ok(match envelope.kind.as_str() {
            "create_table" => Self::CreateTable(data(envelope)?),
            "update_table" => Self::UpdateTable(data(envelope)?),
            "delete_table" => Self::DeleteTable(data(envelope)?),
            "create_relation" => Self::CreateRelation(data(envelope)?),
            "update_relation" => Self::UpdateRelation(data(envelope)?),
            "delete_relation" => Self::DeleteRelation(data(envelope)?),
            "layout" => Self::Layout,
            "import_schema" => Self::ImportSchema(data(envelope)?),
            other => return Err(ActionError::Unsupported(other.to_string())),
        })
    }
}

impl Action {
    /// Apply to `graph`, returning a one-line summary.
    pub fn apply(self, graph: &mut SchemaGraph, layout: &dyn AutoLayout) -> Result<String, ActionError> {
        match self {
            Self::CreateTable(args) => Ok(create_table(graph, args)),
            Self::UpdateTable(args) => {
                let update = TableUpdate {
                    name: args.name,
                    x: args.x,
                    y: args.y,
                };
                if !graph.update_table(&args.table_id, update) {
                    return Err(ActionError::TableNotFound(args.table_id));
                }
                Ok(format!("updated table {}", args.table_id))
            }
            Self::DeleteTable(args) => {
                let id = args
                    .table_id
                    .as_deref()
                    .and_then(|id| graph.table(id))
                    .or_else(|| args.table_name.as_deref().and_then(|name| graph.table_by_name(name)))
                    .map(|t| t.id.clone());
                let Some(id) = id else {
                    let wanted = args.table_id.or(args.table_name).unwrap_or_default();
                    return Err(ActionError::TableNotFound(wanted));
                };
                graph.remove_table(&id);
                Ok(format!("deleted table {id}"))
            }
            Self::CreateRelation(args) => {
                graph.start_relation(&args.from_table_id, &args.from_column_id);
                let id = graph.commit_relation(&args.to_table_id, &args.to_column_id)?;
                Ok(format!("created relation {id}"))
            }
            Self::UpdateRelation(args) => {
                let cardinality = Cardinality::parse(&args.cardinality)
                    .ok_or_else(|| ActionError::UnknownCardinality(args.cardinality.clone()))?;
                let current = graph
                    .relation(&args.relation_id)
                    .map(|r| r.is_one_to_many_reversed)
                    .ok_or_else(|| ActionError::RelationNotFound(args.relation_id.clone()))?;
                let reverse = args.reverse.unwrap_or(current);
                graph.update_relation_cardinality(&args.relation_id, cardinality, reverse)?;
                Ok(format!("updated relation {}", args.relation_id))
            }
            Self::DeleteRelation(args) => {
                if !graph.delete_relation(&args.relation_id) {
                    return Err(ActionError::RelationNotFound(args.relation_id));
                }
                Ok(format!("deleted relation {}", args.relation_id))
            }
            Self::Layout => {
                let positions = layout.layout(graph.tables(), graph.relations());
                graph.record_history();
                let moved = graph.apply_layout(&positions);
                Ok(format!("arranged {moved} tables"))
            }
            Self::ImportSchema(args) => {
                let report = import_value(graph, &args.schema, Some(layout))?;
                Ok(format!(
                    "imported {} tables and {} relations",
                    report.added_tables, report.added_relations
                ))
            }
        }
    }
}

/// Build the whole table up front so the action is a single undo step.
/// Types go through the same lexicon as imports.
fn create_table(graph: &mut SchemaGraph, args: CreateTable) -> String {
    let name = args
        .name
        .unwrap_or_else(|| graph.config().default_table_name.clone());
    let mut table = Table::new("", name);
    table.x = args.x;
    table.y = args.y;

    for input in args.columns {
        let column_type = match input.column_type.as_deref() {
            Some(raw) => normalize_type(raw).unwrap_or("varchar").to_string(),
            None => graph.config().default_column_type.clone(),
        };
        let mut column = Column::new("", input.name, column_type);
        column.is_primary = input.is_primary;
        column.is_unique = input.is_unique;
        column.is_nullable = input.is_nullable.unwrap_or(!input.is_primary);
        table.columns.push(column);
    }

    let id = graph.insert_table(table);
    format!("created table {id}")
}

#[derive(Debug)]
pub struct ActionOutcome {
    pub kind: String,
    pub result: Result<String, ActionError>,
}

impl ActionOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every envelope in order and report each outcome.
pub fn apply_actions(
    graph: &mut SchemaGraph,
    actions: &[ActionEnvelope],
    layout: &dyn AutoLayout,
) -> Vec<ActionOutcome> {
    actions
        .iter()
        .map(|envelope| {
            let result = Action::try_from(envelope).and_then(|action| action.apply(graph, layout));
            match &result {
                Ok(summary) => debug!(kind = %envelope.kind, "{summary}"),
                Err(e) => warn!(kind = %envelope.kind, error = %e, "action failed"),
            }
            ActionOutcome {
                kind: envelope.kind.clone(),
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::layout::LayeredLayout;
    use crate::store::StoreConfig;
    use serde_json::json;

    fn graph() -> SchemaGraph {
        SchemaGraph::with_config(StoreConfig::default(), Box::new(SequentialIds::new("id")))
    }

    fn envelopes(value: Value) -> Vec<ActionEnvelope> {
        serde_json::from_value(value).unwrap()
    }

    fn run(graph: &mut SchemaGraph, value: Value) -> Vec<ActionOutcome> {
        apply_actions(graph, &envelopes(value), &LayeredLayout::default())
    }

    #[test]
    fn test_create_table_with_columns() {
        let mut g = graph();
        let outcomes = run(
            &mut g,
            json!([{ "type": "create_table", "data": {
                "name": "users", "x": 10, "y": 20,
                "columns": [
                    { "name": "id", "type": "uuid", "isPrimary": true },
                    { "name": "email", "type": "varchar", "isUnique": true, "isNullable": false }
                ]
            }}]),
        );
        assert!(outcomes[0].is_ok());

        let users = g.table_by_name("users").unwrap();
        assert_eq!(users.position(), (10.0, 20.0));
        assert_eq!(users.columns.len(), 2);
        assert!(users.columns[0].is_primary);
        assert_eq!(users.columns[0].column_type, "uuid");
        assert!(users.columns[1].is_unique);
        assert!(!users.columns[1].is_nullable);
    }

    #[test]
    fn test_create_table_normalizes_types_in_one_step() {
        let mut g = graph();
        let outcomes = run(
            &mut g,
            json!([{ "type": "create_table", "data": {
                "name": "orders",
                "columns": [
                    { "name": "id", "type": "number", "isPrimary": true },
                    { "name": "total", "type": "number" },
                    { "name": "placed", "type": "datetime" },
                    { "name": "note", "type": "blob" },
                    { "name": "memo" }
                ]
            }}]),
        );
        assert!(outcomes[0].is_ok());
        assert_eq!(g.history().undo_depth(), 1);

        let orders = g.table_by_name("orders").unwrap();
        let types: Vec<&str> = orders.columns.iter().map(|c| c.column_type.as_str()).collect();
        assert_eq!(types, ["int", "int", "timestamp", "varchar", "text"]);
        assert!(!orders.columns[0].is_nullable);
        assert!(orders.columns[1].is_nullable);

        let sql = crate::sql::generate_sql_at(g.tables(), g.relations(), "t");
        assert!(sql.contains("\"id\" SERIAL"));
        assert!(sql.contains("\"total\" INTEGER"));

        assert!(g.undo());
        assert!(g.tables().is_empty());
    }

    #[test]
    fn test_relation_lifecycle() {
        let mut g = graph();
        run(
            &mut g,
            json!([
                { "type": "create_table", "data": { "name": "users", "columns": [{ "name": "id", "type": "uuid", "isPrimary": true }] } },
                { "type": "create_table", "data": { "name": "posts", "columns": [{ "name": "id", "type": "int", "isPrimary": true }] } }
            ]),
        );
        let users = g.table_by_name("users").unwrap().clone();
        let posts = g.table_by_name("posts").unwrap().clone();

        let outcomes = run(
            &mut g,
            json!([{ "type": "create_relation", "data": {
                "fromTableId": users.id, "fromColumnId": users.columns[0].id,
                "toTableId": posts.id, "toColumnId": posts.columns[0].id
            }}]),
        );
        assert!(outcomes[0].is_ok(), "{:?}", outcomes[0].result);
        let rel_id = g.relations()[0].id.clone();

        let outcomes = run(
            &mut g,
            json!([
                { "type": "update_relation", "data": { "relationId": rel_id, "cardinality": "many-to-many" } },
                { "type": "delete_relation", "data": { "relationId": rel_id } }
            ]),
        );
        assert!(outcomes.iter().all(ActionOutcome::is_ok));
        assert!(g.relations().is_empty());
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let mut g = graph();
        let outcomes = run(
            &mut g,
            json!([
                { "type": "drop_database", "data": {} },
                { "type": "delete_table", "data": { "tableName": "ghost" } },
                { "type": "update_relation", "data": { "relationId": "r", "cardinality": "lots" } },
                { "type": "create_table", "data": { "name": "kept" } }
            ]),
        );
        assert!(matches!(outcomes[0].result, Err(ActionError::Unsupported(_))));
        assert!(matches!(outcomes[1].result, Err(ActionError::TableNotFound(_))));
        assert!(matches!(outcomes[2].result, Err(ActionError::UnknownCardinality(_))));
        assert!(outcomes[3].is_ok());
        assert!(g.table_by_name("kept").is_some());
    }

    #[test]
    fn test_invalid_data() {
        let mut g = graph();
        let outcomes = run(&mut g, json!([{ "type": "update_table", "data": { "name": "x" } }]));
        assert!(matches!(outcomes[0].result, Err(ActionError::InvalidData { .. })));
    }

    #[test]
    fn test_update_and_delete_table() {
        let mut g = graph();
        run(&mut g, json!([{ "type": "create_table", "data": { "name": "a" } }]));
        let id = g.tables()[0].id.clone();

        let outcomes = run(
            &mut g,
            json!([{ "type": "update_table", "data": { "tableId": id, "name": "b", "x": 5, "y": 6 } }]),
        );
        assert!(outcomes[0].is_ok());
        assert_eq!(g.tables()[0].name, "b");
        assert_eq!(g.tables()[0].position(), (5.0, 6.0));

        let outcomes = run(&mut g, json!([{ "type": "delete_table", "data": { "tableId": id } }]));
        assert!(outcomes[0].is_ok());
        assert!(g.tables().is_empty());
    }

    #[test]
    fn test_import_and_layout() {
        let mut g = graph();
        let outcomes = run(
            &mut g,
            json!([
                { "type": "import_schema", "data": { "schema": { "tables": [
                    { "id": "u", "name": "users", "columns": [{ "id": "u1", "name": "id", "isPrimary": true }] }
                ] } } },
                { "type": "layout" }
            ]),
        );
        assert!(outcomes.iter().all(ActionOutcome::is_ok));
        assert!(g.table("u").unwrap().has_position());
        assert!(g.can_undo());
    }
}
