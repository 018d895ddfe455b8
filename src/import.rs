//! Merging compiled imports into a live graph.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::compiler::{CompileResult, Diagnostic, compile};
use crate::layout::AutoLayout;
use crate::store::SchemaGraph;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("the imported schema has no tables")]
    NoTables,
    #[error("the imported schema was rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub added_tables: usize,
    pub added_relations: usize,
    pub laid_out: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Add the tables and relations of `result` whose ids the graph does not
/// have yet. The merge is one undo step. When the import carried no
/// positions and added tables, `layout` places the whole graph.
pub fn merge_compiled(
    graph: &mut SchemaGraph,
    result: CompileResult,
    layout: Option<&dyn AutoLayout>,
) -> Result<MergeReport, ImportError> {
    if let Some(error) = result.errors().next() {
        return Err(ImportError::Rejected(error.message.clone()));
    }
    if result.patched_data.tables.is_empty() {
        return Err(ImportError::NoTables);
    }

    let (tables, relations, added_tables) = {
        let known_tables: HashSet<&str> = graph.tables().iter().map(|t| t.id.as_str()).collect();
        let known_relations: HashSet<&str> = graph.relations().iter().map(|r| r.id.as_str()).collect();

        let mut tables = graph.tables().to_vec();
        let before = tables.len();
        tables.extend(
            result
                .patched_data
                .tables
                .into_iter()
                .filter(|t| !known_tables.contains(t.id.as_str())),
        );
        let added_tables = tables.len() - before;

        let mut relations = graph.relations().to_vec();
        relations.extend(
            result
                .patched_data
                .relations
                .into_iter()
                .filter(|r| !known_relations.contains(r.id.as_str())),
        );
        (tables, relations, added_tables)
    };

    let relations_before = graph.relations().len();
    graph.record_history();
    graph.replace_graph(tables, relations);
    let added_relations = graph.relations().len().saturating_sub(relations_before);

    let laid_out = match layout {
        Some(engine) if result.requires_layout && added_tables > 0 => {
            let positions = engine.layout(graph.tables(), graph.relations());
            graph.apply_layout(&positions);
            true
        }
        _ => false,
    };

    info!(added_tables, added_relations, laid_out, "schema merged");
    Ok(MergeReport {
        added_tables,
        added_relations,
        laid_out,
        diagnostics: result.diagnostics,
    })
}

/// Compile untrusted schema JSON and merge it.
pub fn import_value(
    graph: &mut SchemaGraph,
    raw: &Value,
    layout: Option<&dyn AutoLayout>,
) -> Result<MergeReport, ImportError> {
    let result = compile(raw);
    debug!(diagnostics = result.diagnostics.len(), "import compiled");
    merge_compiled(graph, result, layout)
}
