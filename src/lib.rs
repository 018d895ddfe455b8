pub mod actions;
pub mod compiler;
pub mod ids;
pub mod import;
pub mod layout;
pub mod measure;
pub mod model;
pub mod naming;
pub mod project;
pub mod sql;
pub mod store;

use wasm_bindgen::prelude::*;

pub use compiler::{CompileResult, Diagnostic, Severity, compile, compile_str};
pub use layout::{AutoLayout, LayeredLayout, NodePosition};
pub use model::{Cardinality, Column, Endpoint, ProjectData, ReferentialAction, Relation, Table, Viewport};
pub use sql::generate_sql;
pub use store::SchemaGraph;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Compile untrusted schema JSON; returns the `CompileResult` as JSON.
#[wasm_bindgen(js_name = "compileSchema")]
pub fn compile_schema(input: &str) -> Result<String, String> {
    let result = compile_str(input);
    serde_json::to_string(&result).map_err(|e| e.to_string())
}

/// Compile a project and render it as PostgreSQL DDL.
#[wasm_bindgen(js_name = "generateSql")]
pub fn generate_sql_js(input: &str) -> Result<String, String> {
    let result = compile_str(input);
    if let Some(error) = result.errors().next() {
        return Err(error.to_string());
    }
    let project = result.patched_data;
    Ok(generate_sql(&project.tables, &project.relations))
}

/// Run the built-in layout; returns `[{ id, position: { x, y } }]` as JSON.
#[wasm_bindgen(js_name = "layoutSchema")]
pub fn layout_schema(input: &str) -> Result<String, String> {
    let project = ProjectData::from_json(input).map_err(|e| e.to_string())?;
    let positions = LayeredLayout::default().layout(&project.tables, &project.relations);
    serde_json::to_string(&positions).map_err(|e| e.to_string())
}
