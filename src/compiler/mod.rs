//! Import compiler: turns arbitrary schema JSON into a well-formed project.
//!
//! [`compile`] is total. Whatever the input, it returns a patched
//! [`ProjectData`] plus a log of what was wrong and what was repaired.
//! Passes run in a fixed order and each relies on the ones before it:
//!
//! 1. safe defaults for the root, `tables`, `relations` and `viewport`
//! 2. recursive trimming of strings and object keys
//! 3. structural checks on tables and columns
//! 4. duplicate table ids, with relation endpoints remapped
//! 5. relation integrity (dangling tables dropped, missing columns synthesized)
//! 6. type normalization to the canonical lexicon
//! 7. relation inference from `*_id` / `*Id` column names
//! 8. layout detection

mod infer;
mod lower;
mod repair;
pub mod types;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::model::{ProjectData, Table};

pub use types::normalize_type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    /// Whether the compiler repaired the problem in `patchedData`.
    pub fixed: bool,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.code, self.message)?;
        if self.fixed {
            f.write_str(" (fixed)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    /// False exactly when an `error` diagnostic was raised.
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub patched_data: ProjectData,
    /// Set when there are tables and none of them carries a position.
    pub requires_layout: bool,
}

impl CompileResult {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }
}

#[derive(Debug, Default)]
struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    fn push(&mut self, severity: Severity, code: &str, message: String, fixed: bool) {
        self.entries.push(Diagnostic {
            severity,
            code: code.to_string(),
            message,
            fixed,
        });
    }

    fn error(&mut self, code: &str, message: impl Into<String>) {
        self.push(Severity::Error, code, message.into(), false);
    }

    fn warning(&mut self, code: &str, message: impl Into<String>) {
        self.push(Severity::Warning, code, message.into(), true);
    }

    fn info(&mut self, code: &str, message: impl Into<String>) {
        self.push(Severity::Info, code, message.into(), true);
    }
}

/// `{prefix}{n}` for the smallest `n >= start` not yet taken.
fn fresh_id(prefix: &str, start: usize, taken: impl Fn(&str) -> bool) -> String {
    let mut n = start;
    loop {
        let candidate = format!("{prefix}{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn requires_layout(tables: &[Table]) -> bool {
    !tables.is_empty() && tables.iter().all(|t| !t.has_position())
}

pub fn compile(raw: &Value) -> CompileResult {
    let mut log = Diagnostics::default();

    let root = lower::sanitize(raw.clone());
    let project = lower::safe_defaults(&root, &mut log);

    let mut tables = lower::lower_tables(project.tables, &mut log);
    let renames = repair::dedupe_table_ids(&mut tables, &mut log);

    let raw_relations = lower::lower_relations(project.relations, &mut log);
    let mut relations = repair::resolve_relations(&mut tables, raw_relations, &renames, &mut log);
    repair::clear_dangling_references(&mut tables, &renames, &mut log);

    types::normalize_types(&mut tables, &mut log);
    infer::infer_relations(&mut tables, &mut relations, &mut log);

    let requires_layout = requires_layout(&tables);
    let diagnostics = log.entries;
    let success = !diagnostics.iter().any(|d| d.severity == Severity::Error);
    debug!(
        tables = tables.len(),
        relations = relations.len(),
        diagnostics = diagnostics.len(),
        success,
        requires_layout,
        "schema compiled"
    );

    CompileResult {
        success,
        diagnostics,
        patched_data: ProjectData {
            tables,
            relations,
            viewport: project.viewport,
        },
        requires_layout,
    }
}

/// Compile JSON text. Unparseable input yields an empty project and an
/// `INVALID_JSON` error.
pub fn compile_str(input: &str) -> CompileResult {
    match serde_json::from_str::<Value>(input) {
        Ok(value) => compile(&value),
        Err(e) => CompileResult {
            success: false,
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                code: "INVALID_JSON".to_string(),
                message: format!("input is not valid JSON: {e}"),
                fixed: false,
            }],
            patched_data: ProjectData::default(),
            requires_layout: false,
        },
    }
}
