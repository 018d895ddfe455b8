//! Reading and writing `.dbb` / `.json` project files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::compiler::{CompileResult, compile};
use crate::model::ProjectData;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("project rejected with {0} error(s)")]
    Rejected(usize),
}

impl ProjectData {
    /// Parse a project document. Missing `relations` and `viewport` default;
    /// unknown fields are ignored.
    pub fn from_json(text: &str) -> Result<Self, ProjectError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Pretty-printed JSON with all three top-level keys.
    pub fn to_json_pretty(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let project = Self::from_json(&text)?;
        debug!(path = %path.display(), tables = project.tables.len(), "project loaded");
        Ok(project)
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        let path = path.as_ref();
        let text = self.to_json_pretty()?;
        fs::write(path, text).map_err(|source| ProjectError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), tables = self.tables.len(), "project saved");
        Ok(())
    }
}

/// Run the compiler as a pre-save gate. Fails when it raises any error.
pub fn validate_for_save(project: &ProjectData) -> Result<CompileResult, ProjectError> {
    let result = compile(&serde_json::to_value(project)?);
    match result.errors().count() {
        0 => Ok(result),
        n => Err(ProjectError::Rejected(n)),
    }
}
