//! Run artifact: the audit record written when a run completes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::state::{Proposal, WorkflowState};
use super::WorkflowError;

/// The persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub idea: String,
    pub features: Proposal,
    pub tech_stack: Proposal,
    pub tasks: Proposal,
}

impl From<&WorkflowState> for RunArtifact {
    fn from(state: &WorkflowState) -> Self {
        Self {
            idea: state.idea.clone(),
            features: state.features.clone(),
            tech_stack: state.tech_stack.clone(),
            tasks: state.tasks.clone(),
        }
    }
}

impl RunArtifact {
    /// Write to `<dir>/state_<YYYYmmdd_HHMMSS>.json` and return the path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, WorkflowError> {
        self.write_at(dir, Local::now())
    }

    /// Never replaces an existing artifact: a name already taken gets a
    /// `_<n>` suffix.
    pub fn write_at(&self, dir: &Path, at: DateTime<Local>) -> Result<PathBuf, WorkflowError> {
        fs::create_dir_all(dir).map_err(|e| io_error(dir, &e))?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| WorkflowError::Store(format!("serialize artifact: {e}")))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, &e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| io_error(dir, &e))?;

        let stem = file_stem(at);
        let mut attempt = 0u32;
        loop {
            let path = match attempt {
                0 => dir.join(format!("{stem}.json")),
                n => dir.join(format!("{stem}_{n}.json")),
            };
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::info!(path = %path.display(), "Run artifact written");
                    return Ok(path);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(path = %path.display(), "Artifact name taken");
                    tmp = e.file;
                    attempt += 1;
                }
                Err(e) => return Err(io_error(&path, &e.error)),
            }
        }
    }
}

fn io_error(path: &Path, e: &io::Error) -> WorkflowError {
    WorkflowError::Store(format!("{}: {e}", path.display()))
}

fn file_stem(at: DateTime<Local>) -> String {
    format!("state_{}", at.format("%Y%m%d_%H%M%S"))
}
