//! Checkpoint persistence keyed by thread id.
//!
//! A checkpoint is written after every transition, so a run can be resumed
//! after the process exits. The pending review request is not stored; it is
//! derived from the state and cursor on load.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::human::ReviewRequest;
use super::stage::{Cursor, StageStep};
use super::state::{RunStatus, WorkflowState};
use super::WorkflowError;

/// Saved progress of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,

    pub state: WorkflowState,

    /// Next node to execute
    pub cursor: Cursor,

    /// Generation passes in the current stage
    #[serde(default)]
    pub cycles: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint at the start of the workflow.
    pub fn new(thread_id: impl Into<String>, state: WorkflowState) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.into(),
            state,
            cursor: Cursor::start(),
            cycles: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The review request a suspended run is waiting on.
    pub fn awaiting(&self) -> Option<ReviewRequest> {
        (self.state.status == RunStatus::Suspended && self.cursor.step == StageStep::HumanReview)
            .then(|| ReviewRequest::from_state(&self.state, self.cursor.stage))
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Storage for checkpoints.
///
/// Writes are last-write-wins; callers serialize access per thread id.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), WorkflowError>;

    fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, WorkflowError>;

    /// All checkpoints, most recently updated first.
    fn list(&self) -> Result<Vec<Checkpoint>, WorkflowError>;

    /// Remove a checkpoint; returns whether it existed.
    fn delete(&self, thread_id: &str) -> Result<bool, WorkflowError>;

    /// Identifies the backing storage; two stores over the same data
    /// return the same scope.
    fn scope(&self) -> String;
}

/// In-process store.
#[derive(Debug)]
pub struct MemoryStore {
    id: uuid::Uuid,
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { id: uuid::Uuid::new_v4(), checkpoints: RwLock::new(HashMap::new()) }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointStore for MemoryStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), WorkflowError> {
        self.checkpoints.write().insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, WorkflowError> {
        Ok(self.checkpoints.read().get(thread_id).cloned())
    }

    fn list(&self) -> Result<Vec<Checkpoint>, WorkflowError> {
        let mut all: Vec<_> = self.checkpoints.read().values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    fn delete(&self, thread_id: &str) -> Result<bool, WorkflowError> {
        Ok(self.checkpoints.write().remove(thread_id).is_some())
    }

    fn scope(&self) -> String {
        format!("memory:{}", self.id)
    }
}

/// One JSON file per thread under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &str) -> Result<PathBuf, WorkflowError> {
        validate_thread_id(thread_id)?;
        Ok(self.dir.join(format!("{thread_id}.json")))
    }
}

impl CheckpointStore for FileStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), WorkflowError> {
        let path = self.path_for(&checkpoint.thread_id)?;
        fs::create_dir_all(&self.dir).map_err(|e| store_error(&self.dir, &e))?;

        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| WorkflowError::Store(format!("serialize checkpoint: {e}")))?;

        // Write to a sibling temp file and rename so readers never see a partial file
        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| store_error(&self.dir, &e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| store_error(&path, &e))?;
        tmp.persist(&path).map_err(|e| store_error(&path, &e.error))?;

        tracing::debug!(
            thread_id = %checkpoint.thread_id,
            cursor = %checkpoint.cursor,
            status = %checkpoint.state.status,
            "Checkpoint saved"
        );
        Ok(())
    }

    fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, WorkflowError> {
        let path = self.path_for(thread_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| store_error(&path, &e))?;
        let checkpoint = serde_json::from_str(&content)
            .map_err(|e| WorkflowError::Store(format!("{}: {e}", path.display())))?;

        tracing::debug!(thread_id, "Checkpoint loaded");
        Ok(Some(checkpoint))
    }

    fn list(&self) -> Result<Vec<Checkpoint>, WorkflowError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| store_error(&self.dir, &e))?;
        let mut all = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    serde_json::from_str::<Checkpoint>(&content).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(checkpoint) => all.push(checkpoint),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable checkpoint"
                    );
                }
            }
        }

        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    fn delete(&self, thread_id: &str) -> Result<bool, WorkflowError> {
        let path = self.path_for(thread_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(store_error(&path, &e)),
        }
    }

    fn scope(&self) -> String {
        // Not canonicalized: the directory may not exist yet
        let dir = std::path::absolute(&self.dir).unwrap_or_else(|_| self.dir.clone());
        format!("file:{}", dir.display())
    }
}

/// Thread ids become file names: ASCII letters, digits, `-` and `_` only.
pub fn validate_thread_id(thread_id: &str) -> Result<(), WorkflowError> {
    let valid = !thread_id.is_empty()
        && thread_id.len() <= 128
        && thread_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WorkflowError::InvalidInput(format!("invalid thread id '{thread_id}'")))
    }
}

fn store_error(path: &Path, e: &std::io::Error) -> WorkflowError {
    WorkflowError::Store(format!("{}: {e}", path.display()))
}
