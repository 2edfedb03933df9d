//! Propose, review, approve workflow.
//!
//! Three stages run in a fixed order: features, tech stack, tasks. Each
//! stage loops through generate, automated review and human review until
//! both reviews approve. Human review suspends the run; the state is
//! checkpointed by thread id and the run resumes when a decision arrives,
//! possibly in a later process.
//!
//! ## Modules
//!
//! - `state` - proposals, the shared state, and patches
//! - `stage` - the per-stage state machine and its node functions
//! - `human` - decisions and the review request payload
//! - `checkpoint` - checkpoint stores (memory, file)
//! - `engine` - drives runs and handles suspend/resume
//! - `artifact` - the JSON record of a completed run
//! - `graph` - mermaid rendering

mod artifact;
mod checkpoint;
mod engine;
pub mod graph;
mod human;
mod stage;
mod state;

pub use artifact::RunArtifact;
pub use checkpoint::{validate_thread_id, Checkpoint, CheckpointStore, FileStore, MemoryStore};
pub use engine::{Engine, RunOutcome};
pub use human::{DecisionProvider, HumanDecision, ReviewRequest, ScriptedDecisions};
pub use stage::{Cursor, StageStep};
pub use state::{Proposal, RunStatus, Stage, StatePatch, WorkflowState};

use crate::ai::AIError;

/// Workflow error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{stage} generation failed: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: AIError,
    },

    #[error("{stage} review failed: {source}")]
    Review {
        stage: Stage,
        #[source]
        source: AIError,
    },

    #[error("{stage} requires approved {dependency}")]
    MissingDependency { stage: Stage, dependency: Stage },

    #[error("{stage} exceeded {limit} revision cycles")]
    CycleLimit { stage: Stage, limit: u32 },

    #[error("{0} rejected by user")]
    Rejected(Stage),

    #[error("Unknown thread: {0}")]
    UnknownThread(String),

    #[error("Thread {0} is already being advanced")]
    ThreadBusy(String),

    #[error("Thread {0} is not waiting for a review")]
    NotSuspended(String),

    #[error("Thread {thread_id} already {status}")]
    AlreadyFinished { thread_id: String, status: RunStatus },

    #[error("Checkpoint store error: {0}")]
    Store(String),
}

impl WorkflowError {
    /// Errors raised inside a stage; they are recorded in the state and end
    /// the run instead of propagating.
    pub fn is_stage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::Generation { .. }
                | Self::Review { .. }
                | Self::MissingDependency { .. }
                | Self::CycleLimit { .. }
                | Self::Rejected(_)
        )
    }
}
