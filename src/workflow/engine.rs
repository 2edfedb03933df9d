//! Workflow engine: drives runs node by node and handles suspend/resume.
//!
//! The engine keeps no continuation in memory. Every transition is written
//! to the [`CheckpointStore`], and the next node is derived from the stored
//! cursor, so a suspended run can be resumed by a different process. A node
//! interrupted mid-way (crash, Ctrl-C) restarts from its beginning.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use super::artifact::RunArtifact;
use super::checkpoint::{validate_thread_id, Checkpoint, CheckpointStore};
use super::human::{DecisionProvider, HumanDecision, ReviewRequest};
use super::stage::{self, Cursor, StageStep};
use super::state::{Proposal, RunStatus, StatePatch, WorkflowState};
use super::WorkflowError;
use crate::agents::Agents;

/// Where a call to the engine left the run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// All three stages approved.
    Completed {
        state: WorkflowState,
        /// Path of the written run artifact, if an artifact directory is set
        artifact: Option<PathBuf>,
    },

    /// Waiting for a human decision; resume with `resume_token`.
    Suspended { awaiting: ReviewRequest, resume_token: String },

    /// Halted by a stage error; `state.error` holds the reason.
    Failed(WorkflowState),
}

impl RunOutcome {
    pub fn state(&self) -> &WorkflowState {
        match self {
            Self::Completed { state, .. } | Self::Failed(state) => state,
            Self::Suspended { awaiting, .. } => &awaiting.state,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Runs workflows against a set of agents and a checkpoint store.
pub struct Engine {
    agents: Agents,
    store: Arc<dyn CheckpointStore>,
    max_cycles: Option<u32>,
    artifact_dir: Option<PathBuf>,
}

/// Threads being advanced in this process, as `<store scope>/<thread id>`.
///
/// Shared by every engine, so two engines over the same store exclude each
/// other. Separate processes are not covered; the store is last-write-wins.
static LEASES: Mutex<BTreeSet<String>> = parking_lot::const_mutex(BTreeSet::new());

impl Engine {
    pub fn new(agents: Agents, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            agents,
            store,
            max_cycles: None,
            artifact_dir: None,
        }
    }

    /// Fail a stage once it has re-entered generation more than `limit` times.
    pub fn with_max_cycles(mut self, limit: Option<u32>) -> Self {
        self.max_cycles = limit;
        self
    }

    /// Write a [`RunArtifact`] into `dir` when a run completes.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Start a run for `idea` under `thread_id`.
    ///
    /// If the thread already exists it is continued instead: a suspended run
    /// returns its pending review again, an interrupted run restarts its
    /// current node, and a finished run is an error.
    pub async fn start(&self, idea: &str, thread_id: &str) -> Result<RunOutcome, WorkflowError> {
        validate_thread_id(thread_id)?;
        let _lease = self.lease(thread_id)?;

        let checkpoint = match self.store.load(thread_id)? {
            Some(existing) => {
                if existing.state.idea != idea.trim() {
                    tracing::warn!(thread_id, "Thread exists with a different idea; continuing it");
                }
                match existing.state.status {
                    RunStatus::Completed | RunStatus::Failed => {
                        return Err(WorkflowError::AlreadyFinished {
                            thread_id: thread_id.to_string(),
                            status: existing.state.status,
                        });
                    }
                    RunStatus::Suspended => {
                        if let Some(awaiting) = existing.awaiting() {
                            return Ok(RunOutcome::Suspended {
                                awaiting,
                                resume_token: existing.thread_id,
                            });
                        }
                        existing
                    }
                    RunStatus::Running => {
                        tracing::info!(
                            thread_id,
                            cursor = %existing.cursor,
                            "Continuing interrupted run"
                        );
                        existing
                    }
                }
            }
            None => {
                let mut checkpoint = Checkpoint::new(thread_id, WorkflowState::new(idea)?);
                tracing::info!(thread_id, "Starting run");
                self.save(&mut checkpoint)?;
                checkpoint
            }
        };

        self.drive(checkpoint).await
    }

    /// Resume a suspended run with the operator's decision.
    pub async fn resume(
        &self,
        thread_id: &str,
        decision: HumanDecision,
    ) -> Result<RunOutcome, WorkflowError> {
        validate_thread_id(thread_id)?;
        let _lease = self.lease(thread_id)?;

        let mut checkpoint = self
            .store
            .load(thread_id)?
            .ok_or_else(|| WorkflowError::UnknownThread(thread_id.to_string()))?;

        if checkpoint.state.status.is_terminal() {
            return Err(WorkflowError::AlreadyFinished {
                thread_id: thread_id.to_string(),
                status: checkpoint.state.status,
            });
        }
        if checkpoint.awaiting().is_none() {
            return Err(WorkflowError::NotSuspended(thread_id.to_string()));
        }

        let stage = checkpoint.cursor.stage;
        tracing::info!(
            thread_id,
            %stage,
            approved = decision.is_approval(),
            "Human decision received"
        );

        let Some(patch) = stage::human_review(&checkpoint.state, stage, &decision) else {
            return self.fail(checkpoint, WorkflowError::Rejected(stage));
        };
        checkpoint.state.apply(patch);
        checkpoint.state.apply(StatePatch::Status(RunStatus::Running));
        self.advance(&mut checkpoint);
        self.save(&mut checkpoint)?;

        self.drive(checkpoint).await
    }

    /// The review a thread is waiting on, if it is suspended.
    pub fn pending(&self, thread_id: &str) -> Result<Option<ReviewRequest>, WorkflowError> {
        let checkpoint = self
            .store
            .load(thread_id)?
            .ok_or_else(|| WorkflowError::UnknownThread(thread_id.to_string()))?;
        Ok(checkpoint.awaiting())
    }

    /// Answer suspensions from `decisions` until the run finishes or the
    /// provider has no decision.
    pub async fn settle(
        &self,
        mut outcome: RunOutcome,
        decisions: &mut dyn DecisionProvider,
    ) -> anyhow::Result<RunOutcome> {
        loop {
            let RunOutcome::Suspended { awaiting, resume_token } = &outcome else {
                return Ok(outcome);
            };
            let decision = decisions.decide(awaiting).await?;
            let Some(decision) = decision else {
                return Ok(outcome);
            };
            let thread_id = resume_token.clone();
            outcome = self.resume(&thread_id, decision).await?;
        }
    }

    async fn drive(&self, mut checkpoint: Checkpoint) -> Result<RunOutcome, WorkflowError> {
        loop {
            if checkpoint.cursor.is_finished() {
                return self.finalize(checkpoint);
            }

            let Cursor { stage, step } = checkpoint.cursor;
            let agents = self.agents.for_stage(stage);
            tracing::debug!(thread_id = %checkpoint.thread_id, %stage, %step, "Running node");

            let result = match step {
                StageStep::Generate => match self.max_cycles {
                    Some(limit) if checkpoint.cycles > limit => {
                        Err(WorkflowError::CycleLimit { stage, limit })
                    }
                    _ => stage::generate(&checkpoint.state, stage, agents.generator.as_ref()).await,
                },
                StageStep::AutoReview => {
                    stage::auto_review(&checkpoint.state, stage, agents.reviewer.as_ref()).await
                }
                StageStep::HumanReview => return self.suspend(checkpoint),
                StageStep::Done => {
                    self.advance(&mut checkpoint);
                    continue;
                }
            };

            match result {
                Ok(patch) => checkpoint.state.apply(patch),
                Err(e) if e.is_stage_error() => return self.fail(checkpoint, e),
                Err(e) => return Err(e),
            }
            if step == StageStep::Generate {
                checkpoint.cycles += 1;
            }

            self.advance(&mut checkpoint);
            self.save(&mut checkpoint)?;
        }
    }

    fn advance(&self, checkpoint: &mut Checkpoint) {
        let from = checkpoint.cursor;
        let to = from.advance(&checkpoint.state);
        if to.stage != from.stage {
            tracing::info!(
                thread_id = %checkpoint.thread_id,
                stage = %from.stage,
                "Stage approved"
            );
            checkpoint.cycles = 0;
        }
        tracing::debug!(thread_id = %checkpoint.thread_id, %from, %to, "Transition");
        checkpoint.cursor = to;
    }

    fn suspend(&self, mut checkpoint: Checkpoint) -> Result<RunOutcome, WorkflowError> {
        checkpoint.state.apply(StatePatch::Status(RunStatus::Suspended));
        self.save(&mut checkpoint)?;

        let stage = checkpoint.cursor.stage;
        tracing::info!(thread_id = %checkpoint.thread_id, %stage, "Waiting for human review");

        Ok(RunOutcome::Suspended {
            awaiting: ReviewRequest::from_state(&checkpoint.state, stage),
            resume_token: checkpoint.thread_id,
        })
    }

    fn fail(
        &self,
        mut checkpoint: Checkpoint,
        error: WorkflowError,
    ) -> Result<RunOutcome, WorkflowError> {
        tracing::error!(
            thread_id = %checkpoint.thread_id,
            cursor = %checkpoint.cursor,
            error = %error,
            "Run failed"
        );
        // A failed stage commits nothing; its proposal goes back to empty
        let stage = checkpoint.cursor.stage;
        checkpoint.state.apply(StatePatch::Proposal { stage, proposal: Proposal::default() });
        checkpoint.state.apply(StatePatch::Failed { error: error.to_string() });
        self.save(&mut checkpoint)?;
        Ok(RunOutcome::Failed(checkpoint.state))
    }

    /// Write the artifact, then mark the run completed.
    ///
    /// If the artifact cannot be written the checkpoint stays `Running` at
    /// the end of the last stage, so `start` on the thread retries this step.
    fn finalize(&self, mut checkpoint: Checkpoint) -> Result<RunOutcome, WorkflowError> {
        let artifact = self
            .artifact_dir
            .as_deref()
            .map(|dir| RunArtifact::from(&checkpoint.state).write(dir))
            .transpose()
            .inspect_err(|e| {
                tracing::error!(
                    thread_id = %checkpoint.thread_id,
                    error = %e,
                    "Run artifact not written; thread left resumable"
                );
            })?;

        checkpoint.state.apply(StatePatch::Status(RunStatus::Completed));
        self.save(&mut checkpoint)?;

        tracing::info!(thread_id = %checkpoint.thread_id, "Run completed");
        Ok(RunOutcome::Completed { state: checkpoint.state, artifact })
    }

    fn save(&self, checkpoint: &mut Checkpoint) -> Result<(), WorkflowError> {
        checkpoint.touch();
        self.store.save(checkpoint)
    }

    fn lease(&self, thread_id: &str) -> Result<Lease, WorkflowError> {
        let key = format!("{}/{thread_id}", self.store.scope());
        if !LEASES.lock().insert(key.clone()) {
            return Err(WorkflowError::ThreadBusy(thread_id.to_string()));
        }
        Ok(Lease { key })
    }
}

/// Exclusive in-process claim on a thread, released on drop.
struct Lease {
    key: String,
}

impl Drop for Lease {
    fn drop(&mut self) {
        LEASES.lock().remove(&self.key);
    }
}
