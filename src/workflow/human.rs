//! Human checkpoint: decisions and the review request shown to the operator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::state::{Stage, WorkflowState};

/// What the operator decided at a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "changes")]
pub enum HumanDecision {
    Approve,
    RequestChanges(String),
    /// Stop the run; recorded as a failure
    Reject,
}

impl HumanDecision {
    /// Interpret raw operator input: empty approves, anything else is a
    /// change request.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            Self::Approve
        } else {
            Self::RequestChanges(input.to_string())
        }
    }

    /// Whether this approves the proposal; a blank change request does.
    pub fn is_approval(&self) -> bool {
        match self {
            Self::Approve => true,
            Self::RequestChanges(request) => request.trim().is_empty(),
            Self::Reject => false,
        }
    }
}

/// Payload of a suspended run.
///
/// Built only from the persisted state, so asking twice yields the same
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Stage awaiting review
    pub stage: Stage,

    pub message: String,

    /// Items under review
    pub items: Vec<String>,

    /// Decisions the operator may give
    pub options: Vec<String>,

    /// Full state at suspension
    pub state: WorkflowState,
}

impl ReviewRequest {
    pub fn from_state(state: &WorkflowState, stage: Stage) -> Self {
        Self {
            stage,
            message: format!("Please review the proposed {}", stage.kind()),
            items: state.proposal(stage).items.clone(),
            options: ["approve", "request_changes", "reject"].map(String::from).to_vec(),
            state: state.clone(),
        }
    }
}

/// Supplies decisions for suspended runs.
///
/// Returning `None` leaves the run suspended; it can be resumed later by
/// thread id.
#[async_trait]
pub trait DecisionProvider: Send {
    async fn decide(&mut self, request: &ReviewRequest) -> anyhow::Result<Option<HumanDecision>>;
}

/// Decisions replayed from a list, then `None`.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    decisions: std::collections::VecDeque<HumanDecision>,
}

impl ScriptedDecisions {
    pub fn new(decisions: impl IntoIterator<Item = HumanDecision>) -> Self {
        Self { decisions: decisions.into_iter().collect() }
    }

    /// Approve every checkpoint (`n` decisions).
    pub fn approve_all(n: usize) -> Self {
        Self::new(std::iter::repeat(HumanDecision::Approve).take(n))
    }
}

#[async_trait]
impl DecisionProvider for ScriptedDecisions {
    async fn decide(&mut self, _request: &ReviewRequest) -> anyhow::Result<Option<HumanDecision>> {
        Ok(self.decisions.pop_front())
    }
}
