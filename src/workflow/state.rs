//! Workflow state: the idea, one proposal per stage, and the run status.
//!
//! Node functions never mutate a [`WorkflowState`] directly. They read a
//! snapshot and return a [`StatePatch`], which the engine merges with
//! [`WorkflowState::apply`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::WorkflowError;

/// One of the three fixed pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Features,
    TechStack,
    Tasks,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 3] = [Self::Features, Self::TechStack, Self::Tasks];

    /// Key of the proposal slot (also used in artifacts).
    pub fn key(self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::TechStack => "tech_stack",
            Self::Tasks => "tasks",
        }
    }

    /// Name of the top-level graph node running this stage.
    pub fn node_name(self) -> &'static str {
        match self {
            Self::Features => "requirement_analysis",
            Self::TechStack => "techstack_discovery",
            Self::Tasks => "task_creation",
        }
    }

    /// What the stage's items are called in prompts.
    pub fn kind(self) -> &'static str {
        match self {
            Self::Features => "use-cases",
            Self::TechStack => "tech stack items",
            Self::Tasks => "tasks",
        }
    }

    /// Stages whose approved items this stage reads.
    pub fn dependencies(self) -> &'static [Self] {
        match self {
            Self::Features => &[],
            Self::TechStack => &[Self::Features],
            Self::Tasks => &[Self::Features, Self::TechStack],
        }
    }

    /// The stage that runs after this one.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Features => Some(Self::TechStack),
            Self::TechStack => Some(Self::Tasks),
            Self::Tasks => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The artifact owned by one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposed items, in priority order
    pub items: Vec<String>,

    /// Revision the next generation pass must satisfy
    pub change_request: Option<String>,

    /// Set by the automated reviewer
    pub auto_approved: bool,

    /// Set by the human checkpoint
    pub human_approved: bool,
}

impl Proposal {
    /// Both the reviewer and the human accepted the items.
    pub fn is_approved(&self) -> bool {
        self.auto_approved && self.human_approved
    }

    /// The pending change request, if any non-blank one is set.
    pub fn pending_change_request(&self) -> Option<&str> {
        self.change_request.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// Whether nothing has been generated yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Suspended,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether the run can no longer make progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Shared state of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The original idea; never changes during a run
    pub idea: String,

    pub features: Proposal,

    pub tech_stack: Proposal,

    pub tasks: Proposal,

    /// Reason the run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub status: RunStatus,
}

impl WorkflowState {
    /// Create the initial state for an idea.
    pub fn new(idea: &str) -> Result<Self, WorkflowError> {
        let idea = idea.trim();
        if idea.is_empty() {
            return Err(WorkflowError::InvalidInput("idea must not be empty".to_string()));
        }

        Ok(Self {
            idea: idea.to_string(),
            features: Proposal::default(),
            tech_stack: Proposal::default(),
            tasks: Proposal::default(),
            error: None,
            status: RunStatus::Running,
        })
    }

    /// The proposal owned by a stage.
    pub fn proposal(&self, stage: Stage) -> &Proposal {
        match stage {
            Stage::Features => &self.features,
            Stage::TechStack => &self.tech_stack,
            Stage::Tasks => &self.tasks,
        }
    }

    fn proposal_mut(&mut self, stage: Stage) -> &mut Proposal {
        match stage {
            Stage::Features => &mut self.features,
            Stage::TechStack => &mut self.tech_stack,
            Stage::Tasks => &mut self.tasks,
        }
    }

    /// Merge a patch produced by a node.
    pub fn apply(&mut self, patch: StatePatch) {
        match patch {
            StatePatch::Proposal { stage, proposal } => *self.proposal_mut(stage) = proposal,
            StatePatch::Status(status) => self.status = status,
            StatePatch::Failed { error } => {
                self.error = Some(error);
                self.status = RunStatus::Failed;
            }
        }
    }

    /// First dependency of `stage` that is not fully approved.
    pub fn missing_dependency(&self, stage: Stage) -> Option<Stage> {
        stage.dependencies().iter().copied().find(|dep| {
            let proposal = self.proposal(*dep);
            proposal.is_empty() || !proposal.is_approved()
        })
    }
}

/// A partial update returned by a node function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatePatch {
    /// Replace one stage's proposal wholesale.
    Proposal { stage: Stage, proposal: Proposal },

    /// Change the run status.
    Status(RunStatus),

    /// Record an error and stop the run.
    Failed { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved(items: &[&str]) -> Proposal {
        Proposal {
            items: items.iter().map(|s| s.to_string()).collect(),
            change_request: None,
            auto_approved: true,
            human_approved: true,
        }
    }

    #[test]
    fn test_new_state_rejects_blank_idea() {
        assert!(matches!(WorkflowState::new("   "), Err(WorkflowError::InvalidInput(_))));

        let state = WorkflowState::new("  recipe sharing app ").unwrap();
        assert_eq!(state.idea, "recipe sharing app");
        assert!(state.features.is_empty());
        assert_eq!(state.status, RunStatus::Running);
    }

    #[test]
    fn test_stage_order_and_dependencies() {
        assert_eq!(Stage::Features.next(), Some(Stage::TechStack));
        assert_eq!(Stage::TechStack.next(), Some(Stage::Tasks));
        assert_eq!(Stage::Tasks.next(), None);
        assert_eq!(Stage::Tasks.dependencies(), &[Stage::Features, Stage::TechStack]);
        assert_eq!(Stage::TechStack.to_string(), "tech_stack");
    }

    #[test]
    fn test_patch_replaces_only_its_slot() {
        let mut state = WorkflowState::new("idea").unwrap();
        let proposal = approved(&["Rust"]);
        state.apply(StatePatch::Proposal { stage: Stage::TechStack, proposal });

        assert_eq!(state.tech_stack.items, vec!["Rust"]);
        assert!(state.features.is_empty());
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn test_failed_patch_sets_error_and_status() {
        let mut state = WorkflowState::new("idea").unwrap();
        state.apply(StatePatch::Failed { error: "boom".into() });

        assert_eq!(state.error.as_deref(), Some("boom"));
        assert_eq!(state.status, RunStatus::Failed);
        assert!(state.status.is_terminal());
    }

    #[test]
    fn test_missing_dependency() {
        let mut state = WorkflowState::new("idea").unwrap();
        assert_eq!(state.missing_dependency(Stage::Features), None);
        assert_eq!(state.missing_dependency(Stage::TechStack), Some(Stage::Features));

        state.features = Proposal { human_approved: false, ..approved(&["login"]) };
        assert_eq!(state.missing_dependency(Stage::TechStack), Some(Stage::Features));

        state.features = approved(&["login"]);
        assert_eq!(state.missing_dependency(Stage::TechStack), None);
        assert_eq!(state.missing_dependency(Stage::Tasks), Some(Stage::TechStack));
    }

    #[test]
    fn test_blank_change_request_is_not_pending() {
        let proposal = Proposal { change_request: Some("  ".into()), ..Default::default() };
        assert_eq!(proposal.pending_change_request(), None);

        let proposal = Proposal { change_request: Some("add search".into()), ..Default::default() };
        assert_eq!(proposal.pending_change_request(), Some("add search"));
    }
}
