//! Per-stage state machine: generate, auto review, human review.
//!
//! ```text
//! GENERATE -> AUTO_REVIEW -> HUMAN_REVIEW -> DONE
//!    ^            |               |
//!    +------------+---------------+   (not approved)
//! ```
//!
//! The loop has no built-in bound; the engine's optional cycle limit is the
//! only guard.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::human::HumanDecision;
use super::state::{Proposal, Stage, StatePatch, WorkflowState};
use super::WorkflowError;
use crate::agents::{GenerationRequest, Generator, ReviewInput, Reviewer};

/// Position inside one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStep {
    Generate,
    AutoReview,
    HumanReview,
    Done,
}

impl StageStep {
    /// The step that follows this one given the stage's proposal.
    pub fn after(self, proposal: &Proposal) -> Self {
        match self {
            Self::Generate => Self::AutoReview,
            Self::AutoReview if proposal.auto_approved => Self::HumanReview,
            Self::AutoReview => Self::Generate,
            Self::HumanReview if proposal.is_approved() => Self::Done,
            Self::HumanReview => Self::Generate,
            Self::Done => Self::Done,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::AutoReview => "auto_review",
            Self::HumanReview => "human_review",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for StageStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position inside the whole workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub stage: Stage,
    pub step: StageStep,
}

impl Cursor {
    /// Where every run starts.
    pub fn start() -> Self {
        Self { stage: Stage::Features, step: StageStep::Generate }
    }

    /// Advance past the current step.
    ///
    /// Leaving a finished stage moves to the next stage's `Generate`; leaving
    /// the last stage stays on its `Done` step.
    pub fn advance(self, state: &WorkflowState) -> Self {
        let step = self.step.after(state.proposal(self.stage));
        match (step, self.stage.next()) {
            (StageStep::Done, Some(next)) => Self { stage: next, step: StageStep::Generate },
            _ => Self { stage: self.stage, step },
        }
    }

    /// Whether the last stage is done.
    pub fn is_finished(self) -> bool {
        self.stage.next().is_none() && self.step == StageStep::Done
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stage, self.step)
    }
}

/// Run the generator for `stage` and return the replacement proposal.
///
/// The pending change request is consumed here and cleared in the result;
/// both approval flags reset because the items are new.
pub async fn generate(
    state: &WorkflowState,
    stage: Stage,
    generator: &dyn Generator,
) -> Result<StatePatch, WorkflowError> {
    if let Some(dependency) = state.missing_dependency(stage) {
        return Err(WorkflowError::MissingDependency { stage, dependency });
    }

    let proposal = state.proposal(stage);
    let context = stage
        .dependencies()
        .iter()
        .map(|dep| (*dep, state.proposal(*dep).items.as_slice()))
        .collect();
    let request = GenerationRequest {
        stage,
        idea: &state.idea,
        items: &proposal.items,
        change_request: proposal.pending_change_request(),
        context,
    };

    let items = generator
        .generate(&request)
        .await
        .map_err(|source| WorkflowError::Generation { stage, source })?;

    if items.is_empty() {
        return Err(WorkflowError::Generation {
            stage,
            source: crate::ai::AIError::MalformedResponse("generator returned no items".into()),
        });
    }

    Ok(StatePatch::Proposal {
        stage,
        proposal: Proposal {
            items,
            change_request: None,
            auto_approved: false,
            human_approved: false,
        },
    })
}

/// Run the automated reviewer for `stage`.
pub async fn auto_review(
    state: &WorkflowState,
    stage: Stage,
    reviewer: &dyn Reviewer,
) -> Result<StatePatch, WorkflowError> {
    let proposal = state.proposal(stage);
    if proposal.items.is_empty() {
        return Err(WorkflowError::InvalidInput(format!("{stage} has no items to review")));
    }

    let input = ReviewInput { stage, idea: &state.idea, items: &proposal.items };
    let outcome = reviewer
        .review(&input)
        .await
        .map_err(|source| WorkflowError::Review { stage, source })?;

    let mut updated = proposal.clone();
    updated.auto_approved = outcome.approved;
    updated.change_request = if outcome.approved { None } else { outcome.change_request };

    Ok(StatePatch::Proposal { stage, proposal: updated })
}

/// Apply a human decision to `stage`.
///
/// A blank change request counts as approval. Returns `None` for
/// [`HumanDecision::Reject`], which ends the run instead.
pub fn human_review(
    state: &WorkflowState,
    stage: Stage,
    decision: &HumanDecision,
) -> Option<StatePatch> {
    let mut updated = state.proposal(stage).clone();
    match decision {
        HumanDecision::RequestChanges(request) if !request.trim().is_empty() => {
            updated.human_approved = false;
            updated.change_request = Some(request.trim().to_string());
        }
        HumanDecision::Approve | HumanDecision::RequestChanges(_) => {
            updated.human_approved = true;
            updated.change_request = None;
        }
        HumanDecision::Reject => return None,
    }
    Some(StatePatch::Proposal { stage, proposal: updated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ReviewOutcome;
    use crate::ai::AIError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Echo {
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<String>, AIError> {
            self.seen.lock().push(request.change_request.map(str::to_string));
            Ok(vec![format!("item for {}", request.stage)])
        }
    }

    struct Reject;

    #[async_trait]
    impl Reviewer for Reject {
        async fn review(&self, _input: &ReviewInput<'_>) -> Result<ReviewOutcome, AIError> {
            ReviewOutcome::changes("needs more detail")
        }
    }

    fn proposal(items: &[&str], auto: bool, human: bool) -> Proposal {
        Proposal {
            items: items.iter().map(|s| s.to_string()).collect(),
            change_request: None,
            auto_approved: auto,
            human_approved: human,
        }
    }

    #[test]
    fn test_transitions() {
        let rejected = proposal(&["a"], false, false);
        let auto_only = proposal(&["a"], true, false);
        let both = proposal(&["a"], true, true);
        let human_only = proposal(&["a"], false, true);

        assert_eq!(StageStep::Generate.after(&rejected), StageStep::AutoReview);
        assert_eq!(StageStep::AutoReview.after(&rejected), StageStep::Generate);
        assert_eq!(StageStep::AutoReview.after(&auto_only), StageStep::HumanReview);
        assert_eq!(StageStep::HumanReview.after(&auto_only), StageStep::Generate);
        assert_eq!(StageStep::HumanReview.after(&both), StageStep::Done);
        // Human approval alone never finishes a stage
        assert_eq!(StageStep::HumanReview.after(&human_only), StageStep::Generate);
    }

    #[test]
    fn test_cursor_moves_to_next_stage() {
        let mut state = WorkflowState::new("idea").unwrap();
        state.features = proposal(&["a"], true, true);

        let cursor = Cursor { stage: Stage::Features, step: StageStep::HumanReview };
        assert_eq!(
            cursor.advance(&state),
            Cursor { stage: Stage::TechStack, step: StageStep::Generate }
        );

        state.tasks = proposal(&["t"], true, true);
        let last = Cursor { stage: Stage::Tasks, step: StageStep::HumanReview }.advance(&state);
        assert!(last.is_finished());
    }

    #[tokio::test]
    async fn test_generate_consumes_change_request() {
        let mut state = WorkflowState::new("idea").unwrap();
        state.features = Proposal {
            change_request: Some("add search".into()),
            ..proposal(&["old"], false, false)
        };
        let echo = Echo { seen: Mutex::new(Vec::new()) };

        let patch = generate(&state, Stage::Features, &echo).await.unwrap();
        state.apply(patch);

        assert_eq!(echo.seen.lock().as_slice(), &[Some("add search".to_string())]);
        assert_eq!(state.features.items, vec!["item for features"]);
        assert_eq!(state.features.change_request, None);
        assert!(!state.features.auto_approved);
    }

    #[tokio::test]
    async fn test_generate_requires_approved_dependencies() {
        let state = WorkflowState::new("idea").unwrap();
        let echo = Echo { seen: Mutex::new(Vec::new()) };

        let err = generate(&state, Stage::Tasks, &echo).await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::MissingDependency { stage: Stage::Tasks, dependency: Stage::Features }
        ));
        assert!(echo.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_review_rejection_sets_change_request() {
        let mut state = WorkflowState::new("idea").unwrap();
        state.features = proposal(&["a"], false, false);

        state.apply(auto_review(&state, Stage::Features, &Reject).await.unwrap());

        assert!(!state.features.auto_approved);
        assert_eq!(state.features.pending_change_request(), Some("needs more detail"));
    }

    #[tokio::test]
    async fn test_review_of_empty_proposal_fails() {
        let state = WorkflowState::new("idea").unwrap();
        let err = auto_review(&state, Stage::Features, &Reject).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInput(_)));
    }

    #[test]
    fn test_human_decisions() {
        let mut state = WorkflowState::new("idea").unwrap();
        state.features = proposal(&["a"], true, false);

        let changes = HumanDecision::RequestChanges("more".into());
        let patch = human_review(&state, Stage::Features, &changes);
        state.apply(patch.unwrap());
        assert!(!state.features.human_approved);
        assert_eq!(state.features.pending_change_request(), Some("more"));

        state.apply(human_review(&state, Stage::Features, &HumanDecision::Approve).unwrap());
        assert!(state.features.is_approved());
        assert_eq!(state.features.change_request, None);

        assert!(human_review(&state, Stage::Features, &HumanDecision::Reject).is_none());
    }

    #[test]
    fn test_blank_change_request_approves() {
        let mut state = WorkflowState::new("idea").unwrap();
        state.features = proposal(&["a"], true, false);

        let blank = HumanDecision::RequestChanges("   ".into());
        state.apply(human_review(&state, Stage::Features, &blank).unwrap());

        assert!(state.features.is_approved());
        assert_eq!(state.features.change_request, None);
        assert_eq!(StageStep::HumanReview.after(&state.features), StageStep::Done);
    }
}
