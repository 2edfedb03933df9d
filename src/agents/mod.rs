//! Proposal generators and automated reviewers.
//!
//! The workflow engine only sees the [`Generator`] and [`Reviewer`] traits.
//! [`LlmGenerator`] and [`LlmReviewer`] implement them on top of
//! [`AIClient`](crate::ai::AIClient); tests plug in scripted fakes.

mod generator;
mod prompts;
mod reviewer;

pub use generator::LlmGenerator;
pub use reviewer::LlmReviewer;

use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::{AIClient, AIError};
use crate::workflow::Stage;

/// Everything a generator sees for one pass.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    /// Stage being generated
    pub stage: Stage,

    /// The original idea
    pub idea: &'a str,

    /// Items from the previous pass (empty on the first one)
    pub items: &'a [String],

    /// Revision the new items must satisfy
    pub change_request: Option<&'a str>,

    /// Approved items of upstream stages
    pub context: Vec<(Stage, &'a [String])>,
}

/// Everything a reviewer sees.
#[derive(Debug, Clone)]
pub struct ReviewInput<'a> {
    pub stage: Stage,
    pub idea: &'a str,
    pub items: &'a [String],
}

/// Verdict of an automated review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub approved: bool,

    /// Required edits; always set when not approved
    pub change_request: Option<String>,
}

impl ReviewOutcome {
    pub fn approve() -> Self {
        Self { approved: true, change_request: None }
    }

    /// Reject with a change request.
    ///
    /// Fails when the request is blank, since a rejection the generator
    /// cannot act on would loop without progress.
    pub fn changes(request: impl Into<String>) -> Result<Self, AIError> {
        let request = request.into();
        if request.trim().is_empty() {
            return Err(AIError::MalformedResponse(
                "review rejected the items without a change request".to_string(),
            ));
        }
        Ok(Self { approved: false, change_request: Some(request.trim().to_string()) })
    }
}

/// Produces a complete replacement item list for a stage.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate items; must return at least one item on success.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<String>, AIError>;
}

/// Approves items or asks for changes.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Review items; fails with `InvalidInput` when `items` is empty.
    async fn review(&self, input: &ReviewInput<'_>) -> Result<ReviewOutcome, AIError>;
}

/// The generator/reviewer pair of one stage.
#[derive(Clone)]
pub struct StageAgents {
    pub generator: Arc<dyn Generator>,
    pub reviewer: Arc<dyn Reviewer>,
}

impl StageAgents {
    pub fn new(generator: Arc<dyn Generator>, reviewer: Arc<dyn Reviewer>) -> Self {
        Self { generator, reviewer }
    }
}

/// Agents for every stage.
#[derive(Clone)]
pub struct Agents {
    pub features: StageAgents,
    pub tech_stack: StageAgents,
    pub tasks: StageAgents,
}

impl Agents {
    /// Use the same pair for all stages.
    pub fn uniform(generator: Arc<dyn Generator>, reviewer: Arc<dyn Reviewer>) -> Self {
        let agents = StageAgents::new(generator, reviewer);
        Self { features: agents.clone(), tech_stack: agents.clone(), tasks: agents }
    }

    /// Model-backed agents sharing one client.
    pub fn llm(client: &AIClient) -> Self {
        let build = |stage| {
            StageAgents::new(
                Arc::new(LlmGenerator::new(client.clone(), stage)),
                Arc::new(LlmReviewer::new(client.clone(), stage)),
            )
        };
        Self {
            features: build(Stage::Features),
            tech_stack: build(Stage::TechStack),
            tasks: build(Stage::Tasks),
        }
    }

    pub fn for_stage(&self, stage: Stage) -> &StageAgents {
        match stage {
            Stage::Features => &self.features,
            Stage::TechStack => &self.tech_stack,
            Stage::Tasks => &self.tasks,
        }
    }
}
