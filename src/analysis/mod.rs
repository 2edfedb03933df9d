//! Idea analysis pipeline: curation, specification, evaluation.
//!
//! Each step is a single structured model call. A reply that cannot be
//! parsed or validated fails the pipeline; no default result is substituted.

mod models;

pub use models::{
    Competitor, CurationResult, EvaluationResult, Faq, MarketAnalysis, PressRelease, ProductIdea,
    TechnicalSpec, UserStory, Verdict,
};

use serde::{Deserialize, Serialize};

use crate::ai::{AIClient, AIError};

/// Analysis error types.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: AIError,
    },
}

/// Combined output of all three steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub curation: CurationResult,
    pub technical_spec: TechnicalSpec,
    pub evaluation: EvaluationResult,
}

const CURATOR_SYSTEM: &str = "You are an expert product strategist and market analyst.

Analyze the given product idea and provide comprehensive structured feedback:

1. Problem Analysis: Identify the core problem being solved
2. Target Users: Define specific user segments who would benefit
3. Value Proposition: Articulate the unique value delivered
4. Market Research: Assess market size, competitors, opportunities and risks
5. Feature Prioritization: Recommend key features for initial implementation
6. Next Steps: Provide actionable validation steps

Be specific, actionable, and realistic in your analysis.

Reply with a single JSON object with the keys product_idea {raw_idea, problem_statement,
target_users, value_proposition}, market_analysis {market_size, competitors [{name,
description}], opportunities, risks}, recommended_features and next_steps.";

const SPEC_WRITER_SYSTEM: &str = "You are a senior technical product manager and \
specification expert.

Transform the curated product idea into a technical specification following Amazon's
Working Backwards methodology:

1. Press Release: written as if the product already launched successfully
2. FAQ: internal (technical, business) and customer questions with answers
3. User Stories: INVEST-compliant, \"As a [user type], I want [capability] so that
   [benefit]\", with acceptance criteria and definition of done
4. Technical Requirements: core technical features and capabilities
5. Success Metrics: measurable KPIs
6. Timeline: realistic development phases

Reply with a single JSON object with the keys press_release {headline, subtitle, intro,
problem, solution, leader_quote, how_it_works, customer_quote, call_to_action},
faq {internal, customer}, user_stories [{title, description, acceptance_criteria,
definition_of_done, priority, estimate}], technical_requirements, success_metrics and
timeline.";

const EVALUATOR_SYSTEM: &str = "You are a senior technical evaluator with expertise in \
software development and product management.

Evaluate the technical specification for:
1. Technical feasibility (score 0.0-1.0)
2. Resource requirements (score 0.0-1.0)
3. Timeline realism (score 0.0-1.0)
4. Risks and their mitigation
5. Actionable recommendations
6. A final GO or NO_GO decision

Reply with only this JSON object:
{\"feasibility_score\": 0.85, \"resource_score\": 0.75, \"timeline_score\": 0.9,
 \"risk_assessment\": \"...\", \"recommendations\": [\"...\"], \"go_no_go\": \"GO\"}";

/// Runs the analysis steps against a model client.
pub struct IdeaAnalyzer {
    client: AIClient,
}

impl IdeaAnalyzer {
    pub fn new(client: AIClient) -> Self {
        Self { client }
    }

    /// Run curation, specification and evaluation in order.
    pub async fn analyze(&self, idea: &str) -> Result<AnalysisReport, AnalysisError> {
        let curation = self.curate(idea).await?;
        let technical_spec = self.write_spec(&curation).await?;
        let evaluation = self.evaluate(&technical_spec).await?;

        tracing::info!(
            verdict = %evaluation.go_no_go,
            score = evaluation.overall_score(),
            "Analysis complete"
        );
        Ok(AnalysisReport { curation, technical_spec, evaluation })
    }

    /// Structure the idea and assess its market.
    pub async fn curate(&self, idea: &str) -> Result<CurationResult, AnalysisError> {
        let idea = idea.trim();
        if idea.is_empty() {
            return Err(AnalysisError::InvalidInput("idea must not be empty".to_string()));
        }

        tracing::debug!(chars = idea.len(), "Curating idea");
        self.client
            .structured(CURATOR_SYSTEM, &format!("Product Idea: {idea}"))
            .await
            .map_err(|source| AnalysisError::Step { step: "curation", source })
    }

    /// Write a PRD from a curated idea.
    pub async fn write_spec(
        &self,
        curation: &CurationResult,
    ) -> Result<TechnicalSpec, AnalysisError> {
        let user = format!(
            "Generate the technical specification for this curated product idea:\n{}",
            to_json(curation)?
        );
        self.client
            .structured(SPEC_WRITER_SYSTEM, &user)
            .await
            .map_err(|source| AnalysisError::Step { step: "specification", source })
    }

    /// Score a specification and decide GO / NO_GO.
    pub async fn evaluate(&self, spec: &TechnicalSpec) -> Result<EvaluationResult, AnalysisError> {
        let user = format!("TECHNICAL SPECIFICATION:\n{}", to_json(spec)?);
        self.client
            .structured::<EvaluationResult>(EVALUATOR_SYSTEM, &user)
            .await
            .and_then(EvaluationResult::validate)
            .map_err(|source| AnalysisError::Step { step: "evaluation", source })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, AnalysisError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AnalysisError::InvalidInput(format!("cannot serialize input: {e}")))
}
