//! Typed results of the analysis pipeline.

use serde::{Deserialize, Serialize};

use crate::ai::AIError;

/// Structured representation of a product idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductIdea {
    /// Original user input
    pub raw_idea: String,
    pub problem_statement: String,
    /// Primary user segments
    pub target_users: Vec<String>,
    pub value_proposition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    pub description: String,
}

/// Market research and competitive analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub market_size: String,
    pub competitors: Vec<Competitor>,
    pub opportunities: Vec<String>,
    pub risks: Vec<String>,
}

/// Output of idea curation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationResult {
    pub product_idea: ProductIdea,
    pub market_analysis: MarketAnalysis,
    /// Priority features for the first release
    pub recommended_features: Vec<String>,
    pub next_steps: Vec<String>,
}

/// INVEST user story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStory {
    /// "As a ..., I want ... so that ..."
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub definition_of_done: Vec<String>,
    /// high, medium or low
    pub priority: String,
    #[serde(default = "default_estimate")]
    pub estimate: String,
}

fn default_estimate() -> String {
    "TBD".to_string()
}

/// Working Backwards press release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressRelease {
    pub headline: String,
    pub subtitle: String,
    pub intro: String,
    pub problem: String,
    pub solution: String,
    pub leader_quote: String,
    pub how_it_works: String,
    pub customer_quote: String,
    pub call_to_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub internal: Vec<String>,
    pub customer: Vec<String>,
}

/// Product requirements document written from a curated idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSpec {
    pub press_release: PressRelease,
    pub faq: Faq,
    pub user_stories: Vec<UserStory>,
    pub technical_requirements: Vec<String>,
    pub success_metrics: Vec<String>,
    pub timeline: String,
}

/// Final recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "NO_GO")]
    NoGo,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Go => "GO",
            Self::NoGo => "NO_GO",
        })
    }
}

/// Feasibility evaluation of a specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Technical feasibility, 0.0 to 1.0
    pub feasibility_score: f64,
    /// Resource availability, 0.0 to 1.0
    pub resource_score: f64,
    /// Timeline realism, 0.0 to 1.0
    pub timeline_score: f64,
    pub risk_assessment: String,
    pub recommendations: Vec<String>,
    pub go_no_go: Verdict,
}

impl EvaluationResult {
    /// Reject scores outside `0.0..=1.0`.
    pub fn validate(self) -> Result<Self, AIError> {
        for (name, score) in [
            ("feasibility_score", self.feasibility_score),
            ("resource_score", self.resource_score),
            ("timeline_score", self.timeline_score),
        ] {
            if !(0.0..=1.0).contains(&score) {
                return Err(AIError::MalformedResponse(format!(
                    "{name} must be between 0.0 and 1.0, got {score}"
                )));
            }
        }
        Ok(self)
    }

    /// Mean of the three scores.
    pub fn overall_score(&self) -> f64 {
        (self.feasibility_score + self.resource_score + self.timeline_score) / 3.0
    }
}
