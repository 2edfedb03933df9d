//! # MakeItReal
//!
//! Turn a free-text product idea into a reviewed feature list, tech stack and
//! task breakdown.
//!
//! Every stage is proposed by a model, checked by an automated reviewer and
//! then approved by a person. Runs are checkpointed per thread so the human
//! review can happen in a later process.
//!
//! ## Features
//!
//! - **Staged Workflow**: Features, tech stack and tasks, each with a review loop
//! - **Suspend/Resume**: Human review pauses the run; resume by thread id
//! - **Idea Analysis**: Curation, Working Backwards PRD and a GO / NO_GO evaluation
//! - **Providers**: OpenAI-compatible endpoints (local servers included) and Claude
//!
//! ## Quick Start
//!
//! ```bash
//! # Start a run and review interactively
//! makeitreal idea "recipe sharing app"
//!
//! # Resume a suspended run later
//! makeitreal resume <thread-id> --approve
//! ```

#![forbid(unsafe_code)]

pub mod agents;
pub mod ai;
pub mod analysis;
pub mod core;
pub mod workflow;

// Re-export commonly used types
pub use agents::{Agents, Generator, Reviewer};
pub use ai::{AIClient, AIError, LlmProvider};
pub use analysis::{AnalysisReport, IdeaAnalyzer};
pub use core::Config;
pub use workflow::{
    CheckpointStore, Engine, FileStore, HumanDecision, MemoryStore, RunOutcome, Stage,
    WorkflowError, WorkflowState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "makeitreal";
