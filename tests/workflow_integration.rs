//! Workflow Integration Tests
//!
//! Runs the engine against a file checkpoint store with scripted agents,
//! including runs that span two engine instances.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use makeitreal::agents::{
    Agents, GenerationRequest, Generator, ReviewInput, ReviewOutcome, Reviewer,
};
use makeitreal::ai::AIError;
use makeitreal::workflow::{
    CheckpointStore, Engine, FileStore, HumanDecision, RunArtifact, RunOutcome, RunStatus,
    ScriptedDecisions, Stage,
};

/// Produces two items per stage, tagged with the stage and the pass number.
#[derive(Default)]
struct StageGenerator {
    passes: Mutex<Vec<Stage>>,
}

#[async_trait]
impl Generator for StageGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<String>, AIError> {
        let mut passes = self.passes.lock();
        passes.push(request.stage);
        let pass = passes.iter().filter(|s| **s == request.stage).count();
        Ok(vec![
            format!("{} item A (pass {pass})", request.stage),
            format!("{} item B (pass {pass})", request.stage),
        ])
    }
}

/// Approves everything, except that it replays `script` for one stage.
struct StageReviewer {
    stage: Option<Stage>,
    script: Mutex<VecDeque<Result<ReviewOutcome, AIError>>>,
}

impl StageReviewer {
    fn approving() -> Self {
        Self { stage: None, script: Mutex::new(VecDeque::new()) }
    }

    fn scripted(stage: Stage, script: Vec<Result<ReviewOutcome, AIError>>) -> Self {
        Self { stage: Some(stage), script: Mutex::new(script.into()) }
    }
}

#[async_trait]
impl Reviewer for StageReviewer {
    async fn review(&self, input: &ReviewInput<'_>) -> Result<ReviewOutcome, AIError> {
        if Some(input.stage) == self.stage {
            if let Some(next) = self.script.lock().pop_front() {
                return next;
            }
        }
        Ok(ReviewOutcome::approve())
    }
}

fn engine(dir: &TempDir, reviewer: StageReviewer) -> Engine {
    let agents = Agents::uniform(Arc::new(StageGenerator::default()), Arc::new(reviewer));
    Engine::new(agents, Arc::new(FileStore::new(dir.path().join("threads"))))
        .with_artifact_dir(dir.path().join("runs"))
}

#[tokio::test]
async fn test_resume_after_restart_restores_state() {
    let dir = TempDir::new().unwrap();

    let suspended = engine(&dir, StageReviewer::approving())
        .start("recipe sharing app", "restart")
        .await
        .unwrap();
    let RunOutcome::Suspended { awaiting, resume_token } = &suspended else {
        panic!("expected suspension, got {suspended:?}");
    };

    // A fresh engine stands in for a new process
    let restarted = engine(&dir, StageReviewer::approving());
    let checkpoint = restarted.store().load(resume_token).unwrap().unwrap();
    assert_eq!(&checkpoint.state, &awaiting.state);
    assert_eq!(restarted.pending(resume_token).unwrap().as_ref(), Some(awaiting));

    let outcome = restarted.resume(resume_token, HumanDecision::Approve).await.unwrap();
    let RunOutcome::Suspended { awaiting: next, .. } = outcome else {
        panic!("expected the tech stack review");
    };
    assert_eq!(next.stage, Stage::TechStack);
    let mut approved = awaiting.state.features.clone();
    approved.human_approved = true;
    assert_eq!(next.state.features, approved);
}

#[tokio::test]
async fn test_full_run_writes_artifact() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, StageReviewer::approving());

    let outcome = engine.start("recipe sharing app", "full").await.unwrap();
    let outcome = engine.settle(outcome, &mut ScriptedDecisions::approve_all(3)).await.unwrap();

    let RunOutcome::Completed { state, artifact } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(state.status, RunStatus::Completed);

    let path = artifact.expect("artifact path");
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("state_") && name.ends_with(".json"));

    let written: RunArtifact =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written.idea, "recipe sharing app");
    for proposal in [&written.features, &written.tech_stack, &written.tasks] {
        assert!(!proposal.items.is_empty());
        assert!(proposal.auto_approved && proposal.human_approved);
    }

    let stored = engine.store().load("full").unwrap().unwrap();
    assert_eq!(stored.state.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_reviewer_failure_in_tech_stack_halts() {
    let dir = TempDir::new().unwrap();
    let reviewer = StageReviewer::scripted(
        Stage::TechStack,
        vec![Err(AIError::MalformedResponse("not json".to_string()))],
    );
    let engine = engine(&dir, reviewer);

    let outcome = engine.start("recipe sharing app", "halt").await.unwrap();
    let outcome = engine.settle(outcome, &mut ScriptedDecisions::approve_all(3)).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Failed(_)));

    let persisted = engine.store().load("halt").unwrap().unwrap().state;
    assert_eq!(persisted.status, RunStatus::Failed);
    assert!(persisted.features.is_approved());
    assert!(persisted.tech_stack.is_empty());
    assert!(persisted.tasks.is_empty());
    assert!(persisted.error.as_deref().is_some_and(|e| e.contains("tech_stack")));
    assert!(!dir.path().join("runs").exists());
}

#[tokio::test]
async fn test_change_request_loops_back_to_generation() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, StageReviewer::approving());

    let first = engine.start("recipe sharing app", "loop").await.unwrap();
    let decision = HumanDecision::from_input("  add meal planning  ");
    assert_eq!(decision, HumanDecision::RequestChanges("add meal planning".to_string()));

    let second = engine.resume("loop", decision).await.unwrap();

    let (RunOutcome::Suspended { awaiting: a, .. }, RunOutcome::Suspended { awaiting: b, .. }) =
        (&first, &second)
    else {
        panic!("expected two suspensions");
    };
    assert_eq!(a.stage, Stage::Features);
    assert_eq!(b.stage, Stage::Features);
    assert!(b.items[0].contains("pass 2"));
    assert_eq!(b.state.features.change_request, None);
}

#[tokio::test]
async fn test_pending_request_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, StageReviewer::approving());
    engine.start("recipe sharing app", "idem").await.unwrap();

    let first = engine.pending("idem").unwrap();
    let second = engine.pending("idem").unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_threads_listed_newest_first() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, StageReviewer::approving());

    engine.start("first idea", "older").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    engine.start("second idea", "newer").await.unwrap();

    let ids: Vec<_> =
        engine.store().list().unwrap().into_iter().map(|c| c.thread_id).collect();
    assert_eq!(ids, vec!["newer", "older"]);
}
