//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end. Nothing here reaches a model.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

use makeitreal::workflow::{Checkpoint, CheckpointStore, FileStore, WorkflowState};

/// Get the binary to test.
fn makeitreal() -> Command {
    let mut cmd = Command::cargo_bin("makeitreal").unwrap();
    cmd.env_remove("OPENAI_API_KEY").env_remove("ANTHROPIC_API_KEY").env_remove("RUST_LOG");
    cmd
}

fn aiask() -> Command {
    let mut cmd = Command::cargo_bin("aiask").unwrap();
    cmd.env_remove("OPENAI_API_KEY");
    cmd
}

/// A working directory whose config keeps checkpoints under `threads/`.
fn workspace() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(".makeitreal.toml")
        .write_str("[workflow]\ncheckpoint_dir = \"threads\"\nartifact_dir = \"runs\"\n")
        .unwrap();
    temp
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    makeitreal()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reviewed features"))
        .stdout(predicate::str::contains("resume"));
}

#[test]
fn test_version_flag() {
    makeitreal()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_resume_flags_conflict() {
    makeitreal()
        .args(["resume", "abc", "--approve", "--changes", "more"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

// ============================================================================
// Workflow Command Tests
// ============================================================================

#[test]
fn test_graph_prints_mermaid() {
    makeitreal()
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("```mermaid"))
        .stdout(predicate::str::contains("requirement_analysis --> techstack_discovery"))
        .stdout(predicate::str::contains("auto_review -. rejected .-> generate"));
}

#[test]
fn test_blank_idea_rejected() {
    let temp = workspace();

    makeitreal()
        .args(["idea", "   "])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Invalid input: idea must not be empty"));

    temp.child("threads").assert(predicate::path::missing());
}

#[test]
fn test_invalid_thread_id_rejected() {
    let temp = workspace();

    makeitreal()
        .args(["idea", "recipe sharing app", "--thread-id", "../escape"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid thread id"));
}

#[test]
fn test_idea_without_api_key_fails() {
    let temp = workspace();

    makeitreal()
        .args(["idea", "recipe sharing app"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY not set"));
}

#[test]
fn test_status_unknown_thread() {
    let temp = workspace();

    makeitreal()
        .args(["status", "no-such-thread"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown thread: no-such-thread"));
}

#[test]
fn test_threads_empty() {
    let temp = workspace();

    makeitreal()
        .arg("threads")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No threads"));
}

#[test]
fn test_status_and_threads_show_checkpoint() {
    let temp = workspace();
    let store = FileStore::new(temp.child("threads").path());
    let state = WorkflowState::new("recipe sharing app").unwrap();
    store.save(&Checkpoint::new("thread-1", state)).unwrap();

    makeitreal()
        .args(["status", "thread-1"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Status:  running"))
        .stdout(predicate::str::contains("features/generate"))
        .stdout(predicate::str::contains("Idea: recipe sharing app"));

    makeitreal()
        .arg("threads")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("thread-1"));
}

// ============================================================================
// Config & Completions Tests
// ============================================================================

#[test]
fn test_config_shows_local_file() {
    let temp = workspace();

    makeitreal()
        .arg("config")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("checkpoint_dir = \"threads\""))
        .stdout(predicate::str::contains("[llm]"));
}

#[test]
fn test_completions_bash() {
    makeitreal()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("makeitreal"));
}

// ============================================================================
// aiask Tests
// ============================================================================

#[test]
fn test_aiask_empty_question() {
    let temp = assert_fs::TempDir::new().unwrap();

    aiask()
        .arg("   ")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: message must be 1-1000 characters"));
}

#[test]
fn test_aiask_question_too_long() {
    let temp = assert_fs::TempDir::new().unwrap();

    aiask()
        .arg("x".repeat(1001))
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-1000 characters"));
}

#[test]
fn test_aiask_logs_failure_to_file() {
    let temp = assert_fs::TempDir::new().unwrap();

    aiask()
        .arg("What is Rust?")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY not set"));

    temp.child("logs/aiask.log").assert(predicate::path::exists());
}
