//! MakeItReal - turn a product idea into reviewed features, a tech stack and tasks.
//!
//! Each stage is proposed by a model, checked by an automated reviewer and
//! approved by you. Runs are checkpointed so review can continue later.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use makeitreal::ai::AIClient;
use makeitreal::analysis::{AnalysisReport, IdeaAnalyzer};
use makeitreal::core::Config;
use makeitreal::workflow::{
    self, CheckpointStore, DecisionProvider, Engine, FileStore, HumanDecision, ReviewRequest,
    RunOutcome, Stage, WorkflowState,
};
use makeitreal::Agents;

/// Turn a product idea into reviewed features, a tech stack and tasks
#[derive(Parser)]
#[command(name = "makeitreal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the review workflow for an idea
    Idea {
        /// The product idea
        text: String,

        /// Thread id to run under (generated when absent)
        #[arg(short, long)]
        thread_id: Option<String>,

        /// Use the local OpenAI-compatible server
        #[arg(long)]
        local: bool,
    },

    /// Resume a suspended run
    Resume {
        /// Thread id printed when the run was started
        thread_id: String,

        /// Approve the pending proposal
        #[arg(long, conflicts_with_all = ["changes", "reject"])]
        approve: bool,

        /// Request changes to the pending proposal
        #[arg(long, conflicts_with = "reject")]
        changes: Option<String>,

        /// Reject the run
        #[arg(long)]
        reject: bool,

        /// Use the local OpenAI-compatible server
        #[arg(long)]
        local: bool,
    },

    /// Show the checkpoint of a thread
    Status {
        /// Thread id
        thread_id: String,
    },

    /// List stored threads
    Threads,

    /// Curate, specify and evaluate an idea
    Analyze {
        /// The product idea
        idea: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Use the local OpenAI-compatible server
        #[arg(long)]
        local: bool,
    },

    /// Print the workflow graphs as mermaid
    Graph,

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Idea { text, thread_id, local } => cmd_idea(&text, thread_id, local),
        Commands::Resume { thread_id, approve, changes, reject, local } => {
            let decision = match (approve, changes, reject) {
                (true, _, _) => Some(HumanDecision::Approve),
                (_, Some(changes), _) => Some(HumanDecision::from_input(&changes)),
                (_, _, true) => Some(HumanDecision::Reject),
                _ => None,
            };
            cmd_resume(&thread_id, decision, local)
        }
        Commands::Status { thread_id } => cmd_status(&thread_id).map(|()| ExitCode::SUCCESS),
        Commands::Threads => cmd_threads().map(|()| ExitCode::SUCCESS),
        Commands::Analyze { idea, json, local } => {
            cmd_analyze(&idea, json, local).map(|()| ExitCode::SUCCESS)
        }
        Commands::Graph => {
            println!("{}", workflow::graph::render_markdown());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { path } => cmd_config(path).map(|()| ExitCode::SUCCESS),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Build an engine backed by the file checkpoint store.
fn build_engine(config: &Config, local: bool) -> Result<Engine> {
    let client = AIClient::from_config(config, local)?;
    tracing::debug!(provider = client.provider_name(), model = client.model(), "Using model");

    Ok(Engine::new(Agents::llm(&client), Arc::new(FileStore::new(config.checkpoint_dir())))
        .with_artifact_dir(config.artifact_dir())
        .with_max_cycles(config.workflow.max_cycles))
}

/// Start a run and review it interactively.
fn cmd_idea(text: &str, thread_id: Option<String>, local: bool) -> Result<ExitCode> {
    let idea = WorkflowState::new(text)?.idea;
    let thread_id = thread_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    workflow::validate_thread_id(&thread_id)?;

    let config = Config::load()?;
    let engine = build_engine(&config, local)?;

    println!("Thread: {thread_id}");

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let outcome = engine.start(&idea, &thread_id).await?;
        engine.settle(outcome, &mut StdinDecisions::new()).await
    })?;

    Ok(report(&outcome))
}

/// Resume a suspended run, with a given decision or interactively.
fn cmd_resume(thread_id: &str, decision: Option<HumanDecision>, local: bool) -> Result<ExitCode> {
    let config = Config::load()?;
    let engine = build_engine(&config, local)?;

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(resume_run(&engine, thread_id, decision))?;

    Ok(report(&outcome))
}

async fn resume_run(
    engine: &Engine,
    thread_id: &str,
    decision: Option<HumanDecision>,
) -> Result<RunOutcome> {
    if let Some(decision) = decision {
        return Ok(engine.resume(thread_id, decision).await?);
    }

    let awaiting = engine
        .pending(thread_id)?
        .ok_or_else(|| workflow::WorkflowError::NotSuspended(thread_id.to_string()))?;
    let outcome = RunOutcome::Suspended { awaiting, resume_token: thread_id.to_string() };
    engine.settle(outcome, &mut StdinDecisions::new()).await
}

/// Print where a run ended up.
fn report(outcome: &RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Completed { state, artifact } => {
            println!();
            print_state(state);
            if let Some(path) = artifact {
                println!("Saved run to {}", path.display());
            }
            ExitCode::SUCCESS
        }
        RunOutcome::Suspended { awaiting, resume_token } => {
            println!();
            println!("Run paused at {} review.", awaiting.stage);
            println!("Resume with: makeitreal resume {resume_token}");
            ExitCode::SUCCESS
        }
        RunOutcome::Failed(state) => {
            eprintln!("Error: {}", state.error.as_deref().unwrap_or("run failed"));
            ExitCode::FAILURE
        }
    }
}

fn print_state(state: &WorkflowState) {
    println!("Idea: {}", state.idea);
    for stage in Stage::ALL {
        let proposal = state.proposal(stage);
        if proposal.is_empty() {
            continue;
        }
        println!();
        println!("{}:", stage.kind());
        print_numbered(&proposal.items);
    }
}

fn print_numbered(items: &[String]) {
    for (i, item) in items.iter().enumerate() {
        println!("  {}. {}", i + 1, item);
    }
}

/// Show one checkpoint.
fn cmd_status(thread_id: &str) -> Result<()> {
    let config = Config::load()?;
    let store = FileStore::new(config.checkpoint_dir());

    let checkpoint = store
        .load(thread_id)?
        .ok_or_else(|| workflow::WorkflowError::UnknownThread(thread_id.to_string()))?;

    println!("Thread:  {}", checkpoint.thread_id);
    println!("Status:  {}", checkpoint.state.status);
    println!("Next:    {}", checkpoint.cursor);
    println!("Updated: {}", checkpoint.updated_at.to_rfc3339());
    if let Some(error) = &checkpoint.state.error {
        println!("Error:   {error}");
    }
    println!();
    print_state(&checkpoint.state);

    Ok(())
}

/// List stored threads, newest first.
fn cmd_threads() -> Result<()> {
    let config = Config::load()?;
    let store = FileStore::new(config.checkpoint_dir());
    let checkpoints = store.list()?;

    if checkpoints.is_empty() {
        println!("No threads in {}", store.dir().display());
        return Ok(());
    }

    for checkpoint in checkpoints {
        println!(
            "{}  {:<9}  {:<24}  {}",
            checkpoint.thread_id,
            checkpoint.state.status.to_string(),
            checkpoint.cursor.to_string(),
            truncate(&checkpoint.state.idea, 40)
        );
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

/// Run the analysis pipeline.
fn cmd_analyze(idea: &str, json: bool, local: bool) -> Result<()> {
    let config = Config::load()?;
    let analyzer = IdeaAnalyzer::new(AIClient::from_config(&config, local)?);

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(analyzer.analyze(idea))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_analysis(&report);
    }

    Ok(())
}

fn print_analysis(report: &AnalysisReport) {
    let idea = &report.curation.product_idea;
    let market = &report.curation.market_analysis;
    let spec = &report.technical_spec;
    let eval = &report.evaluation;

    println!("{}", spec.press_release.headline);
    println!("{}", spec.press_release.subtitle);
    println!();
    println!("Problem: {}", idea.problem_statement);
    println!("Value:   {}", idea.value_proposition);
    println!("Users:   {}", idea.target_users.join(", "));
    println!("Market:  {}", market.market_size);

    println!();
    println!("Recommended features:");
    print_numbered(&report.curation.recommended_features);

    println!();
    println!("User stories:");
    for story in &spec.user_stories {
        println!("  - [{}] {} ({})", story.priority, story.title, story.estimate);
    }

    println!();
    println!("Timeline: {}", spec.timeline);
    println!();
    println!(
        "Feasibility {:.2}  Resources {:.2}  Timeline {:.2}  Overall {:.2}",
        eval.feasibility_score,
        eval.resource_score,
        eval.timeline_score,
        eval.overall_score()
    );
    println!("Risks: {}", eval.risk_assessment);
    for rec in &eval.recommendations {
        println!("  - {rec}");
    }
    println!();
    println!("Decision: {}", eval.go_no_go);
}

/// Show configuration.
fn cmd_config(show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load()?;
    let toml = toml::to_string_pretty(&config).context("Failed to render config")?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "makeitreal", &mut io::stdout());
}

/// Reads review decisions from stdin.
struct StdinDecisions {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinDecisions {
    fn new() -> Self {
        Self { lines: BufReader::new(tokio::io::stdin()).lines() }
    }

    /// Print `question` and read one line; `None` on EOF.
    async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        print!("{question} ");
        io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }
}

#[async_trait]
impl DecisionProvider for StdinDecisions {
    async fn decide(&mut self, request: &ReviewRequest) -> Result<Option<HumanDecision>> {
        println!();
        println!("{}:", request.message);
        print_numbered(&request.items);
        println!("(answer r to reject the run)");

        loop {
            let question = format!("Do you approve {}? [Y|n]", request.stage);
            let Some(answer) = self.ask(&question).await? else {
                return Ok(None);
            };

            match answer.trim().to_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(Some(HumanDecision::Approve)),
                "r" | "reject" => return Ok(Some(HumanDecision::Reject)),
                "n" | "no" => {
                    let Some(changes) = self.ask("What do you want to change?").await? else {
                        return Ok(None);
                    };
                    if changes.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(HumanDecision::from_input(&changes)));
                }
                _ => {}
            }
        }
    }
}
