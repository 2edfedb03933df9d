//! aiask - ask the model a single question.
//!
//! Log lines (question size, tokens, latency) go to `logs/aiask.log`; stdout
//! carries only the answer.

use std::fs::{self, OpenOptions};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use makeitreal::ai::{AIClient, AIError, QuestionInput};
use makeitreal::core::{Config, RetryConfig};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "aiask.log";

/// Ask the model a single question
#[derive(Parser)]
#[command(name = "aiask")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The question (1-1000 characters)
    question: String,

    /// Use the local OpenAI-compatible server
    #[arg(long)]
    local: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let question = match QuestionInput::new(&cli.question) {
        Ok(question) => question,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Warning: file logging disabled: {e:#}");
    }

    match ask(&question, cli.local) {
        Ok(answer) => {
            println!("{answer}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Log to `logs/aiask.log`, appending.
fn init_logging(verbose: bool) -> Result<()> {
    fs::create_dir_all(LOG_DIR)?;
    let path = std::path::Path::new(LOG_DIR).join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(false).with_writer(Mutex::new(file)))
        .with(filter)
        .try_init()?;
    Ok(())
}

fn ask(question: &QuestionInput, local: bool) -> Result<String> {
    let config = Config::load()?;
    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_secs(1),
        backoff_multiplier: 2.0,
        ..RetryConfig::from(&config.retry)
    };
    let client = AIClient::from_config(&config, local)?.with_retry(retry);

    tracing::info!(chars = question.message().chars().count(), "Question received");

    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(client.ask(question)) {
        Ok(response) => {
            tracing::info!(
                tokens = response.tokens_used,
                latency_ms = response.latency_ms,
                "Answer received"
            );
            Ok(response.content)
        }
        Err(e) => {
            let busy = matches!(e, AIError::ServiceBusy { .. });
            tracing::error!(error = %e, busy, "Request failed");
            Err(e.into())
        }
    }
}
