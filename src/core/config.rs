//! Configuration management for MakeItReal.
//!
//! Handles loading configuration from TOML files and applying
//! environment overrides (including a `.env` file).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::RetryConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language model settings
    pub llm: LlmConfig,

    /// Retry policy for model calls
    pub retry: RetrySettings,

    /// Workflow settings
    pub workflow: WorkflowConfig,
}

/// Language model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (openai, claude)
    pub provider: String,

    /// Model to use
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Base URL used with `--local`
    pub local_base_url: String,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Timeout for a single HTTP request
    pub request_timeout_secs: u64,
}

/// Retry settings as stored in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per model call
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,

    /// Upper bound for a single delay
    pub max_delay_ms: u64,

    /// Add jitter to delays
    pub jitter: bool,
}

/// Workflow settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Directory holding one checkpoint file per thread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,

    /// Directory receiving completed run artifacts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,

    /// Maximum GENERATE re-entries per stage (unbounded when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<u32>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.makeitreal.toml` in current directory
    /// 2. `~/.config/makeitreal/config.toml`
    /// 3. Falls back to defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load() -> anyhow::Result<Self> {
        // Missing .env is the common case
        let _ = dotenvy::dotenv();

        let mut config = Self::load_file()?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".makeitreal.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Apply `OPENAI_MODEL`, `OPENAI_BASE_URL` and `MAKEITREAL_PROVIDER`.
    pub fn apply_env_overrides(&mut self) {
        if let Some(model) = non_empty_env("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = non_empty_env("OPENAI_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(provider) = non_empty_env("MAKEITREAL_PROVIDER") {
            self.llm.provider = provider.to_lowercase();
        }
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(config_path)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("makeitreal"))
    }

    /// Get the data directory path (for checkpoints).
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("makeitreal"))
    }

    /// Directory where thread checkpoints are stored.
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.workflow
            .checkpoint_dir
            .clone()
            .or_else(|| Self::data_dir().map(|d| d.join("threads")))
            .unwrap_or_else(|| PathBuf::from(".makeitreal/threads"))
    }

    /// Directory where completed run artifacts are written.
    pub fn artifact_dir(&self) -> PathBuf {
        self.workflow.artifact_dir.clone().unwrap_or_else(|| PathBuf::from(".state"))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            local_base_url: "http://localhost:8080/v1".to_string(),
            max_tokens: 2048,
            temperature: 0.2,
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Timeout for a single HTTP request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: false,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: settings.backoff_multiplier,
            jitter: settings.jitter,
        }
    }
}
