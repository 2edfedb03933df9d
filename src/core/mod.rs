//! Core types shared by every part of MakeItReal.
//!
//! This module holds configuration loading and the retry policy used for
//! all calls to the model service.

mod config;
mod retry;

pub use config::{Config, LlmConfig, RetrySettings, WorkflowConfig};
pub use retry::{retry_async, RetryConfig, RetryResult};
