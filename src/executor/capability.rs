// ABOUTME: The opaque external execution capability (AI call or script run)
// ABOUTME: Errors carry a provider signal that classifies into rate-limit, transient, or fatal

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ExecutionConfig, ExecutionResult};

/// What one successful external execution returns.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    pub result: ExecutionResult,
    pub usage: Option<UsageStats>,
}

impl ExecutionOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            result: ExecutionResult::text(content),
            usage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("execution timed out: {0}")]
    Timeout(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid execution configuration: {0}")]
    InvalidConfig(String),

    /// Anything the provider reports without a structured marker.
    #[error("provider error: {0}")]
    Provider(String),
}

/// How the executor treats a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Fail immediately, zero retries: retrying a rate-limited call is
    /// presumed counter-productive.
    RateLimit,
    /// Retry with exponential backoff.
    Transient,
    /// Fail immediately: the configuration must change first.
    Fatal,
}

impl CapabilityError {
    pub fn class(&self) -> FailureClass {
        match self {
            CapabilityError::RateLimited(_) => FailureClass::RateLimit,
            CapabilityError::Timeout(_) | CapabilityError::Transport(_) => FailureClass::Transient,
            CapabilityError::InvalidConfig(_) => FailureClass::Fatal,
            CapabilityError::Provider(message) => {
                if looks_rate_limited(message) {
                    FailureClass::RateLimit
                } else {
                    FailureClass::Transient
                }
            }
        }
    }
}

fn looks_rate_limited(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("rate limit")
        || m.contains("ratelimit")
        || m.contains("too many requests")
        || m.contains("429")
}

/// External capability that actually runs a task's materialized instruction.
/// One implementation per task kind; the core only sees this boundary.
#[async_trait]
pub trait ExecutionCapability: Send + Sync {
    async fn execute(
        &self,
        instruction: &str,
        config: &ExecutionConfig,
    ) -> std::result::Result<ExecutionOutput, CapabilityError>;
}
