// ABOUTME: Single-task execution with typed retry and failure classification
// ABOUTME: Delegates the actual AI/script run to an external capability

pub mod capability;
pub mod error;
pub mod retry;
pub mod runner;

pub use capability::{
    CapabilityError, ExecutionCapability, ExecutionOutput, FailureClass, UsageStats,
};
pub use error::{ExecutorError, Result};
pub use retry::RetryPolicy;
pub use runner::{TaskOutcome, TaskRunner};
