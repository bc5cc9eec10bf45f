// ABOUTME: Error types for workflow orchestration
// ABOUTME: A stuck graph is a first-class failure, never silently treated as completion

use thiserror::Error;

use crate::executor::ExecutorError;
use crate::graph::GraphError;
use crate::model::WorkflowStatus;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("workflow execution {workflow_id} not found")]
    ExecutionNotFound { workflow_id: String },

    #[error("workflow execution {workflow_id} is already {status}")]
    AlreadyTerminal {
        workflow_id: String,
        status: WorkflowStatus,
    },

    #[error("workflow stuck at stage {stage}: no runnable tasks, blocking set {blocked:?}")]
    StuckGraph { stage: usize, blocked: Vec<i64> },
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
