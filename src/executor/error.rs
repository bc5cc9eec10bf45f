// ABOUTME: Error types for single-task execution
// ABOUTME: Capability failures are outcomes, not errors; these are infrastructure faults

use thiserror::Error;

use crate::graph::GraphError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("task #{sequence} not found in project {project_id}")]
    TaskNotFound { project_id: i64, sequence: i64 },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
