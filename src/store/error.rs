// ABOUTME: Error types for the persistence boundary
// ABOUTME: Backends map their own failures onto these variants

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("task #{sequence} not found in project {project_id}")]
    TaskNotFound { project_id: i64, sequence: i64 },

    #[error("workflow execution {workflow_id} not found")]
    ExecutionNotFound { workflow_id: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
