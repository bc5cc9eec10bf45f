// ABOUTME: Error types for dependency graph resolution and planning
// ABOUTME: Configuration errors here block a task until its trigger config is corrected

use thiserror::Error;

use super::expression::ExpressionError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("task #{sequence} depends on itself")]
    SelfDependency { sequence: i64 },

    #[error("circular dependency detected involving tasks: {sequences:?}")]
    CircularDependency { sequences: Vec<i64> },

    #[error("task #{sequence} mixes sequence and global ids in taskIds {task_ids:?}")]
    MixedAddressing { sequence: i64, task_ids: Vec<i64> },

    #[error("invalid dependency expression on task #{sequence}: {source}")]
    Expression {
        sequence: i64,
        #[source]
        source: ExpressionError,
    },

    #[error("duplicate project sequence #{sequence} in project {project_id}")]
    DuplicateSequence { project_id: i64, sequence: i64 },
}

pub type Result<T> = std::result::Result<T, GraphError>;
