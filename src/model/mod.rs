// ABOUTME: Persisted data model for the workflow execution core
// ABOUTME: Defines tasks, trigger configurations, execution results, and workflow run state

pub mod result;
pub mod task;
pub mod workflow;

pub use result::{ExecutionResult, TaggedResult};
pub use task::{
    DependencyOperator, DependsOn, ExecutionConfig, ExecutionPolicy, Task, TaskStatus,
    TriggerConfig,
};
pub use workflow::{ProjectInfo, WorkflowCheckpoint, WorkflowExecution, WorkflowStatus};
