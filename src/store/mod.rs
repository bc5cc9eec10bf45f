// ABOUTME: Persistence boundary for tasks, workflow executions, and checkpoints
// ABOUTME: The core only assumes "read returns latest committed write"; no transactions

pub mod error;
pub mod memory;

use async_trait::async_trait;

use crate::model::{
    ExecutionResult, ProjectInfo, Task, TaskStatus, WorkflowCheckpoint, WorkflowExecution,
};

pub use error::{Result, StoreError};
pub use memory::{MemoryStore, TaskDraft};

/// Key-addressed task and run-state store, owned by the surrounding product.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, project_id: i64, sequence: i64) -> Result<Option<Task>>;

    /// Snapshot of every task in a project. One call yields one consistent
    /// view; readiness checks for a whole stage run against a single
    /// snapshot.
    async fn tasks_in_project(&self, project_id: i64) -> Result<Vec<Task>>;

    async fn update_task_status(
        &self,
        project_id: i64,
        sequence: i64,
        status: TaskStatus,
    ) -> Result<()>;

    /// Store a completed task's result; transitions status to `done` and
    /// records attempts beyond the first.
    async fn update_task_result(
        &self,
        project_id: i64,
        sequence: i64,
        result: ExecutionResult,
        retry_count: u32,
    ) -> Result<()>;

    /// Transition a task to `failed`, preserving the final error.
    async fn mark_task_failed(
        &self,
        project_id: i64,
        sequence: i64,
        retry_count: u32,
        error: &str,
    ) -> Result<()>;

    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<()>;

    async fn get_execution(&self, workflow_id: &str) -> Result<Option<WorkflowExecution>>;

    /// Persist a stage checkpoint. The call must not return before the
    /// checkpoint is durable; the orchestrator awaits it before dispatching
    /// the next stage.
    async fn save_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> Result<()>;

    async fn latest_checkpoint(&self, workflow_id: &str) -> Result<Option<WorkflowCheckpoint>>;
}

/// Read-only project metadata consumed by `{{project.*}}` macros.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn project(&self, project_id: i64) -> Result<Option<ProjectInfo>>;
}
