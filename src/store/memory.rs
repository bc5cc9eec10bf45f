// ABOUTME: In-memory store used by tests and non-durable embedders
// ABOUTME: A single write lock makes status transitions atomic against snapshot readers

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::error::{Result, StoreError};
use super::{MetadataStore, TaskStore};
use crate::model::{
    ExecutionConfig, ExecutionResult, ProjectInfo, Task, TaskStatus, TriggerConfig,
    WorkflowCheckpoint, WorkflowExecution,
};

/// Input for creating a task; the store assigns identity.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub instructions: String,
    pub trigger_config: Option<TriggerConfig>,
    pub execution_config: ExecutionConfig,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            instructions: instructions.into(),
            ..Default::default()
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger_config = Some(trigger);
        self
    }
}

/// Global ids live in a different space than per-project sequence counters,
/// the way database row ids do.
const GLOBAL_ID_BASE: i64 = 10_000;

struct Inner {
    tasks: IndexMap<(i64, i64), Task>,
    projects: HashMap<i64, ProjectInfo>,
    executions: HashMap<String, WorkflowExecution>,
    checkpoints: HashMap<String, Vec<WorkflowCheckpoint>>,
    next_global_id: i64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            tasks: IndexMap::new(),
            projects: HashMap::new(),
            executions: HashMap::new(),
            checkpoints: HashMap::new(),
            next_global_id: GLOBAL_ID_BASE,
        }
    }
}

/// Shared in-memory implementation of [`TaskStore`] and [`MetadataStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_project(&self, project: ProjectInfo) {
        let mut inner = self.inner.write().await;
        inner.projects.insert(project.id, project);
    }

    /// Create a task, assigning the next 1-based sequence for the project
    /// and a fresh process-lifetime global id.
    pub async fn insert_task(&self, project_id: i64, draft: TaskDraft) -> Task {
        let mut inner = self.inner.write().await;
        let sequence = inner
            .tasks
            .keys()
            .filter(|(pid, _)| *pid == project_id)
            .map(|(_, seq)| *seq)
            .max()
            .unwrap_or(0)
            + 1;
        inner.next_global_id += 1;
        let global_id = inner.next_global_id;

        let task = Task {
            project_id,
            project_sequence: sequence,
            global_id: Some(global_id),
            title: draft.title,
            instructions: draft.instructions,
            status: TaskStatus::Todo,
            trigger_config: draft.trigger_config,
            execution_config: draft.execution_config,
            execution_result: None,
            retry_count: 0,
            last_error: None,
        };
        inner
            .tasks
            .insert((project_id, sequence), task.clone());
        task
    }

    /// Import exported tasks into a (fresh) project: sequence numbers are
    /// preserved byte for byte, global ids are re-minted.
    pub async fn import_tasks(&self, project_id: i64, tasks: Vec<Task>) -> Result<()> {
        let mut inner = self.inner.write().await;
        for mut task in tasks {
            task.project_id = project_id;
            inner.next_global_id += 1;
            task.global_id = Some(inner.next_global_id);
            if inner
                .tasks
                .insert((project_id, task.project_sequence), task)
                .is_some()
            {
                return Err(StoreError::Backend(format!(
                    "sequence collision during import into project {}",
                    project_id
                )));
            }
        }
        Ok(())
    }

    /// Every checkpoint written for a run, oldest first.
    pub async fn checkpoints(&self, workflow_id: &str) -> Vec<WorkflowCheckpoint> {
        let inner = self.inner.read().await;
        inner
            .checkpoints
            .get(workflow_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Direct mutation hook for tests that need to preset status or results.
    pub async fn put_task(&self, task: Task) {
        let mut inner = self.inner.write().await;
        inner
            .tasks
            .insert((task.project_id, task.project_sequence), task);
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_task(&self, project_id: i64, sequence: i64) -> Result<Option<Task>> {
        let inner = self.inner.read().await;
        Ok(inner.tasks.get(&(project_id, sequence)).cloned())
    }

    async fn tasks_in_project(&self, project_id: i64) -> Result<Vec<Task>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn update_task_status(
        &self,
        project_id: i64,
        sequence: i64,
        status: TaskStatus,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&(project_id, sequence))
            .ok_or(StoreError::TaskNotFound {
                project_id,
                sequence,
            })?;
        task.status = status;
        Ok(())
    }

    async fn update_task_result(
        &self,
        project_id: i64,
        sequence: i64,
        result: ExecutionResult,
        retry_count: u32,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&(project_id, sequence))
            .ok_or(StoreError::TaskNotFound {
                project_id,
                sequence,
            })?;
        task.execution_result = Some(result);
        task.status = TaskStatus::Done;
        task.retry_count = retry_count;
        task.last_error = None;
        Ok(())
    }

    async fn mark_task_failed(
        &self,
        project_id: i64,
        sequence: i64,
        retry_count: u32,
        error: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&(project_id, sequence))
            .ok_or(StoreError::TaskNotFound {
                project_id,
                sequence,
            })?;
        task.status = TaskStatus::Failed;
        task.retry_count = retry_count;
        task.last_error = Some(error.to_string());
        Ok(())
    }

    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .executions
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn get_execution(&self, workflow_id: &str) -> Result<Option<WorkflowExecution>> {
        let inner = self.inner.read().await;
        Ok(inner.executions.get(workflow_id).cloned())
    }

    async fn save_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .checkpoints
            .entry(checkpoint.workflow_id.clone())
            .or_default()
            .push(checkpoint.clone());
        Ok(())
    }

    async fn latest_checkpoint(&self, workflow_id: &str) -> Result<Option<WorkflowCheckpoint>> {
        let inner = self.inner.read().await;
        Ok(inner
            .checkpoints
            .get(workflow_id)
            .and_then(|list| list.last())
            .cloned())
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn project(&self, project_id: i64) -> Result<Option<ProjectInfo>> {
        let inner = self.inner.read().await;
        Ok(inner.projects.get(&project_id).cloned())
    }
}
