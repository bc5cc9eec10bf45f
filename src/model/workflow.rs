// ABOUTME: Workflow run state, stage checkpoints, and project metadata
// ABOUTME: A WorkflowExecution is mutated per stage; checkpoints are immutable snapshots

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One run of a project's task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: String,
    pub project_id: i64,
    pub status: WorkflowStatus,
    pub current_stage: usize,
    pub total_stages: usize,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
    /// Nominal stages of ready-task batches, sequence-addressed.
    pub plan: Vec<Vec<i64>>,
    /// Run-scoped key/value state accumulated across stages.
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl WorkflowExecution {
    pub fn new(project_id: i64, plan: Vec<Vec<i64>>) -> Self {
        let total_stages = plan.len();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id,
            status: WorkflowStatus::Pending,
            current_stage: 0,
            total_stages,
            completed_tasks: 0,
            failed_tasks: 0,
            plan,
            context: HashMap::new(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

/// Immutable snapshot of run progress at a stage boundary. Written after a
/// stage's results are recorded and before the next stage dispatches, so a
/// crash never loses more than the in-flight stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowCheckpoint {
    pub workflow_id: String,
    pub stage_index: usize,
    /// Sequence numbers of every task completed so far in this run.
    pub completed_task_ids: Vec<i64>,
    pub context: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowCheckpoint {
    pub fn new(
        workflow_id: impl Into<String>,
        stage_index: usize,
        completed_task_ids: Vec<i64>,
        context: HashMap<String, String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            stage_index,
            completed_task_ids,
            context,
            created_at: Utc::now(),
        }
    }
}

/// Read-only project metadata consumed by `{{project.*}}` macros.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dev_folder: Option<String>,
}
