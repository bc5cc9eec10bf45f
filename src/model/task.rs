// ABOUTME: Task records and their declarative trigger configurations
// ABOUTME: Identity is (project_id, project_sequence); legacy rows may carry a global id

use serde::{Deserialize, Serialize};

use super::result::ExecutionResult;

/// A node in a project-scoped task graph.
///
/// `project_sequence` is the durable, human-meaningful identity: assigned
/// 1-based at creation, unique within the project, never reused. `global_id`
/// only exists on rows created before the sequence scheme and is not stable
/// across export/import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub project_id: i64,
    pub project_sequence: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<i64>,
    pub title: String,
    /// Raw instruction text; may contain `{{...}}` macro tokens.
    #[serde(default)]
    pub instructions: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_config: Option<TriggerConfig>,
    #[serde(default)]
    pub execution_config: ExecutionConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<ExecutionResult>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    NeedsApproval,
    InReview,
    Done,
    Blocked,
    Failed,
}

impl TaskStatus {
    /// Terminal statuses are never dispatched again within a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::NeedsApproval => "needs_approval",
            TaskStatus::InReview => "in_review",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declarative dependency/condition specification attached to a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<DependsOn>,
}

/// `task_ids` is ambiguous by construction: it may hold project-sequence
/// numbers (current scheme) or legacy global identifiers. One array never
/// mixes both schemes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependsOn {
    #[serde(default)]
    pub task_ids: Vec<i64>,
    #[serde(default)]
    pub operator: DependencyOperator,
    /// Boolean expression over sequence numbers, e.g. `"(5 && 7) || 8"`.
    /// Overrides `operator`/`task_ids` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default)]
    pub execution_policy: ExecutionPolicy,
}

impl Default for DependsOn {
    fn default() -> Self {
        Self {
            task_ids: Vec::new(),
            operator: DependencyOperator::All,
            expression: None,
            execution_policy: ExecutionPolicy::Once,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyOperator {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPolicy {
    /// A task already `done` is never re-triggered by dependency completion.
    #[default]
    Once,
    /// The task re-triggers whenever its dependencies complete again.
    Repeat,
}

/// Opaque configuration handed to the external execution capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Task {
    /// Dependency spec, if any. Convenience accessor for the resolver layers.
    pub fn depends_on(&self) -> Option<&DependsOn> {
        self.trigger_config.as_ref()?.depends_on.as_ref()
    }

    pub fn execution_policy(&self) -> ExecutionPolicy {
        self.depends_on()
            .map(|d| d.execution_policy)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::NeedsApproval).unwrap();
        assert_eq!(json, "\"needs_approval\"");

        let status: TaskStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, TaskStatus::InProgress);
    }

    #[test]
    fn test_depends_on_camel_case_round_trip() {
        let json = r#"{
            "taskIds": [1, 2],
            "operator": "any",
            "executionPolicy": "repeat"
        }"#;

        let deps: DependsOn = serde_json::from_str(json).unwrap();
        assert_eq!(deps.task_ids, vec![1, 2]);
        assert_eq!(deps.operator, DependencyOperator::Any);
        assert_eq!(deps.execution_policy, ExecutionPolicy::Repeat);

        let back = serde_json::to_string(&deps).unwrap();
        assert!(back.contains("\"taskIds\""));
        assert!(back.contains("\"executionPolicy\""));
    }

    #[test]
    fn test_depends_on_defaults() {
        let deps: DependsOn = serde_json::from_str("{}").unwrap();
        assert!(deps.task_ids.is_empty());
        assert_eq!(deps.operator, DependencyOperator::All);
        assert_eq!(deps.execution_policy, ExecutionPolicy::Once);
        assert!(deps.expression.is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Todo.is_terminal());
        assert!(!TaskStatus::Blocked.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }
}
