// ABOUTME: Runs one task: materialize instructions, execute with classified retries, store result
// ABOUTME: Backoff sleeps are suspension points; concurrent tasks keep running

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::capability::{CapabilityError, ExecutionCapability, FailureClass};
use super::error::{ExecutorError, Result};
use super::retry::RetryPolicy;
use crate::model::{ExecutionResult, Task, TaskStatus};
use crate::store::{MetadataStore, TaskStore};
use crate::template::{MacroResolver, UnresolvedMacro};

/// How one task run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed {
        result: ExecutionResult,
        /// Total capability invocations, including the first.
        attempts: u32,
    },
    /// Instructions still carry unresolved macro tokens; the capability was
    /// never invoked and the task is reported blocked, not failed.
    Blocked { unresolved: Vec<UnresolvedMacro> },
    Failed {
        class: FailureClass,
        attempts: u32,
        error: String,
    },
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed { .. })
    }
}

/// Per-task executor. Cheap to clone; shared across a stage's concurrent
/// task futures.
#[derive(Clone)]
pub struct TaskRunner {
    store: Arc<dyn TaskStore>,
    metadata: Arc<dyn MetadataStore>,
    capability: Arc<dyn ExecutionCapability>,
    resolver: Arc<MacroResolver>,
    policy: RetryPolicy,
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        metadata: Arc<dyn MetadataStore>,
        capability: Arc<dyn ExecutionCapability>,
    ) -> Self {
        Self {
            store,
            metadata,
            capability,
            resolver: Arc::new(MacroResolver::new()),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_resolver(mut self, resolver: MacroResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Execute one task to a terminal outcome.
    #[instrument(skip(self))]
    pub async fn run(&self, project_id: i64, sequence: i64) -> Result<TaskOutcome> {
        let snapshot = self.store.tasks_in_project(project_id).await?;
        let task = snapshot
            .iter()
            .find(|t| t.project_sequence == sequence)
            .ok_or(ExecutorError::TaskNotFound {
                project_id,
                sequence,
            })?
            .clone();
        let project = self.metadata.project(project_id).await?;

        let resolved = self.resolver.resolve(&task, &snapshot, project.as_ref());
        if !resolved.is_fully_resolved() {
            warn!(
                task = sequence,
                tokens = resolved.unresolved.len(),
                "instructions carry unresolved macros; reporting blocked"
            );
            self.store
                .update_task_status(project_id, sequence, TaskStatus::Blocked)
                .await?;
            return Ok(TaskOutcome::Blocked {
                unresolved: resolved.unresolved,
            });
        }

        self.store
            .update_task_status(project_id, sequence, TaskStatus::InProgress)
            .await?;

        self.attempt_loop(&task, &resolved.text).await
    }

    async fn attempt_loop(&self, task: &Task, instruction: &str) -> Result<TaskOutcome> {
        let max_attempts = self.policy.max_retries + 1;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            info!(
                task = task.project_sequence,
                attempt = attempts,
                max_attempts,
                "executing task"
            );

            let failure = match self
                .capability
                .execute(instruction, &task.execution_config)
                .await
            {
                Ok(output) => {
                    self.store
                        .update_task_result(
                            task.project_id,
                            task.project_sequence,
                            output.result.clone(),
                            attempts - 1,
                        )
                        .await?;
                    debug!(
                        task = task.project_sequence,
                        attempts, "task completed"
                    );
                    return Ok(TaskOutcome::Completed {
                        result: output.result,
                        attempts,
                    });
                }
                Err(err) => err,
            };

            match failure.class() {
                FailureClass::RateLimit => {
                    return self
                        .fail(task, FailureClass::RateLimit, attempts, failure)
                        .await;
                }
                FailureClass::Fatal => {
                    return self.fail(task, FailureClass::Fatal, attempts, failure).await;
                }
                FailureClass::Transient => {
                    if attempts >= max_attempts {
                        return self
                            .fail(task, FailureClass::Transient, attempts, failure)
                            .await;
                    }
                    let delay = self.policy.delay_for(attempts - 1);
                    warn!(
                        task = task.project_sequence,
                        attempt = attempts,
                        ?delay,
                        error = %failure,
                        "transient failure; backing off before retry"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn fail(
        &self,
        task: &Task,
        class: FailureClass,
        attempts: u32,
        err: CapabilityError,
    ) -> Result<TaskOutcome> {
        error!(
            task = task.project_sequence,
            ?class,
            attempts,
            error = %err,
            "task failed"
        );
        self.store
            .mark_task_failed(
                task.project_id,
                task.project_sequence,
                attempts - 1,
                &err.to_string(),
            )
            .await?;
        Ok(TaskOutcome::Failed {
            class,
            attempts,
            error: err.to_string(),
        })
    }
}
