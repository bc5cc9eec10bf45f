// ABOUTME: Advances a workflow run stage by stage with checkpointing and cooperative control
// ABOUTME: Tasks within a stage run concurrently; stages are strictly sequential

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use super::checkpoint::RunProgress;
use super::error::{OrchestratorError, Result};
use crate::executor::{ExecutionCapability, RetryPolicy, TaskOutcome, TaskRunner};
use crate::graph::{is_ready, DependencyGraph};
use crate::model::{
    ExecutionPolicy, Task, TaskStatus, WorkflowExecution, WorkflowStatus,
};
use crate::store::{MetadataStore, TaskStore};
use crate::template::MacroResolver;

const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Cooperative pause/cancel signal, observable from outside the run loop.
/// Checked at stage boundaries; in-flight external calls are allowed to
/// finish.
#[derive(Clone, Default)]
pub struct RunControl {
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl RunControl {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn unpause(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub struct WorkflowOrchestrator {
    store: Arc<dyn TaskStore>,
    runner: TaskRunner,
    semaphore: Arc<Semaphore>,
    control: RunControl,
}

impl WorkflowOrchestrator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        metadata: Arc<dyn MetadataStore>,
        capability: Arc<dyn ExecutionCapability>,
    ) -> Self {
        Self {
            store: Arc::clone(&store),
            runner: TaskRunner::new(store, metadata, capability),
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
            control: RunControl::default(),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.runner = self.runner.with_policy(policy);
        self
    }

    pub fn with_resolver(mut self, resolver: MacroResolver) -> Self {
        self.runner = self.runner.with_resolver(resolver);
        self
    }

    /// Handle for pausing or cancelling from another task.
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Start a fresh run over a project's graph.
    #[instrument(skip(self))]
    pub async fn start(&self, project_id: i64) -> Result<WorkflowExecution> {
        let snapshot = self.store.tasks_in_project(project_id).await?;
        let graph = DependencyGraph::from_project(&snapshot)?;
        graph.validate(&snapshot)?;
        let plan = graph.stage_plan()?;

        info!(
            project_id,
            stages = plan.stages.len(),
            tasks = plan.total_tasks,
            max_parallelism = plan.max_parallelism(),
            "starting workflow run"
        );

        let execution = WorkflowExecution::new(project_id, plan.stages);
        self.store.save_execution(&execution).await?;

        self.drive(execution, RunProgress::fresh()).await
    }

    /// Resume a run from its latest checkpoint without re-executing any
    /// task recorded there. A run paused before its first checkpoint
    /// restarts from the beginning of its remaining work.
    #[instrument(skip(self))]
    pub async fn resume(&self, workflow_id: &str) -> Result<WorkflowExecution> {
        let execution = self.store.get_execution(workflow_id).await?.ok_or_else(|| {
            OrchestratorError::ExecutionNotFound {
                workflow_id: workflow_id.to_string(),
            }
        })?;

        if execution.status.is_terminal() {
            return Err(OrchestratorError::AlreadyTerminal {
                workflow_id: workflow_id.to_string(),
                status: execution.status,
            });
        }

        let progress = match self.store.latest_checkpoint(workflow_id).await? {
            Some(checkpoint) => {
                info!(
                    workflow_id,
                    stage = checkpoint.stage_index,
                    completed = checkpoint.completed_task_ids.len(),
                    "resuming from checkpoint"
                );
                RunProgress::from_checkpoint(&checkpoint)
            }
            None => RunProgress::fresh(),
        };

        // Asking to resume implies lifting a pause.
        self.control.unpause();

        let mut execution = execution;
        execution.current_stage = progress.next_stage;
        execution.completed_tasks = progress.completed.len() as u32;
        execution.context = progress.context.clone();

        self.drive(execution, progress).await
    }

    async fn drive(
        &self,
        mut execution: WorkflowExecution,
        mut progress: RunProgress,
    ) -> Result<WorkflowExecution> {
        execution.status = WorkflowStatus::Running;
        execution.error = None;
        if execution.started_at.is_none() {
            execution.started_at = Some(Utc::now());
        }
        self.store.save_execution(&execution).await?;

        let mut stage_index = progress.next_stage;

        loop {
            if self.control.is_cancelled() {
                info!(workflow_id = %execution.id, "run cancelled before stage {}", stage_index);
                execution.status = WorkflowStatus::Cancelled;
                execution.finished_at = Some(Utc::now());
                self.store.save_execution(&execution).await?;
                return Ok(execution);
            }
            if self.control.is_paused() {
                info!(workflow_id = %execution.id, "run paused before stage {}", stage_index);
                execution.status = WorkflowStatus::Paused;
                self.store.save_execution(&execution).await?;
                return Ok(execution);
            }

            // One snapshot per stage: every readiness check in this stage
            // sees the same committed view of the task table.
            let snapshot = self.store.tasks_in_project(execution.project_id).await?;
            let mut ready = Vec::new();
            for task in &snapshot {
                if progress.completed.contains(&task.project_sequence) {
                    continue;
                }
                if !dispatchable(task) {
                    continue;
                }
                if is_ready(task, &snapshot)? {
                    ready.push(task.project_sequence);
                }
            }
            ready.sort_unstable();

            if ready.is_empty() {
                let blocked = unterminated(&snapshot, &progress.completed);
                if blocked.is_empty() {
                    info!(
                        workflow_id = %execution.id,
                        completed = execution.completed_tasks,
                        failed = execution.failed_tasks,
                        "workflow run completed"
                    );
                    execution.status = WorkflowStatus::Completed;
                    execution.finished_at = Some(Utc::now());
                    self.store.save_execution(&execution).await?;
                    return Ok(execution);
                }

                error!(
                    workflow_id = %execution.id,
                    stage = stage_index,
                    ?blocked,
                    "workflow stuck: no runnable tasks remain"
                );
                execution.status = WorkflowStatus::Failed;
                execution.error = Some(format!(
                    "no runnable tasks at stage {}; blocking set: {:?}",
                    stage_index, blocked
                ));
                execution.finished_at = Some(Utc::now());
                self.store.save_execution(&execution).await?;
                return Err(OrchestratorError::StuckGraph {
                    stage: stage_index,
                    blocked,
                });
            }

            info!(
                workflow_id = %execution.id,
                stage = stage_index,
                tasks = ?ready,
                "dispatching stage"
            );

            let outcomes = self.run_stage(execution.project_id, &ready).await?;
            for (sequence, outcome) in outcomes {
                match outcome {
                    TaskOutcome::Completed { .. } => {
                        progress.completed.insert(sequence);
                        execution.completed_tasks += 1;
                    }
                    TaskOutcome::Failed { .. } => {
                        execution.failed_tasks += 1;
                    }
                    TaskOutcome::Blocked { ref unresolved } => {
                        warn!(
                            task = sequence,
                            tokens = unresolved.len(),
                            "task blocked on unresolved macros"
                        );
                    }
                }
            }

            // The checkpoint must be durable before stage N+1 dispatches, so
            // a crash mid-run loses at most the in-flight stage.
            progress.context = execution.context.clone();
            let checkpoint = progress.to_checkpoint(&execution.id, stage_index);
            self.store.save_checkpoint(&checkpoint).await?;

            stage_index += 1;
            execution.current_stage = stage_index;
            self.store.save_execution(&execution).await?;
        }
    }

    /// Run one stage's tasks concurrently under the concurrency cap.
    async fn run_stage(
        &self,
        project_id: i64,
        ready: &[i64],
    ) -> Result<Vec<(i64, TaskOutcome)>> {
        let futures: Vec<_> = ready
            .iter()
            .map(|&sequence| {
                let runner = self.runner.clone();
                let semaphore = Arc::clone(&self.semaphore);
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .expect("stage semaphore never closes");
                    (sequence, runner.run(project_id, sequence).await)
                }
            })
            .collect();

        let mut outcomes = Vec::with_capacity(ready.len());
        for (sequence, result) in join_all(futures).await {
            outcomes.push((sequence, result?));
        }
        Ok(outcomes)
    }
}

fn dispatchable(task: &Task) -> bool {
    match task.status {
        TaskStatus::Todo => true,
        // Completed tasks re-dispatch only under a repeat policy, and at most
        // once per run (the completed set gates them above).
        TaskStatus::Done => task.execution_policy() == ExecutionPolicy::Repeat,
        _ => false,
    }
}

fn unterminated(snapshot: &[Task], completed: &HashSet<i64>) -> Vec<i64> {
    let mut blocked: Vec<i64> = snapshot
        .iter()
        .filter(|t| !t.status.is_terminal() && !completed.contains(&t.project_sequence))
        .map(|t| t.project_sequence)
        .collect();
    blocked.sort_unstable();
    blocked
}
