// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Project builders over the in-memory store and scripted execution capabilities

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stagecraft::executor::{CapabilityError, ExecutionCapability, ExecutionOutput};
use stagecraft::model::{
    DependencyOperator, DependsOn, ExecutionConfig, ExecutionPolicy, Task, TriggerConfig,
};
use stagecraft::orchestrator::RunControl;
use stagecraft::store::{MemoryStore, TaskDraft};

/// Route test logs through the capturing writer; `RUST_LOG` controls level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TaskSpec {
    pub title: String,
    pub instructions: String,
    pub depends_on: Option<DependsOn>,
}

/// Builds a project's task graph in a `MemoryStore`, assigning sequence
/// numbers in insertion order (1, 2, 3, …).
pub struct ProjectBuilder {
    project_id: i64,
    tasks: Vec<TaskSpec>,
}

impl ProjectBuilder {
    pub fn new(project_id: i64) -> Self {
        Self {
            project_id,
            tasks: Vec::new(),
        }
    }

    pub fn add_task(mut self, title: &str, instructions: &str) -> Self {
        self.tasks.push(TaskSpec {
            title: title.to_string(),
            instructions: instructions.to_string(),
            depends_on: None,
        });
        self
    }

    pub fn add_dependent_task(
        mut self,
        title: &str,
        instructions: &str,
        task_ids: Vec<i64>,
    ) -> Self {
        self.tasks.push(TaskSpec {
            title: title.to_string(),
            instructions: instructions.to_string(),
            depends_on: Some(DependsOn {
                task_ids,
                ..Default::default()
            }),
        });
        self
    }

    pub fn add_any_task(mut self, title: &str, instructions: &str, task_ids: Vec<i64>) -> Self {
        self.tasks.push(TaskSpec {
            title: title.to_string(),
            instructions: instructions.to_string(),
            depends_on: Some(DependsOn {
                task_ids,
                operator: DependencyOperator::Any,
                ..Default::default()
            }),
        });
        self
    }

    pub fn add_expression_task(mut self, title: &str, instructions: &str, expr: &str) -> Self {
        self.tasks.push(TaskSpec {
            title: title.to_string(),
            instructions: instructions.to_string(),
            depends_on: Some(DependsOn {
                expression: Some(expr.to_string()),
                ..Default::default()
            }),
        });
        self
    }

    pub fn add_repeat_task(mut self, title: &str, instructions: &str, task_ids: Vec<i64>) -> Self {
        self.tasks.push(TaskSpec {
            title: title.to_string(),
            instructions: instructions.to_string(),
            depends_on: Some(DependsOn {
                task_ids,
                execution_policy: ExecutionPolicy::Repeat,
                ..Default::default()
            }),
        });
        self
    }

    pub async fn build(self) -> (Arc<MemoryStore>, Vec<Task>) {
        let store = Arc::new(MemoryStore::new());
        let mut tasks = Vec::new();
        for spec in self.tasks {
            let draft = TaskDraft {
                title: spec.title,
                instructions: spec.instructions,
                trigger_config: spec.depends_on.map(|depends_on| TriggerConfig {
                    depends_on: Some(depends_on),
                }),
                execution_config: ExecutionConfig::default(),
            };
            tasks.push(store.insert_task(self.project_id, draft).await);
        }
        (store, tasks)
    }
}

/// Capability fake replaying a scripted queue of responses; records every
/// instruction it was invoked with.
pub struct ScriptedCapability {
    responses: Mutex<VecDeque<Result<ExecutionOutput, CapabilityError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedCapability {
    pub fn new(responses: Vec<Result<ExecutionOutput, CapabilityError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Echoes back each instruction as a text result once the script runs dry.
    pub fn echoing() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains(needle))
            .count()
    }
}

#[async_trait]
impl ExecutionCapability for ScriptedCapability {
    async fn execute(
        &self,
        instruction: &str,
        _config: &ExecutionConfig,
    ) -> Result<ExecutionOutput, CapabilityError> {
        self.calls.lock().unwrap().push(instruction.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ExecutionOutput::text(format!("echo: {}", instruction))))
    }
}

/// Capability that succeeds everything but pauses the run after executing an
/// instruction containing the trigger needle.
pub struct PausingCapability {
    trigger: String,
    control: Mutex<Option<RunControl>>,
    calls: Mutex<Vec<String>>,
}

impl PausingCapability {
    pub fn new(trigger: &str) -> Arc<Self> {
        Arc::new(Self {
            trigger: trigger.to_string(),
            control: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_control(&self, control: RunControl) {
        *self.control.lock().unwrap() = Some(control);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains(needle))
            .count()
    }
}

#[async_trait]
impl ExecutionCapability for PausingCapability {
    async fn execute(
        &self,
        instruction: &str,
        _config: &ExecutionConfig,
    ) -> Result<ExecutionOutput, CapabilityError> {
        self.calls.lock().unwrap().push(instruction.to_string());
        if instruction.contains(&self.trigger) {
            if let Some(control) = self.control.lock().unwrap().as_ref() {
                control.pause();
            }
        }
        Ok(ExecutionOutput::text(format!("echo: {}", instruction)))
    }
}

/// Capability that fails (transport error) for instructions containing any of
/// the given needles and succeeds otherwise.
pub struct FailingCapability {
    fail_on: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FailingCapability {
    pub fn new(fail_on: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fail_on: fail_on.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionCapability for FailingCapability {
    async fn execute(
        &self,
        instruction: &str,
        _config: &ExecutionConfig,
    ) -> Result<ExecutionOutput, CapabilityError> {
        self.calls.lock().unwrap().push(instruction.to_string());
        if self.fail_on.iter().any(|needle| instruction.contains(needle)) {
            return Err(CapabilityError::Transport("connection reset".to_string()));
        }
        Ok(ExecutionOutput::text(format!("echo: {}", instruction)))
    }
}
