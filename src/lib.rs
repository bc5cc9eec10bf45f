// ABOUTME: Workflow execution core for project task graphs
// ABOUTME: Dependency resolution, macro substitution, retrying execution, and checkpointed runs

pub mod executor;
pub mod graph;
pub mod model;
pub mod orchestrator;
pub mod store;
pub mod template;

// Re-export commonly used types
pub use executor::{
    CapabilityError, ExecutionCapability, ExecutionOutput, FailureClass, RetryPolicy, TaskOutcome,
    TaskRunner,
};
pub use graph::{AddressScheme, DependencyGraph, GraphError, StagePlan};
pub use model::{
    DependencyOperator, DependsOn, ExecutionPolicy, ExecutionResult, ProjectInfo, Task,
    TaskStatus, TriggerConfig, WorkflowCheckpoint, WorkflowExecution, WorkflowStatus,
};
pub use orchestrator::{OrchestratorError, RunControl, WorkflowOrchestrator};
pub use store::{MemoryStore, MetadataStore, StoreError, TaskDraft, TaskStore};
pub use template::{MacroResolver, ResolvedInstruction, ResultCodec, UnresolvedMacro};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
