// ABOUTME: Run progress bookkeeping between stages and across resume
// ABOUTME: Checkpoints restore exactly what a stage boundary persisted, nothing more

use std::collections::{HashMap, HashSet};

use crate::model::WorkflowCheckpoint;

/// In-flight progress of one workflow run: what has completed and the
/// accumulated run context. Converted to a checkpoint at every stage
/// boundary and reconstructed from the latest checkpoint on resume.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunProgress {
    pub completed: HashSet<i64>,
    pub context: HashMap<String, String>,
    pub next_stage: usize,
}

impl RunProgress {
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn from_checkpoint(checkpoint: &WorkflowCheckpoint) -> Self {
        Self {
            completed: checkpoint.completed_task_ids.iter().copied().collect(),
            context: checkpoint.context.clone(),
            next_stage: checkpoint.stage_index + 1,
        }
    }

    pub fn to_checkpoint(&self, workflow_id: &str, stage_index: usize) -> WorkflowCheckpoint {
        let mut completed: Vec<i64> = self.completed.iter().copied().collect();
        completed.sort_unstable();
        WorkflowCheckpoint::new(workflow_id, stage_index, completed, self.context.clone())
    }
}
