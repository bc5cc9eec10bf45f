// ABOUTME: Task readiness evaluation from declarative trigger configurations
// ABOUTME: Also fixes the ascending-sequence dependency order behind {{prev.N}} addressing

use std::collections::HashSet;

use tracing::debug;

use super::address::resolve_dependencies;
use super::error::{GraphError, Result};
use super::expression::DependencyExpr;
use crate::model::{DependencyOperator, ExecutionPolicy, Task, TaskStatus};

/// Decide whether a task's dependencies are satisfied against a snapshot of
/// its project. Pure over the snapshot: the caller takes one consistent read
/// per stage and every concurrent readiness check sees the same view.
pub fn is_ready(task: &Task, project_tasks: &[Task]) -> Result<bool> {
    let Some(deps) = task.depends_on() else {
        // No trigger config: a root task, ready unless it already ran.
        return Ok(task.status != TaskStatus::Done);
    };

    // A `once` task that already completed never re-triggers.
    if task.status == TaskStatus::Done && deps.execution_policy == ExecutionPolicy::Once {
        return Ok(false);
    }

    let done: HashSet<i64> = project_tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .map(|t| t.project_sequence)
        .collect();

    if let Some(ref expression) = deps.expression {
        let expr = DependencyExpr::parse(expression).map_err(|source| GraphError::Expression {
            sequence: task.project_sequence,
            source,
        })?;
        let ready = expr.eval(&|seq| done.contains(&seq));
        debug!(
            task = task.project_sequence,
            expression, ready, "evaluated dependency expression"
        );
        return Ok(ready);
    }

    if deps.task_ids.is_empty() {
        return Ok(true);
    }

    let resolved = resolve_dependencies(project_tasks, &deps.task_ids);
    let ready = match deps.operator {
        DependencyOperator::All => {
            // Unresolvable references count as not-done, so the task waits.
            resolved.len() == deps.task_ids.len()
                && resolved.iter().all(|t| t.status == TaskStatus::Done)
        }
        DependencyOperator::Any => resolved.iter().any(|t| t.status == TaskStatus::Done),
    };

    debug!(
        task = task.project_sequence,
        operator = ?deps.operator,
        ready,
        "evaluated dependency operator"
    );
    Ok(ready)
}

/// The task's dependency set sorted ascending by sequence number.
///
/// Index 0 is the oldest dependency; the last element is the most recent and
/// is what `{{prev}}` / `{{prev.0}}` address.
pub fn ordered_dependencies<'a>(task: &Task, project_tasks: &'a [Task]) -> Vec<&'a Task> {
    let Some(deps) = task.depends_on() else {
        return Vec::new();
    };

    let mut resolved = resolve_dependencies(project_tasks, &deps.task_ids);
    resolved.sort_by_key(|t| t.project_sequence);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependsOn, TriggerConfig};

    fn task(sequence: i64, status: TaskStatus) -> Task {
        Task {
            project_id: 1,
            project_sequence: sequence,
            global_id: None,
            title: format!("task {}", sequence),
            instructions: String::new(),
            status,
            trigger_config: None,
            execution_config: Default::default(),
            execution_result: None,
            retry_count: 0,
            last_error: None,
        }
    }

    fn with_deps(mut base: Task, deps: DependsOn) -> Task {
        base.trigger_config = Some(TriggerConfig {
            depends_on: Some(deps),
        });
        base
    }

    #[test]
    fn test_all_operator_requires_every_dependency_done() {
        let a = task(1, TaskStatus::Done);
        let b = task(2, TaskStatus::Todo);
        let c = with_deps(
            task(3, TaskStatus::Todo),
            DependsOn {
                task_ids: vec![1, 2],
                ..Default::default()
            },
        );
        let snapshot = vec![a, b, c.clone()];

        assert!(!is_ready(&c, &snapshot).unwrap());

        let mut snapshot_done = snapshot.clone();
        snapshot_done[1].status = TaskStatus::Done;
        assert!(is_ready(&c, &snapshot_done).unwrap());
    }

    #[test]
    fn test_any_operator_requires_one_dependency_done() {
        let a = task(1, TaskStatus::Todo);
        let b = task(2, TaskStatus::Done);
        let c = with_deps(
            task(3, TaskStatus::Todo),
            DependsOn {
                task_ids: vec![1, 2],
                operator: DependencyOperator::Any,
                ..Default::default()
            },
        );
        let snapshot = vec![a, b, c.clone()];
        assert!(is_ready(&c, &snapshot).unwrap());
    }

    #[test]
    fn test_chain_readiness_tracks_upstream_status() {
        let a = task(1, TaskStatus::Done);
        let b = with_deps(
            task(2, TaskStatus::Todo),
            DependsOn {
                task_ids: vec![1],
                ..Default::default()
            },
        );
        let snapshot = vec![a, b.clone()];
        assert!(is_ready(&b, &snapshot).unwrap());

        for status in [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::NeedsApproval,
            TaskStatus::InReview,
            TaskStatus::Blocked,
            TaskStatus::Failed,
        ] {
            let mut snap = snapshot.clone();
            snap[0].status = status;
            assert!(!is_ready(&b, &snap).unwrap(), "status {:?}", status);
        }
    }

    #[test]
    fn test_unresolved_reference_keeps_task_waiting() {
        let a = task(1, TaskStatus::Done);
        let b = with_deps(
            task(2, TaskStatus::Todo),
            DependsOn {
                task_ids: vec![1, 99],
                ..Default::default()
            },
        );
        let snapshot = vec![a, b.clone()];
        assert!(!is_ready(&b, &snapshot).unwrap());
    }

    #[test]
    fn test_expression_overrides_operator() {
        let mut deps = DependsOn {
            task_ids: vec![5],
            expression: Some("(5 && 7) || 8".to_string()),
            ..Default::default()
        };
        deps.operator = DependencyOperator::All;

        let five = task(5, TaskStatus::Todo);
        let seven = task(7, TaskStatus::Todo);
        let eight = task(8, TaskStatus::Done);
        let target = with_deps(task(9, TaskStatus::Todo), deps);
        let snapshot = vec![five, seven, eight, target.clone()];

        // 8 alone satisfies the expression even though 5 is not done.
        assert!(is_ready(&target, &snapshot).unwrap());
    }

    #[test]
    fn test_malformed_expression_is_configuration_error() {
        let target = with_deps(
            task(2, TaskStatus::Todo),
            DependsOn {
                expression: Some("5 &&".to_string()),
                ..Default::default()
            },
        );
        let snapshot = vec![task(1, TaskStatus::Done), target.clone()];
        assert!(matches!(
            is_ready(&target, &snapshot),
            Err(GraphError::Expression { sequence: 2, .. })
        ));
    }

    #[test]
    fn test_once_policy_suppresses_completed_task() {
        let a = task(1, TaskStatus::Done);
        let b = with_deps(
            task(2, TaskStatus::Done),
            DependsOn {
                task_ids: vec![1],
                ..Default::default()
            },
        );
        let snapshot = vec![a, b.clone()];
        assert!(!is_ready(&b, &snapshot).unwrap());
    }

    #[test]
    fn test_repeat_policy_re_triggers_completed_task() {
        let a = task(1, TaskStatus::Done);
        let b = with_deps(
            task(2, TaskStatus::Done),
            DependsOn {
                task_ids: vec![1],
                execution_policy: ExecutionPolicy::Repeat,
                ..Default::default()
            },
        );
        let snapshot = vec![a, b.clone()];
        assert!(is_ready(&b, &snapshot).unwrap());
    }

    #[test]
    fn test_ordered_dependencies_ascending_by_sequence() {
        let t1 = task(1, TaskStatus::Done);
        let t4 = task(4, TaskStatus::Done);
        let t2 = task(2, TaskStatus::Done);
        let target = with_deps(
            task(5, TaskStatus::Todo),
            DependsOn {
                task_ids: vec![4, 1, 2],
                ..Default::default()
            },
        );
        let snapshot = vec![t1, t4, t2, target.clone()];

        let ordered = ordered_dependencies(&target, &snapshot);
        let sequences: Vec<i64> = ordered.iter().map(|t| t.project_sequence).collect();
        assert_eq!(sequences, vec![1, 2, 4]);
    }
}
