// ABOUTME: Dual task-addressing schemes: durable project sequences vs legacy global ids
// ABOUTME: Detection runs once at the boundary; downstream code sees one tagged representation

use std::collections::HashSet;

use crate::model::Task;

/// The addressing scheme a `taskIds` array uses, decided once by
/// [`detect_scheme`]. Sequence numbers are the durable cross-export scheme;
/// global ids only appear on legacy data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressScheme {
    ProjectSequence(Vec<i64>),
    Global(Vec<i64>),
}

impl AddressScheme {
    pub fn ids(&self) -> &[i64] {
        match self {
            AddressScheme::ProjectSequence(ids) | AddressScheme::Global(ids) => ids,
        }
    }
}

/// Decide which scheme a `taskIds` array uses against a project snapshot.
///
/// Every id matching a `project_sequence` in the project means the current
/// scheme; zero or a strict subset matching means legacy global ids. An empty
/// array is vacuously `ProjectSequence` so call sites need no special case.
pub fn detect_scheme(project_tasks: &[Task], task_ids: &[i64]) -> AddressScheme {
    if task_ids.is_empty() {
        return AddressScheme::ProjectSequence(Vec::new());
    }

    let sequences: HashSet<i64> = project_tasks.iter().map(|t| t.project_sequence).collect();
    if task_ids.iter().all(|id| sequences.contains(id)) {
        AddressScheme::ProjectSequence(task_ids.to_vec())
    } else {
        AddressScheme::Global(task_ids.to_vec())
    }
}

/// Map sequence numbers to global ids. A partial function: sequences with no
/// match (or whose task has no global id) are dropped, so the output may be
/// shorter than the input; order of matched entries follows the input. Empty
/// input short-circuits without touching the snapshot.
pub fn to_global_ids(project_tasks: &[Task], sequences: &[i64]) -> Vec<i64> {
    if sequences.is_empty() {
        return Vec::new();
    }

    sequences
        .iter()
        .filter_map(|seq| {
            project_tasks
                .iter()
                .find(|t| t.project_sequence == *seq)
                .and_then(|t| t.global_id)
        })
        .collect()
}

/// Resolve a `taskIds` array to the tasks it names, scheme-aware.
///
/// Unresolvable ids are skipped: a dependency reference must resolve to
/// exactly one task in the same project or it is treated as unresolved, which
/// keeps the dependent task un-ready rather than failing it.
pub fn resolve_dependencies<'a>(project_tasks: &'a [Task], task_ids: &[i64]) -> Vec<&'a Task> {
    match detect_scheme(project_tasks, task_ids) {
        AddressScheme::ProjectSequence(ids) => ids
            .iter()
            .filter_map(|id| project_tasks.iter().find(|t| t.project_sequence == *id))
            .collect(),
        AddressScheme::Global(ids) => ids
            .iter()
            .filter_map(|id| project_tasks.iter().find(|t| t.global_id == Some(*id)))
            .collect(),
    }
}

/// Answer "is `candidate` part of `task`'s dependency set".
pub fn is_dependency(project_tasks: &[Task], task: &Task, candidate: &Task) -> bool {
    let Some(deps) = task.depends_on() else {
        return false;
    };
    resolve_dependencies(project_tasks, &deps.task_ids)
        .iter()
        .any(|t| t.project_sequence == candidate.project_sequence)
}
