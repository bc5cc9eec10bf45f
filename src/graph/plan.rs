// ABOUTME: Build-time dependency graph validation and stage planning
// ABOUTME: Cycles, self-references, and mixed-scheme arrays are rejected here, not at runtime

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::{Direction, Graph};

use super::address::{detect_scheme, AddressScheme};
use super::error::{GraphError, Result};
use super::expression::DependencyExpr;
use crate::model::Task;

/// Project dependency graph over sequence numbers. Edges run from a
/// dependency to its dependents; expression atoms contribute edges the same
/// way operator lists do, so cycle detection covers both forms.
pub struct DependencyGraph {
    graph: Graph<i64, ()>,
    node_for: HashMap<i64, NodeIndex>,
}

/// Batched stages of tasks whose dependencies are satisfied by earlier
/// stages. Tasks within one stage are independent by construction.
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub stages: Vec<Vec<i64>>,
    pub total_tasks: usize,
}

impl DependencyGraph {
    /// Build and validate the graph for one project snapshot.
    pub fn from_project(tasks: &[Task]) -> Result<Self> {
        let mut graph = Graph::new();
        let mut node_for = HashMap::new();

        for task in tasks {
            if node_for.contains_key(&task.project_sequence) {
                return Err(GraphError::DuplicateSequence {
                    project_id: task.project_id,
                    sequence: task.project_sequence,
                });
            }
            let node = graph.add_node(task.project_sequence);
            node_for.insert(task.project_sequence, node);
        }

        for task in tasks {
            let task_node = node_for[&task.project_sequence];
            for dep_sequence in referenced_sequences(task, tasks)? {
                if dep_sequence == task.project_sequence {
                    return Err(GraphError::SelfDependency {
                        sequence: task.project_sequence,
                    });
                }
                // References to tasks outside the project stay unresolved;
                // they gate readiness at runtime instead of breaking the plan.
                if let Some(&dep_node) = node_for.get(&dep_sequence) {
                    graph.add_edge(dep_node, task_node, ());
                }
            }
        }

        let built = Self { graph, node_for };
        built.check_acyclic()?;
        Ok(built)
    }

    /// Reject mixed-scheme `taskIds` arrays: some ids resolving only as
    /// sequences and others only as global ids within one array.
    pub fn validate(&self, tasks: &[Task]) -> Result<()> {
        let sequences: HashSet<i64> = tasks.iter().map(|t| t.project_sequence).collect();
        let globals: HashSet<i64> = tasks.iter().filter_map(|t| t.global_id).collect();

        for task in tasks {
            let Some(deps) = task.depends_on() else {
                continue;
            };
            let ids = &deps.task_ids;
            let seq_only = ids
                .iter()
                .any(|id| sequences.contains(id) && !globals.contains(id));
            let global_only = ids
                .iter()
                .any(|id| globals.contains(id) && !sequences.contains(id));
            if seq_only && global_only {
                return Err(GraphError::MixedAddressing {
                    sequence: task.project_sequence,
                    task_ids: ids.clone(),
                });
            }
        }

        Ok(())
    }

    fn check_acyclic(&self) -> Result<()> {
        toposort(&self.graph, None)
            .map(|_| ())
            .map_err(|cycle| GraphError::CircularDependency {
                sequences: vec![self.graph[cycle.node_id()]],
            })
    }

    /// Batched stage plan: repeatedly peel off every task whose dependencies
    /// are already peeled. Stage N+1 strictly follows stage N.
    pub fn stage_plan(&self) -> Result<StagePlan> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| GraphError::CircularDependency {
            sequences: vec![self.graph[cycle.node_id()]],
        })?;

        let mut stages = Vec::new();
        let mut satisfied: HashSet<NodeIndex> = HashSet::new();
        let mut remaining: Vec<NodeIndex> = sorted;

        while !remaining.is_empty() {
            let mut stage_nodes = Vec::new();
            for &node in &remaining {
                let deps_met = self
                    .graph
                    .neighbors_directed(node, Direction::Incoming)
                    .all(|dep| satisfied.contains(&dep));
                if deps_met {
                    stage_nodes.push(node);
                }
            }

            if stage_nodes.is_empty() {
                // Unreachable after a successful toposort.
                break;
            }

            remaining.retain(|node| !stage_nodes.contains(node));
            let mut stage: Vec<i64> = stage_nodes
                .iter()
                .map(|&node| self.graph[node])
                .collect();
            stage.sort_unstable();
            satisfied.extend(stage_nodes);
            stages.push(stage);
        }

        Ok(StagePlan {
            stages,
            total_tasks: self.node_for.len(),
        })
    }

    /// Sequence numbers of the tasks that directly depend on `sequence`.
    pub fn dependents_of(&self, sequence: i64) -> Vec<i64> {
        match self.node_for.get(&sequence) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .map(|n| self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }
}

impl StagePlan {
    pub fn max_parallelism(&self) -> usize {
        self.stages.iter().map(|s| s.len()).max().unwrap_or(0)
    }

    pub fn stage_of(&self, sequence: i64) -> Option<usize> {
        self.stages
            .iter()
            .position(|stage| stage.contains(&sequence))
    }
}

/// Every sequence number a task's trigger references, whichever form the
/// trigger takes.
fn referenced_sequences(task: &Task, project_tasks: &[Task]) -> Result<Vec<i64>> {
    let Some(deps) = task.depends_on() else {
        return Ok(Vec::new());
    };

    if let Some(ref expression) = deps.expression {
        let expr = DependencyExpr::parse(expression).map_err(|source| GraphError::Expression {
            sequence: task.project_sequence,
            source,
        })?;
        return Ok(expr.referenced_sequences());
    }

    let sequences = match detect_scheme(project_tasks, &deps.task_ids) {
        AddressScheme::ProjectSequence(ids) => ids,
        AddressScheme::Global(ids) => ids
            .iter()
            .filter_map(|id| {
                project_tasks
                    .iter()
                    .find(|t| t.global_id == Some(*id))
                    .map(|t| t.project_sequence)
            })
            .collect(),
    };
    Ok(sequences)
}
