// ABOUTME: Macro resolution for task instruction text
// ABOUTME: Rewrites {{...}} tokens into escaped literals; unresolvable tokens stay verbatim

use std::sync::Arc;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::codec::ResultCodec;
use crate::graph::ordered_dependencies;
use crate::model::{ProjectInfo, Task, TaskStatus};

fn macro_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
            .expect("macro token pattern is valid")
    })
}

/// Outcome of resolving one instruction text: the rewritten text plus every
/// token that stayed literal. Callers key "runnable" off the structured list
/// rather than scanning the text.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInstruction {
    pub text: String,
    pub unresolved: Vec<UnresolvedMacro>,
}

impl ResolvedInstruction {
    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedMacro {
    /// The token exactly as it appears in the text, braces included.
    pub token: String,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnresolvedReason {
    /// No task with this sequence number exists in the project.
    UnknownTask { sequence: i64 },
    /// The referenced task has not reached `done` (or has no stored result).
    TaskNotDone { sequence: i64 },
    /// The task declares no dependencies, so positional macros have no target.
    NoDependencies,
    /// `{{prev.N}}` indexes past the dependency list.
    OutOfRange { index: usize },
    /// No dependency has completed yet.
    NoCompletedDependencies,
    /// The stored result could not be serialized for an `.output` macro.
    Unserializable,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::UnknownTask { sequence } => {
                write!(f, "no task #{} in project", sequence)
            }
            UnresolvedReason::TaskNotDone { sequence } => {
                write!(f, "task #{} has not completed", sequence)
            }
            UnresolvedReason::NoDependencies => write!(f, "task has no dependencies"),
            UnresolvedReason::OutOfRange { index } => {
                write!(f, "dependency index {} out of range", index)
            }
            UnresolvedReason::NoCompletedDependencies => {
                write!(f, "no dependency has completed")
            }
            UnresolvedReason::Unserializable => write!(f, "stored result is not serializable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MacroToken {
    Prev(usize),
    TaskContent(i64),
    TaskSummary(i64),
    TaskOutput(i64),
    ProjectName,
    ProjectDescription,
    ProjectBaseDevFolder,
    Date,
    DateTime,
    AllResults,
    AllResultsSummary,
}

fn parse_token(inner: &str) -> Option<MacroToken> {
    match inner {
        "prev" => return Some(MacroToken::Prev(0)),
        "date" => return Some(MacroToken::Date),
        "datetime" => return Some(MacroToken::DateTime),
        "all_results" => return Some(MacroToken::AllResults),
        "all_results.summary" => return Some(MacroToken::AllResultsSummary),
        "project.name" => return Some(MacroToken::ProjectName),
        "project.description" => return Some(MacroToken::ProjectDescription),
        "project.baseDevFolder" => return Some(MacroToken::ProjectBaseDevFolder),
        _ => {}
    }

    if let Some(rest) = inner.strip_prefix("prev.") {
        return rest.parse().ok().map(MacroToken::Prev);
    }

    if let Some(rest) = inner.strip_prefix("task.") {
        if let Some(sequence) = rest.strip_suffix(".summary") {
            return sequence.parse().ok().map(MacroToken::TaskSummary);
        }
        if let Some(sequence) = rest.strip_suffix(".output") {
            return sequence.parse().ok().map(MacroToken::TaskOutput);
        }
        return rest.parse().ok().map(MacroToken::TaskContent);
    }

    None
}

/// Rewrites instruction text against a project snapshot.
///
/// Content drawn from completed tasks is escaped and double-quoted before
/// splicing (the surrounding text is re-interpreted as a script body or
/// prompt); project metadata and timestamps are escaped but left bare.
pub struct MacroResolver {
    clock: Arc<dyn Clock>,
    date_format: String,
    datetime_format: String,
}

impl MacroResolver {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            date_format: "%Y-%m-%d".to_string(),
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the `{{date}}` / `{{datetime}}` formats; the embedding shell
    /// passes locale-appropriate strings.
    pub fn with_formats(
        mut self,
        date_format: impl Into<String>,
        datetime_format: impl Into<String>,
    ) -> Self {
        self.date_format = date_format.into();
        self.datetime_format = datetime_format.into();
        self
    }

    pub fn has_macros(text: &str) -> bool {
        macro_regex().is_match(text)
    }

    /// Resolve a task's instruction text.
    pub fn resolve(
        &self,
        task: &Task,
        project_tasks: &[Task],
        project: Option<&ProjectInfo>,
    ) -> ResolvedInstruction {
        self.resolve_text(&task.instructions, task, project_tasks, project)
    }

    /// Resolve arbitrary text in the context of `task`.
    pub fn resolve_text(
        &self,
        text: &str,
        task: &Task,
        project_tasks: &[Task],
        project: Option<&ProjectInfo>,
    ) -> ResolvedInstruction {
        let deps = ordered_dependencies(task, project_tasks);
        let mut unresolved = Vec::new();

        let resolved = macro_regex().replace_all(text, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

            let Some(token) = parse_token(inner) else {
                // Not part of the macro grammar: pass through untouched.
                return whole.to_string();
            };

            match self.resolve_token(token, project_tasks, project, &deps) {
                Ok(replacement) => replacement,
                Err(reason) => {
                    debug!(token = whole, %reason, "macro left unresolved");
                    unresolved.push(UnresolvedMacro {
                        token: whole.to_string(),
                        reason,
                    });
                    whole.to_string()
                }
            }
        });

        ResolvedInstruction {
            text: resolved.into_owned(),
            unresolved,
        }
    }

    fn resolve_token(
        &self,
        token: MacroToken,
        project_tasks: &[Task],
        project: Option<&ProjectInfo>,
        deps: &[&Task],
    ) -> std::result::Result<String, UnresolvedReason> {
        match token {
            MacroToken::Prev(n) => {
                if deps.is_empty() {
                    return Err(UnresolvedReason::NoDependencies);
                }
                // prev.0 is the highest-sequence (last-listed) dependency,
                // prev.1 the one before it, and so on.
                let index = deps
                    .len()
                    .checked_sub(1 + n)
                    .ok_or(UnresolvedReason::OutOfRange { index: n })?;
                let content = completed_content(deps[index])?;
                Ok(ResultCodec::quoted_literal(&content))
            }
            MacroToken::TaskContent(sequence) => {
                let task = find_task(project_tasks, sequence)?;
                let content = completed_content(task)?;
                Ok(ResultCodec::quoted_literal(&content))
            }
            MacroToken::TaskSummary(sequence) => {
                let task = find_task(project_tasks, sequence)?;
                completed_result(task)
                    .map(|result| ResultCodec::quoted_literal(&ResultCodec::summary(result)))
            }
            MacroToken::TaskOutput(sequence) => {
                let task = find_task(project_tasks, sequence)?;
                let result = completed_result(task)?;
                let serialized = ResultCodec::serialized(result)
                    .map_err(|_| UnresolvedReason::Unserializable)?;
                Ok(ResultCodec::quoted_literal(&serialized))
            }
            MacroToken::ProjectName => Ok(ResultCodec::escape(
                project.map(|p| p.name.as_str()).unwrap_or(""),
            )),
            MacroToken::ProjectDescription => Ok(ResultCodec::escape(
                project
                    .and_then(|p| p.description.as_deref())
                    .unwrap_or(""),
            )),
            MacroToken::ProjectBaseDevFolder => Ok(ResultCodec::escape(
                project
                    .and_then(|p| p.base_dev_folder.as_deref())
                    .unwrap_or(""),
            )),
            MacroToken::Date => Ok(ResultCodec::escape(
                &self.clock.now().format(&self.date_format).to_string(),
            )),
            MacroToken::DateTime => Ok(ResultCodec::escape(
                &self.clock.now().format(&self.datetime_format).to_string(),
            )),
            MacroToken::AllResults => {
                let contents = completed_dependency_contents(deps, ResultCodec::content);
                if contents.is_empty() {
                    return Err(UnresolvedReason::NoCompletedDependencies);
                }
                Ok(ResultCodec::quoted_literal(&contents.join("\n\n")))
            }
            MacroToken::AllResultsSummary => {
                let summaries = completed_dependency_contents(deps, ResultCodec::summary);
                if summaries.is_empty() {
                    return Err(UnresolvedReason::NoCompletedDependencies);
                }
                Ok(ResultCodec::quoted_literal(&summaries.join("\n\n")))
            }
        }
    }
}

impl Default for MacroResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn find_task(project_tasks: &[Task], sequence: i64) -> Result<&Task, UnresolvedReason> {
    project_tasks
        .iter()
        .find(|t| t.project_sequence == sequence)
        .ok_or(UnresolvedReason::UnknownTask { sequence })
}

fn completed_result(task: &Task) -> Result<&crate::model::ExecutionResult, UnresolvedReason> {
    if task.status != TaskStatus::Done {
        return Err(UnresolvedReason::TaskNotDone {
            sequence: task.project_sequence,
        });
    }
    task.execution_result
        .as_ref()
        .ok_or(UnresolvedReason::TaskNotDone {
            sequence: task.project_sequence,
        })
}

fn completed_content(task: &Task) -> Result<String, UnresolvedReason> {
    completed_result(task).map(ResultCodec::content)
}

fn completed_dependency_contents<F>(deps: &[&Task], extract: F) -> Vec<String>
where
    F: Fn(&crate::model::ExecutionResult) -> String,
{
    deps.iter()
        .filter(|t| t.status == TaskStatus::Done)
        .filter_map(|t| t.execution_result.as_ref().map(&extract))
        .collect()
}
