//! Query/Filter Layer
//!
//! Listing, relationship lookups and next-task selection. Everything here is
//! read-only and takes no locks; a listing may observe a tree mid-update.

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use crate::error::Result;
use crate::model::{Priority, Task, TaskStatus};
use crate::sequence;
use crate::store::TaskStore;

/// Which tasks a listing returns and how much of each.
///
/// By default completed tasks, overview documents and body text are left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub phase: Option<String>,
    pub subdirectory: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub task_type: Option<String>,
    pub tag: Option<String>,
    pub assigned_to: Option<String>,
    pub parent: Option<String>,
    pub depends_on: Option<String>,
    pub include_completed: bool,
    pub include_content: bool,
    pub include_overviews: bool,
}

impl TaskFilter {
    pub fn in_phase(phase: impl Into<String>) -> Self {
        Self {
            phase: Some(phase.into()),
            ..Self::default()
        }
    }

    /// Everything, body text included
    pub fn everything() -> Self {
        Self {
            include_completed: true,
            include_content: true,
            include_overviews: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if task.is_overview && !self.include_overviews {
            return false;
        }
        // an explicit status filter overrides the completed default
        match self.status {
            Some(status) if task.status != status => return false,
            None if task.is_completed() && !self.include_completed => return false,
            _ => {}
        }
        if !matches_opt(&self.phase, &task.phase)
            || !matches_opt(&self.subdirectory, &task.subdirectory)
            || !matches_opt(&self.assigned_to, &task.assigned_to)
            || !matches_opt(&self.parent, &task.relations.parent_task)
        {
            return false;
        }
        if self.priority.is_some_and(|priority| task.priority != priority) {
            return false;
        }
        if self
            .task_type
            .as_deref()
            .is_some_and(|task_type| !task.task_type.eq_ignore_ascii_case(task_type))
        {
            return false;
        }
        if self
            .tag
            .as_deref()
            .is_some_and(|tag| !task.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
        {
            return false;
        }
        if self
            .depends_on
            .as_deref()
            .is_some_and(|dependency| !task.relations.depends_on.iter().any(|d| d == dependency))
        {
            return false;
        }
        true
    }
}

fn matches_opt(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        Some(wanted) => actual.as_deref() == Some(wanted.as_str()),
        None => true,
    }
}

/// Cut `content` to at most `max_chars` characters
pub fn truncate_content(content: &mut String, max_chars: usize) {
    if let Some((index, _)) = content.char_indices().nth(max_chars) {
        content.truncate(index);
    }
}

impl TaskStore {
    /// Tasks matching `filter`, in path order
    pub fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let dir = match filter.phase.as_deref() {
            Some(phase) => self.storage().phase_dir(phase),
            None => self.storage().root().to_path_buf(),
        };
        let max = self.config().max_context_length;
        let tasks = self
            .load_dir(&dir)?
            .into_iter()
            .map(|located| located.task)
            .filter(|task| filter.matches(task))
            .map(|mut task| {
                if filter.include_content {
                    truncate_content(&mut task.content, max);
                } else {
                    task.content.clear();
                }
                task
            })
            .collect();
        Ok(tasks)
    }

    /// Tasks whose `dependsOn` names `id`
    pub fn dependents_of(&self, id: &str) -> Result<Vec<Task>> {
        let filter = TaskFilter {
            depends_on: Some(id.to_string()),
            include_completed: true,
            ..TaskFilter::default()
        };
        self.list(&filter)
    }

    /// Tasks named in `id`'s `dependsOn`; missing ones are logged and skipped
    pub fn dependencies_of(&self, id: &str) -> Result<Vec<Task>> {
        let task = self.get(id, None)?;
        let mut dependencies = Vec::new();
        for dependency in &task.relations.depends_on {
            match self.get(dependency, None) {
                Ok(found) => dependencies.push(found),
                Err(err) if err.is_not_found() => {
                    tracing::warn!(id, dependency = %dependency, "dependency does not exist")
                }
                Err(err) => return Err(err),
            }
        }
        Ok(dependencies)
    }

    /// Other children of `id`'s parent, or other parentless tasks in the
    /// same directory, in sequence order
    pub fn siblings_of(&self, id: &str) -> Result<Vec<Task>> {
        let task = self.get(id, None)?;
        let mut siblings: Vec<Task> = self
            .load_all()?
            .into_iter()
            .map(|located| located.task)
            .filter(|other| {
                other.id != task.id
                    && !other.is_overview
                    && other.relations.parent_task == task.relations.parent_task
                    && (task.relations.parent_task.is_some() || other.location() == task.location())
            })
            .collect();
        siblings.sort_by(|a, b| {
            sequence::compare(a.sequence.as_deref(), b.sequence.as_deref())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(siblings)
    }

    /// The task to work on next, optionally within one phase.
    ///
    /// Candidates are open, unblocked, non-overview tasks whose dependencies
    /// are all done (a missing dependency counts as done). In-progress work
    /// comes first, then priority, phase order, sequence, age and id.
    pub fn find_next_task(&self, phase: Option<&str>) -> Result<Option<Task>> {
        let all: Vec<Task> = self
            .load_all()?
            .into_iter()
            .map(|located| located.task)
            .collect();
        let completed: HashMap<&str, bool> = all
            .iter()
            .filter(|task| !task.is_overview)
            .map(|task| (task.id.as_str(), task.is_completed()))
            .collect();
        let rank = self.phase_rank()?;

        let ready = |task: &Task| {
            task.relations.depends_on.iter().all(|dependency| {
                match completed.get(dependency.as_str()) {
                    Some(done) => *done,
                    None => {
                        tracing::warn!(id = %task.id, dependency = %dependency, "treating missing dependency as done");
                        true
                    }
                }
            })
        };

        let mut candidates: Vec<&Task> = all
            .iter()
            .filter(|task| {
                !task.is_overview
                    && !task.is_completed()
                    && task.status != TaskStatus::Blocked
                    && phase.map_or(true, |phase| task.phase.as_deref() == Some(phase))
            })
            .filter(|task| ready(task))
            .collect();

        let phase_rank = |task: &Task| {
            task.phase
                .as_deref()
                .and_then(|phase| rank.get(phase).copied())
                .unwrap_or(usize::MAX)
        };
        candidates.sort_by(|a, b| {
            (a.status != TaskStatus::InProgress)
                .cmp(&(b.status != TaskStatus::InProgress))
                .then_with(|| Reverse(a.priority).cmp(&Reverse(b.priority)))
                .then_with(|| phase_rank(a).cmp(&phase_rank(b)))
                .then_with(|| sequence::compare(a.sequence.as_deref(), b.sequence.as_deref()))
                .then_with(|| compare_created(a, b))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(candidates.first().map(|task| {
            let mut task = (*task).clone();
            truncate_content(&mut task.content, self.config().max_context_length);
            task
        }))
    }
}

// undated tasks sort after dated ones
fn compare_created(a: &Task, b: &Task) -> Ordering {
    match (a.created_date, b.created_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
