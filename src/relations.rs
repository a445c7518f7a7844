//! Relationship Graph Maintainer
//!
//! Keeps the stored inverse edges in step with a task's own fields:
//!
//! | field on A          | inverse kept on B          |
//! |---------------------|----------------------------|
//! | `parentTask = B`    | `A ∈ B.subtasks`           |
//! | `subtasks ∋ B`      | `B.parentTask = A`         |
//! | `previousTask = B`  | `B.nextTask = A`           |
//! | `nextTask = B`      | `B.previousTask = A`       |
//!
//! `dependsOn` has no stored inverse; dependents are found by query.
//!
//! Neighbour writes are best-effort: a failure never undoes the primary
//! write, it becomes a [`RelationshipWarning`] on the returned [`Outcome`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Relationships, Task};
use crate::outcome::{Outcome, RelationshipWarning, WarningKind};
use crate::sequence::next_sequence;
use crate::store::TaskStore;

/// Applies inverse-edge updates for one store operation and collects the
/// warnings they produce. Callers hold the task locks for every id it touches.
pub struct RelationshipMaintainer<'a> {
    store: &'a TaskStore,
    warnings: Vec<RelationshipWarning>,
}

impl<'a> RelationshipMaintainer<'a> {
    pub fn new(store: &'a TaskStore) -> Self {
        Self {
            store,
            warnings: Vec::new(),
        }
    }

    pub fn finish<T>(self, data: T) -> Outcome<T> {
        Outcome::with_warnings(data, self.warnings)
    }

    /// Ids whose documents `propagate(old, new)` may rewrite.
    ///
    /// Displaced neighbours (the old `nextTask` of a new `previousTask`, the
    /// old parent of a newly adopted subtask) are read from disk, so the
    /// answer can change until the returned ids are locked.
    pub fn touched_ids(
        store: &TaskStore,
        old: Option<&Relationships>,
        new: &Relationships,
    ) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        if let Some(old) = old {
            ids.extend(old.parent_task.iter().cloned());
            ids.extend(old.previous_task.iter().cloned());
            ids.extend(old.next_task.iter().cloned());
            ids.extend(old.subtasks.iter().cloned());
        }
        ids.extend(new.parent_task.iter().cloned());
        if let Some(previous) = &new.previous_task {
            ids.insert(previous.clone());
            if let Some(displaced) = peek(store, previous).and_then(|rel| rel.next_task) {
                ids.insert(displaced);
            }
        }
        if let Some(next) = &new.next_task {
            ids.insert(next.clone());
            if let Some(displaced) = peek(store, next).and_then(|rel| rel.previous_task) {
                ids.insert(displaced);
            }
        }
        for child in &new.subtasks {
            ids.insert(child.clone());
            if let Some(parent) = peek(store, child).and_then(|rel| rel.parent_task) {
                ids.insert(parent);
            }
        }
        ids
    }

    /// Ids whose documents `sever(task)` may rewrite, dependents included
    pub fn severed_ids(store: &TaskStore, task: &Task) -> Result<BTreeSet<String>> {
        let relations = &task.relations;
        let mut ids: BTreeSet<String> = relations
            .parent_task
            .iter()
            .chain(relations.previous_task.iter())
            .chain(relations.next_task.iter())
            .chain(relations.subtasks.iter())
            .cloned()
            .collect();
        ids.extend(
            store
                .dependents_of(&task.id)?
                .into_iter()
                .map(|dependent| dependent.id),
        );
        Ok(ids)
    }

    // =========================================================================
    // Propagation
    // =========================================================================

    /// Push the inverse of every edge in `new` and unlink edges that `old`
    /// had and `new` dropped. `old` is `None` for a freshly created task.
    pub fn propagate(&mut self, old: Option<&Task>, new: &Task) {
        let empty = Relationships::default();
        let before = old.map(|task| &task.relations).unwrap_or(&empty);
        let after = &new.relations;
        let id = new.id.as_str();

        self.propagate_parent(id, before, after);
        self.propagate_subtasks(id, before, after);
        self.propagate_previous(id, before, after);
        self.propagate_next(id, before, after);
    }

    fn propagate_parent(&mut self, id: &str, before: &Relationships, after: &Relationships) {
        if before.parent_task != after.parent_task {
            if let Some(old_parent) = before.parent_task.as_deref() {
                self.unlink(old_parent, id, |parent| {
                    remove_id(&mut parent.relations.subtasks, id)
                });
            }
        }
        if let Some(parent) = after.parent_task.as_deref() {
            self.link(parent, id, |parent| push_unique(&mut parent.relations.subtasks, id));
        }
    }

    fn propagate_subtasks(&mut self, id: &str, before: &Relationships, after: &Relationships) {
        for removed in before
            .subtasks
            .iter()
            .filter(|child| !after.subtasks.contains(child))
        {
            self.unlink(removed, id, |child| {
                clear_if(&mut child.relations.parent_task, id)
            });
        }

        if after.subtasks.is_empty() {
            return;
        }
        // tokens held by children that already sit under `id`
        let mut taken: HashSet<String> = after
            .subtasks
            .iter()
            .filter_map(|child| peek_task(self.store, child))
            .filter(|task| task.relations.parent_task.as_deref() == Some(id))
            .filter_map(|task| task.sequence)
            .collect();

        for child in &after.subtasks {
            let mut displaced = None;
            self.link(child, id, |task| {
                if task.relations.parent_task.as_deref() == Some(id) {
                    return false;
                }
                displaced = task.relations.parent_task.replace(id.to_string());
                let token = match task.sequence.take() {
                    Some(token) if !taken.contains(&token) => token,
                    _ => next_sequence(taken.len(), taken.iter().map(String::as_str)),
                };
                taken.insert(token.clone());
                task.sequence = Some(token);
                true
            });
            if let Some(previous_parent) = displaced {
                self.unlink(&previous_parent, child, |parent| {
                    remove_id(&mut parent.relations.subtasks, child)
                });
            }
        }
    }

    fn propagate_previous(&mut self, id: &str, before: &Relationships, after: &Relationships) {
        if before.previous_task != after.previous_task {
            if let Some(old_previous) = before.previous_task.as_deref() {
                self.unlink(old_previous, id, |task| {
                    clear_if(&mut task.relations.next_task, id)
                });
            }
        }
        if let Some(previous) = after.previous_task.as_deref() {
            let mut displaced = None;
            self.link(previous, id, |task| {
                if task.relations.next_task.as_deref() == Some(id) {
                    return false;
                }
                displaced = task.relations.next_task.replace(id.to_string());
                true
            });
            // previous's old successor no longer follows it
            if let Some(displaced) = displaced {
                self.unlink(&displaced, previous, |task| {
                    clear_if(&mut task.relations.previous_task, previous)
                });
            }
        }
    }

    fn propagate_next(&mut self, id: &str, before: &Relationships, after: &Relationships) {
        if before.next_task != after.next_task {
            if let Some(old_next) = before.next_task.as_deref() {
                self.unlink(old_next, id, |task| {
                    clear_if(&mut task.relations.previous_task, id)
                });
            }
        }
        if let Some(next) = after.next_task.as_deref() {
            let mut displaced = None;
            self.link(next, id, |task| {
                if task.relations.previous_task.as_deref() == Some(id) {
                    return false;
                }
                displaced = task.relations.previous_task.replace(id.to_string());
                true
            });
            if let Some(displaced) = displaced {
                self.unlink(&displaced, next, |task| {
                    clear_if(&mut task.relations.next_task, next)
                });
            }
        }
    }

    /// Remove every edge that points at `task` before it is deleted.
    ///
    /// The sequential chain is bridged across the gap, subtasks lose their
    /// parent, and dependents drop the dependency. Each orphaned subtask and
    /// each removed dependency is reported as a warning.
    pub fn sever(&mut self, task: &Task) {
        let id = task.id.as_str();
        let relations = &task.relations;

        if let Some(parent) = relations.parent_task.as_deref() {
            self.unlink(parent, id, |parent| {
                remove_id(&mut parent.relations.subtasks, id)
            });
        }

        let previous = relations.previous_task.as_deref();
        let next = relations.next_task.as_deref();
        if let Some(previous_id) = previous {
            self.unlink(previous_id, id, |task| {
                if task.relations.next_task.as_deref() != Some(id) {
                    return false;
                }
                task.relations.next_task = next.map(str::to_string);
                true
            });
        }
        if let Some(next_id) = next {
            self.unlink(next_id, id, |task| {
                if task.relations.previous_task.as_deref() != Some(id) {
                    return false;
                }
                task.relations.previous_task = previous.map(str::to_string);
                true
            });
        }

        for child in &relations.subtasks {
            let mut orphaned = false;
            self.unlink(child, id, |task| {
                orphaned = clear_if(&mut task.relations.parent_task, id);
                orphaned
            });
            if orphaned {
                self.warnings.push(RelationshipWarning::new(
                    WarningKind::OrphanedSubtasks,
                    id,
                    Some(child),
                    format!("subtask {child} of deleted task {id} has no parent now"),
                ));
            }
        }

        match self.store.dependents_of(id) {
            Ok(dependents) => {
                for dependent in dependents {
                    let mut removed = false;
                    self.unlink(&dependent.id, id, |task| {
                        removed = remove_id(&mut task.relations.depends_on, id);
                        removed
                    });
                    if removed {
                        self.warnings.push(RelationshipWarning::new(
                            WarningKind::DanglingReference,
                            id,
                            Some(&dependent.id),
                            format!("removed dependency on deleted task {id} from {}", dependent.id),
                        ));
                    }
                }
            }
            Err(err) => self.failed(id, id, &err),
        }
    }

    /// Warn about `dependsOn` entries that name no existing task
    pub fn check_dependencies(&mut self, task: &Task) {
        for dependency in &task.relations.depends_on {
            match self.store.locate(dependency, None) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => self.missing(&task.id, dependency),
                Err(err) => self.failed(&task.id, dependency, &err),
            }
        }
    }

    // =========================================================================
    // Neighbour edits
    // =========================================================================

    /// Edit a neighbour that must exist
    fn link<F: FnOnce(&mut Task) -> bool>(&mut self, neighbour: &str, owner: &str, edit: F) {
        self.edit(neighbour, owner, true, edit);
    }

    /// Edit a neighbour if it still exists
    fn unlink<F: FnOnce(&mut Task) -> bool>(&mut self, neighbour: &str, owner: &str, edit: F) {
        self.edit(neighbour, owner, false, edit);
    }

    /// Load `neighbour`, apply `edit`, and write it back if `edit` changed it
    fn edit<F>(&mut self, neighbour: &str, owner: &str, required: bool, edit: F)
    where
        F: FnOnce(&mut Task) -> bool,
    {
        let mut located = match self.store.locate(neighbour, None) {
            Ok(located) => located,
            Err(err) if err.is_not_found() => {
                if required {
                    self.missing(owner, neighbour);
                }
                return;
            }
            Err(err) => {
                self.failed(owner, neighbour, &err);
                return;
            }
        };
        if !edit(&mut located.task) {
            return;
        }
        located.task.touch();
        match self
            .store
            .storage()
            .write_task(&located.path, &located.task)
        {
            Ok(()) => tracing::debug!(task = owner, related = neighbour, "updated inverse edge"),
            Err(err) => self.failed(owner, neighbour, &err),
        }
    }

    fn missing(&mut self, owner: &str, related: &str) {
        tracing::warn!(task = owner, related, "relationship points at a missing task");
        self.warnings.push(RelationshipWarning::new(
            WarningKind::MissingReference,
            owner,
            Some(related),
            format!("{owner} references missing task {related}"),
        ));
    }

    fn failed(&mut self, owner: &str, related: &str, err: &Error) {
        tracing::warn!(task = owner, related, error = %err, "inverse edge update failed");
        self.warnings.push(RelationshipWarning::new(
            WarningKind::InverseUpdateFailed,
            owner,
            Some(related),
            format!("could not update {related}: {err}"),
        ));
    }

    // =========================================================================
    // Cycle checks
    // =========================================================================

    /// Reject `relations` for task `id` if they would close a cycle through
    /// `parentTask` (including adoption via `subtasks`) or `dependsOn`.
    pub fn check_cycles(store: &TaskStore, id: &str, relations: &Relationships) -> Result<()> {
        if relations.parent_task.is_none()
            && relations.depends_on.is_empty()
            && relations.subtasks.is_empty()
        {
            return Ok(());
        }
        let graph = RelationGraph::load(store)?.with_override(id, relations);

        let ancestors = graph.ancestors(id);
        if let Some(position) = ancestors.iter().position(|ancestor| ancestor == id) {
            let mut path = vec![id.to_string()];
            path.extend(ancestors[..=position].iter().cloned());
            return Err(Error::CycleDetected {
                kind: "parentTask",
                path,
            });
        }

        for child in &relations.subtasks {
            if let Some(position) = ancestors.iter().position(|ancestor| ancestor == child) {
                let mut path = vec![child.clone(), id.to_string()];
                path.extend(ancestors[..=position].iter().cloned());
                return Err(Error::CycleDetected {
                    kind: "parentTask",
                    path,
                });
            }
        }

        for dependency in &relations.depends_on {
            let mut path = vec![id.to_string()];
            let mut visited = HashSet::new();
            if graph.dependency_path(dependency, id, &mut visited, &mut path) {
                path.push(id.to_string());
                return Err(Error::CycleDetected {
                    kind: "dependsOn",
                    path,
                });
            }
        }
        Ok(())
    }
}

fn peek(store: &TaskStore, id: &str) -> Option<Relationships> {
    peek_task(store, id).map(|task| task.relations)
}

fn peek_task(store: &TaskStore, id: &str) -> Option<Task> {
    store.locate(id, None).ok().map(|located| located.task)
}

fn push_unique(ids: &mut Vec<String>, id: &str) -> bool {
    if ids.iter().any(|existing| existing == id) {
        return false;
    }
    ids.push(id.to_string());
    true
}

fn remove_id(ids: &mut Vec<String>, id: &str) -> bool {
    let before = ids.len();
    ids.retain(|existing| existing != id);
    ids.len() != before
}

fn clear_if(slot: &mut Option<String>, id: &str) -> bool {
    if slot.as_deref() == Some(id) {
        *slot = None;
        true
    } else {
        false
    }
}

/// Relationship fields of every task, keyed by id
struct RelationGraph {
    edges: HashMap<String, Relationships>,
}

impl RelationGraph {
    fn load(store: &TaskStore) -> Result<Self> {
        let edges = store
            .load_all()?
            .into_iter()
            .filter(|located| !located.task.is_overview)
            .map(|located| (located.task.id, located.task.relations))
            .collect();
        Ok(Self { edges })
    }

    fn with_override(mut self, id: &str, relations: &Relationships) -> Self {
        self.edges.insert(id.to_string(), relations.clone());
        self
    }

    fn parent_of(&self, id: &str) -> Option<&str> {
        self.edges.get(id)?.parent_task.as_deref()
    }

    /// Parent chain above `id`, stopping at the first repeat
    fn ancestors(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            chain.push(parent.to_string());
            if !seen.insert(parent) {
                break;
            }
            current = parent;
        }
        chain
    }

    /// Depth-first search for `target` along `dependsOn`, recording the path
    fn dependency_path(
        &self,
        from: &str,
        target: &str,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        if from == target {
            return true;
        }
        if !visited.insert(from.to_string()) {
            return false;
        }
        path.push(from.to_string());
        if let Some(relations) = self.edges.get(from) {
            for dependency in &relations.depends_on {
                if self.dependency_path(dependency, target, visited, path) {
                    return true;
                }
            }
        }
        path.pop();
        false
    }
}

// =============================================================================
// Audit
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateId,
    MissingReference,
    MissingSubtaskEntry,
    StaleSubtaskEntry,
    BrokenChain,
    DuplicateSequence,
    LocationMismatch,
    Cycle,
}

/// One consistency violation found by [`TaskStore::audit`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditIssue {
    pub kind: IssueKind,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    pub message: String,
}

impl AuditIssue {
    fn new(
        kind: IssueKind,
        task_id: &str,
        related_id: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            task_id: task_id.to_string(),
            related_id: related_id.map(str::to_string),
            message: message.into(),
        }
    }
}

impl TaskStore {
    /// Read-only consistency check of the whole tree
    pub fn audit(&self) -> Result<Vec<AuditIssue>> {
        let all = self.load_all()?;
        let mut issues = Vec::new();

        let mut by_id: BTreeMap<&str, Vec<&crate::store::Located>> = BTreeMap::new();
        for located in all.iter().filter(|located| !located.task.is_overview) {
            by_id.entry(located.task.id.as_str()).or_default().push(located);
        }

        for (id, copies) in &by_id {
            if copies.len() > 1 {
                let paths: Vec<String> = copies
                    .iter()
                    .map(|located| self.storage().relative(&located.path).display().to_string())
                    .collect();
                issues.push(AuditIssue::new(
                    IssueKind::DuplicateId,
                    id,
                    None,
                    format!("id {id} is stored {} times: {}", copies.len(), paths.join(", ")),
                ));
            }
        }

        let lookup = |id: &str| by_id.get(id).and_then(|copies| copies.first()).map(|l| &l.task);

        for located in &all {
            let task = &located.task;
            let id = task.id.as_str();

            if let Some(expected) = self.storage().location_of(&located.path) {
                if expected != task.location() {
                    issues.push(AuditIssue::new(
                        IssueKind::LocationMismatch,
                        id,
                        None,
                        format!(
                            "{id} is stored at {} but its metadata says phase={:?} subdirectory={:?}",
                            self.storage().relative(&located.path).display(),
                            task.phase,
                            task.subdirectory
                        ),
                    ));
                }
            }
            if task.is_overview {
                continue;
            }

            let relations = &task.relations;
            if let Some(parent_id) = relations.parent_task.as_deref() {
                match lookup(parent_id) {
                    None => issues.push(missing_issue(id, parent_id, "parentTask")),
                    Some(parent) if !parent.relations.subtasks.iter().any(|c| c == id) => {
                        issues.push(AuditIssue::new(
                            IssueKind::MissingSubtaskEntry,
                            id,
                            Some(parent_id),
                            format!("{parent_id}.subtasks does not list {id}"),
                        ))
                    }
                    Some(_) => {}
                }
            }
            for child_id in &relations.subtasks {
                match lookup(child_id) {
                    None => issues.push(missing_issue(id, child_id, "subtasks")),
                    Some(child) if child.relations.parent_task.as_deref() != Some(id) => {
                        issues.push(AuditIssue::new(
                            IssueKind::StaleSubtaskEntry,
                            id,
                            Some(child_id),
                            format!("{id}.subtasks lists {child_id} whose parentTask is not {id}"),
                        ))
                    }
                    Some(_) => {}
                }
            }
            if let Some(previous_id) = relations.previous_task.as_deref() {
                match lookup(previous_id) {
                    None => issues.push(missing_issue(id, previous_id, "previousTask")),
                    Some(previous) if previous.relations.next_task.as_deref() != Some(id) => {
                        issues.push(AuditIssue::new(
                            IssueKind::BrokenChain,
                            id,
                            Some(previous_id),
                            format!("{id}.previousTask is {previous_id} but {previous_id}.nextTask is not {id}"),
                        ))
                    }
                    Some(_) => {}
                }
            }
            if let Some(next_id) = relations.next_task.as_deref() {
                match lookup(next_id) {
                    None => issues.push(missing_issue(id, next_id, "nextTask")),
                    Some(next) if next.relations.previous_task.as_deref() != Some(id) => {
                        issues.push(AuditIssue::new(
                            IssueKind::BrokenChain,
                            id,
                            Some(next_id),
                            format!("{id}.nextTask is {next_id} but {next_id}.previousTask is not {id}"),
                        ))
                    }
                    Some(_) => {}
                }
            }
            for dependency in &relations.depends_on {
                if lookup(dependency).is_none() {
                    issues.push(missing_issue(id, dependency, "dependsOn"));
                }
            }
        }

        issues.extend(duplicate_sequences(&by_id));
        issues.extend(cycles(&by_id));
        Ok(issues)
    }
}

fn missing_issue(id: &str, related: &str, field: &str) -> AuditIssue {
    AuditIssue::new(
        IssueKind::MissingReference,
        id,
        Some(related),
        format!("{id}.{field} references missing task {related}"),
    )
}

fn duplicate_sequences(by_id: &BTreeMap<&str, Vec<&crate::store::Located>>) -> Vec<AuditIssue> {
    let mut by_parent: BTreeMap<&str, BTreeMap<&str, Vec<&str>>> = BTreeMap::new();
    for (id, copies) in by_id {
        let task = &copies[0].task;
        if let (Some(parent), Some(sequence)) =
            (task.relations.parent_task.as_deref(), task.sequence.as_deref())
        {
            by_parent
                .entry(parent)
                .or_default()
                .entry(sequence)
                .or_default()
                .push(*id);
        }
    }
    let mut issues = Vec::new();
    for (parent, sequences) in by_parent {
        for (sequence, ids) in sequences {
            if ids.len() > 1 {
                issues.push(AuditIssue::new(
                    IssueKind::DuplicateSequence,
                    parent,
                    None,
                    format!(
                        "subtasks {} of {parent} share sequence {sequence}",
                        ids.join(", ")
                    ),
                ));
            }
        }
    }
    issues
}

fn cycles(by_id: &BTreeMap<&str, Vec<&crate::store::Located>>) -> Vec<AuditIssue> {
    let graph = RelationGraph {
        edges: by_id
            .iter()
            .map(|(id, copies)| (id.to_string(), copies[0].task.relations.clone()))
            .collect(),
    };
    let mut reported: HashSet<BTreeSet<String>> = HashSet::new();
    let mut issues = Vec::new();

    for id in by_id.keys() {
        let ancestors = graph.ancestors(id);
        if let Some(position) = ancestors.iter().position(|ancestor| ancestor == id) {
            let members: BTreeSet<String> = ancestors[..=position].iter().cloned().collect();
            if reported.insert(members) {
                let mut path = vec![id.to_string()];
                path.extend(ancestors[..=position].iter().cloned());
                issues.push(AuditIssue::new(
                    IssueKind::Cycle,
                    id,
                    None,
                    format!("parentTask cycle: {}", path.join(" -> ")),
                ));
            }
        }

        let Some(relations) = graph.edges.get(*id) else {
            continue;
        };
        for dependency in &relations.depends_on {
            let mut path = vec![id.to_string()];
            let mut visited = HashSet::new();
            if graph.dependency_path(dependency, id, &mut visited, &mut path) {
                let members: BTreeSet<String> = path.iter().cloned().collect();
                if reported.insert(members) {
                    path.push(id.to_string());
                    issues.push(AuditIssue::new(
                        IssueKind::Cycle,
                        id,
                        Some(dependency),
                        format!("dependsOn cycle: {}", path.join(" -> ")),
                    ));
                }
                break;
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn store() -> (TempDir, TaskStore) {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(Config::with_root(dir.path().join("tasks"))).unwrap();
        (dir, store)
    }

    fn task(id: &str) -> Task {
        Task::new(id, id.to_uppercase())
    }

    #[test]
    fn helpers_report_changes() {
        let mut ids = vec!["a".to_string()];
        assert!(!push_unique(&mut ids, "a"));
        assert!(push_unique(&mut ids, "b"));
        assert!(remove_id(&mut ids, "a"));
        assert!(!remove_id(&mut ids, "a"));

        let mut slot = Some("x".to_string());
        assert!(!clear_if(&mut slot, "y"));
        assert!(clear_if(&mut slot, "x"));
        assert_eq!(slot, None);
    }

    #[test]
    fn parent_cycle_is_rejected() {
        let (_dir, store) = store();
        store.create(task("a"), None).unwrap();
        let mut b = task("b");
        b.relations.parent_task = Some("a".to_string());
        store.create(b, None).unwrap();

        let proposed = Relationships {
            parent_task: Some("b".to_string()),
            ..Relationships::default()
        };
        let err = RelationshipMaintainer::check_cycles(&store, "a", &proposed).unwrap_err();
        match err {
            Error::CycleDetected { kind, path } => {
                assert_eq!(kind, "parentTask");
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dependency_cycle_is_rejected() {
        let (_dir, store) = store();
        store.create(task("a"), None).unwrap();
        let mut b = task("b");
        b.relations.depends_on = vec!["a".to_string()];
        store.create(b, None).unwrap();

        let proposed = Relationships {
            depends_on: vec!["b".to_string()],
            ..Relationships::default()
        };
        let err = RelationshipMaintainer::check_cycles(&store, "a", &proposed).unwrap_err();
        assert!(matches!(err, Error::CycleDetected { kind: "dependsOn", .. }));
    }

    #[test]
    fn adopting_an_ancestor_is_rejected() {
        let (_dir, store) = store();
        store.create(task("root"), None).unwrap();
        let mut leaf = task("leaf");
        leaf.relations.parent_task = Some("root".to_string());
        store.create(leaf, None).unwrap();

        let proposed = Relationships {
            parent_task: Some("root".to_string()),
            subtasks: vec!["root".to_string()],
            ..Relationships::default()
        };
        assert!(RelationshipMaintainer::check_cycles(&store, "leaf", &proposed).is_err());
    }

    #[test]
    fn audit_reports_hand_edited_inconsistencies() {
        let (_dir, store) = store();
        let root = store.storage().root().to_path_buf();
        std::fs::write(
            root.join("a.md"),
            "---\nid: a\ntitle: A\ntype: task\nstatus: todo\nnextTask: b\ndependsOn: [ghost]\n---\n",
        )
        .unwrap();
        std::fs::write(
            root.join("b.md"),
            "---\nid: b\ntitle: B\ntype: task\nstatus: todo\nparentTask: a\n---\n",
        )
        .unwrap();

        let issues = store.audit().unwrap();
        let kinds: Vec<IssueKind> = issues.iter().map(|issue| issue.kind).collect();
        assert!(kinds.contains(&IssueKind::BrokenChain));
        assert!(kinds.contains(&IssueKind::MissingSubtaskEntry));
        assert!(kinds.contains(&IssueKind::MissingReference));
    }

    #[test]
    fn audit_is_clean_after_engine_writes() {
        let (_dir, store) = store();
        store.create(task("a"), None).unwrap();
        let mut b = task("b");
        b.relations.parent_task = Some("a".to_string());
        b.relations.previous_task = Some("a".to_string());
        store.create(b, None).unwrap();
        assert_eq!(store.audit().unwrap(), Vec::new());
    }
}
