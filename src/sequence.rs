//! Sequence Allocator
//!
//! Sequence tokens order the subtasks of one parent: `01`, `02`, `04a`,
//! `04b`. A trailing lowercase letter marks siblings that may run in
//! parallel; they share the numeric base.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::Task;
use crate::outcome::{Outcome, RelationshipWarning, WarningKind};
use crate::store::{Located, TaskStore};

/// Parallel suffixes run `a` through `z`
pub const MAX_PARALLEL: usize = 26;

/// Two-digit (or wider) zero-padded token
pub fn format_sequence(number: u32) -> String {
    format!("{number:02}")
}

/// Split a token into its numeric base and optional parallel letter
pub fn parse(token: &str) -> Option<(u32, Option<char>)> {
    let token = token.trim();
    let (digits, suffix) = match token.chars().last() {
        Some(ch) if ch.is_ascii_lowercase() => (&token[..token.len() - 1], Some(ch)),
        _ => (token, None),
    };
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|number| (number, suffix))
}

/// The token without a trailing parallel letter
pub fn base_sequence(token: &str) -> &str {
    match token.chars().last() {
        Some(ch) if ch.is_ascii_lowercase() => &token[..token.len() - 1],
        _ => token,
    }
}

/// Token for a new subtask: one past the subtask count, bumped past any
/// number already in use so it cannot collide.
pub fn next_sequence<'a>(
    subtask_count: usize,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    let highest = existing
        .into_iter()
        .filter_map(parse)
        .map(|(number, _)| number)
        .max()
        .unwrap_or(0);
    let by_count = u32::try_from(subtask_count)
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1);
    format_sequence(by_count.max(highest.saturating_add(1)))
}

/// Numeric order, parallel letters after their base; missing or unparsable
/// tokens sort last.
pub fn compare(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a.and_then(parse), b.and_then(parse)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(&b),
    }
}

/// Siblings sharing a numeric base
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub tasks: Vec<String>,
    pub parallel: bool,
}

/// Group tasks for display. Two or more tasks with the same base form a
/// parallel group; unsequenced tasks come last, one group each.
pub fn group_parallel(tasks: &[Task]) -> Vec<SequenceGroup> {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by(|a, b| {
        compare(a.sequence.as_deref(), b.sequence.as_deref()).then_with(|| a.id.cmp(&b.id))
    });

    let mut groups: Vec<SequenceGroup> = Vec::new();
    let mut current_key: Option<u32> = None;
    for task in sorted {
        let parsed = task.sequence.as_deref().and_then(parse);
        match parsed {
            Some((number, _)) if current_key == Some(number) => {
                if let Some(group) = groups.last_mut() {
                    group.tasks.push(task.id.clone());
                    group.parallel = true;
                }
            }
            Some((number, _)) => {
                current_key = Some(number);
                groups.push(SequenceGroup {
                    base: Some(format_sequence(number)),
                    tasks: vec![task.id.clone()],
                    parallel: false,
                });
            }
            None => {
                current_key = None;
                groups.push(SequenceGroup {
                    base: task.sequence.as_deref().map(|token| base_sequence(token).to_string()),
                    tasks: vec![task.id.clone()],
                    parallel: false,
                });
            }
        }
    }
    groups
}

fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

impl TaskStore {
    /// Token for `child_id` once it sits under `parent_id`: `current` if no
    /// other subtask holds it, otherwise the next free one. A missing parent
    /// leaves `current` as is.
    pub(crate) fn sequence_under(
        &self,
        parent_id: &str,
        child_id: &str,
        current: Option<&str>,
    ) -> Result<Option<String>> {
        let parent = match self.locate(parent_id, None) {
            Ok(located) => located.task,
            Err(err) if err.is_not_found() => return Ok(current.map(str::to_string)),
            Err(err) => return Err(err),
        };
        let (siblings, _) = self.subtasks_of(&parent)?;
        let taken: Vec<&str> = siblings
            .iter()
            .filter(|sibling| sibling.task.id != child_id)
            .filter_map(|sibling| sibling.task.sequence.as_deref())
            .collect();
        let token = match current {
            Some(token) if !taken.contains(&token) => token.to_string(),
            _ => {
                let count = parent
                    .relations
                    .subtasks
                    .iter()
                    .filter(|id| *id != child_id)
                    .count();
                next_sequence(count, taken)
            }
        };
        Ok(Some(token))
    }

    /// Loaded subtasks of `parent`, plus the listed ids that could not be found
    fn subtasks_of(&self, parent: &Task) -> Result<(Vec<Located>, Vec<String>)> {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for child in &parent.relations.subtasks {
            match self.locate(child, None) {
                Ok(located) => found.push(located),
                Err(err) if err.is_not_found() => missing.push(child.clone()),
                Err(err) => return Err(err),
            }
        }
        Ok((found, missing))
    }

    fn family_ids(&self, parent_id: &str) -> Result<BTreeSet<String>> {
        let parent = self.locate(parent_id, None)?;
        let mut ids: BTreeSet<String> = parent.task.relations.subtasks.iter().cloned().collect();
        ids.insert(parent_id.to_string());
        Ok(ids)
    }

    /// Renumber the listed subtasks `01, 02, ...` by their position in
    /// `ordered_ids`.
    ///
    /// Unlisted subtasks keep their tokens unless their base collides with a
    /// newly assigned one; colliding groups move past the highest number in
    /// use, keeping their parallel letters.
    pub fn reorder_subtasks(
        &self,
        parent_id: &str,
        ordered_ids: &[String],
    ) -> Result<Outcome<Vec<Task>>> {
        self.with_locked(
            |store| store.family_ids(parent_id),
            |store| store.reorder_locked(parent_id, ordered_ids),
        )
    }

    fn reorder_locked(&self, parent_id: &str, ordered_ids: &[String]) -> Result<Outcome<Vec<Task>>> {
        let parent = self.locate(parent_id, None)?.task;
        let (mut children, missing) = self.subtasks_of(&parent)?;
        let mut warnings = missing_warnings(parent_id, &missing);

        // numbers follow list position, so ignored ids leave gaps
        let mut assigned: HashMap<String, u32> = HashMap::new();
        for (index, id) in dedup_ids(ordered_ids).into_iter().enumerate() {
            if children.iter().any(|child| child.task.id == id) {
                let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
                assigned.insert(id, number);
            } else {
                tracing::warn!(parent = parent_id, id = %id, "ignoring id that is not a subtask");
            }
        }

        let taken: HashSet<u32> = assigned.values().copied().collect();
        let mut highest = children
            .iter()
            .filter_map(|child| child.task.sequence.as_deref().and_then(parse))
            .map(|(number, _)| number)
            .chain(taken.iter().copied())
            .max()
            .unwrap_or(0);
        let mut relocated: BTreeMap<u32, u32> = BTreeMap::new();

        for child in &mut children {
            let token = match assigned.get(&child.task.id) {
                Some(number) => Some(format_sequence(*number)),
                None => match child.task.sequence.as_deref().and_then(parse) {
                    Some((number, suffix)) if taken.contains(&number) => {
                        let moved = *relocated.entry(number).or_insert_with(|| {
                            highest += 1;
                            highest
                        });
                        let mut token = format_sequence(moved);
                        token.extend(suffix);
                        Some(token)
                    }
                    _ => None,
                },
            };
            if let Some(token) = token {
                if child.task.sequence.as_deref() != Some(token.as_str()) {
                    child.task.sequence = Some(token);
                    child.task.touch();
                    self.write_sibling(parent_id, child, &mut warnings);
                }
            }
        }

        tracing::info!(parent = parent_id, listed = assigned.len(), "reordered subtasks");
        let mut tasks: Vec<Task> = children.into_iter().map(|child| child.task).collect();
        tasks.sort_by(|a, b| compare(a.sequence.as_deref(), b.sequence.as_deref()));
        Ok(Outcome::with_warnings(tasks, warnings))
    }

    /// Give `ids` the smallest base among them and letters `a, b, c, ...` in
    /// list order. Letters already held by other siblings on that base are
    /// skipped.
    pub fn make_parallel(&self, parent_id: &str, ids: &[String]) -> Result<Outcome<Vec<Task>>> {
        let ids = dedup_ids(ids);
        if ids.is_empty() {
            return Err(Error::InvalidArgument(
                "make_parallel needs at least one task".to_string(),
            ));
        }
        if ids.len() > MAX_PARALLEL {
            return Err(Error::InvalidArgument(format!(
                "at most {MAX_PARALLEL} tasks can run in parallel, got {}",
                ids.len()
            )));
        }
        self.with_locked(
            |store| store.family_ids(parent_id),
            |store| store.make_parallel_locked(parent_id, &ids),
        )
    }

    fn make_parallel_locked(&self, parent_id: &str, ids: &[String]) -> Result<Outcome<Vec<Task>>> {
        let parent = self.locate(parent_id, None)?.task;
        for id in ids {
            if !parent.relations.subtasks.contains(id) {
                return Err(Error::InvalidArgument(format!(
                    "{id} is not a subtask of {parent_id}"
                )));
            }
        }
        let (children, missing) = self.subtasks_of(&parent)?;
        if let Some(id) = ids.iter().find(|id| missing.contains(id)) {
            return Err(Error::task_not_found(id.as_str()));
        }
        let mut warnings = missing_warnings(parent_id, &missing);

        let (mut subset, others): (Vec<Located>, Vec<Located>) = children
            .into_iter()
            .partition(|child| ids.contains(&child.task.id));
        subset.sort_by_key(|child| ids.iter().position(|id| *id == child.task.id));

        let base = subset
            .iter()
            .filter_map(|child| child.task.sequence.as_deref().and_then(parse))
            .map(|(number, _)| number)
            .min()
            .ok_or_else(|| Error::NoValidSequence(ids.to_vec()))?;

        let held: HashSet<char> = others
            .iter()
            .filter_map(|child| child.task.sequence.as_deref().and_then(parse))
            .filter_map(|(number, suffix)| (number == base).then_some(suffix).flatten())
            .collect();
        let letters: Vec<char> = ('a'..='z').filter(|ch| !held.contains(ch)).collect();
        if letters.len() < subset.len() {
            return Err(Error::InvalidArgument(format!(
                "only {} parallel letters left on base {}",
                letters.len(),
                format_sequence(base)
            )));
        }

        for (child, letter) in subset.iter_mut().zip(letters) {
            let token = format!("{}{letter}", format_sequence(base));
            if child.task.sequence.as_deref() != Some(token.as_str()) {
                child.task.sequence = Some(token);
                child.task.touch();
                self.write_sibling(parent_id, child, &mut warnings);
            }
        }

        tracing::info!(parent = parent_id, base, count = subset.len(), "made subtasks parallel");
        Ok(Outcome::with_warnings(
            subset.into_iter().map(|child| child.task).collect(),
            warnings,
        ))
    }

    /// Subtasks of `parent_id` grouped by sequence base
    pub fn parallel_groups(&self, parent_id: &str) -> Result<Vec<SequenceGroup>> {
        let parent = self.locate(parent_id, None)?.task;
        let (children, _) = self.subtasks_of(&parent)?;
        let tasks: Vec<Task> = children.into_iter().map(|child| child.task).collect();
        Ok(group_parallel(&tasks))
    }

    fn write_sibling(
        &self,
        parent_id: &str,
        child: &Located,
        warnings: &mut Vec<RelationshipWarning>,
    ) {
        if let Err(err) = self.storage().write_task(&child.path, &child.task) {
            tracing::warn!(parent = parent_id, id = %child.task.id, error = %err, "sequence write failed");
            warnings.push(RelationshipWarning::new(
                WarningKind::InverseUpdateFailed,
                parent_id,
                Some(&child.task.id),
                format!("could not write sequence of {}: {err}", child.task.id),
            ));
        }
    }
}

fn missing_warnings(parent_id: &str, missing: &[String]) -> Vec<RelationshipWarning> {
    missing
        .iter()
        .map(|id| {
            RelationshipWarning::new(
                WarningKind::MissingReference,
                parent_id,
                Some(id),
                format!("{parent_id}.subtasks lists missing task {id}"),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_sequence(id: &str, sequence: Option<&str>) -> Task {
        let mut task = Task::new(id, id);
        task.sequence = sequence.map(str::to_string);
        task
    }

    #[test]
    fn parse_and_base() {
        assert_eq!(parse("04"), Some((4, None)));
        assert_eq!(parse("04b"), Some((4, Some('b'))));
        assert_eq!(parse("12"), Some((12, None)));
        assert_eq!(parse("b"), None);
        assert_eq!(parse("4B"), None);
        assert_eq!(base_sequence("04a"), "04");
        assert_eq!(base_sequence("04"), "04");
    }

    #[test]
    fn next_sequence_skips_used_numbers() {
        assert_eq!(next_sequence(0, std::iter::empty()), "01");
        assert_eq!(next_sequence(2, ["01", "02"]), "03");
        // a removed sibling left a gap at the end; count alone would reuse 03
        assert_eq!(next_sequence(2, ["01", "03"]), "04");
        assert_eq!(next_sequence(3, ["02a", "02b", "02c"]), "04");
    }

    #[test]
    fn compare_orders_numbers_then_letters() {
        let mut tokens = vec![Some("10"), None, Some("02b"), Some("02a"), Some("2")];
        tokens.sort_by(|a, b| compare(*a, *b));
        assert_eq!(tokens, vec![Some("2"), Some("02a"), Some("02b"), Some("10"), None]);
    }

    #[test]
    fn group_parallel_marks_shared_bases() {
        let tasks = vec![
            with_sequence("c", Some("02b")),
            with_sequence("a", Some("01")),
            with_sequence("b", Some("02a")),
            with_sequence("d", None),
        ];
        let groups = group_parallel(&tasks);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].tasks, vec!["a"]);
        assert!(!groups[0].parallel);
        assert_eq!(groups[1].base.as_deref(), Some("02"));
        assert_eq!(groups[1].tasks, vec!["b", "c"]);
        assert!(groups[1].parallel);
        assert_eq!(groups[2].base, None);
    }
}
