//! Task, phase and grouping records.
//!
//! Status and priority are closed enums. Free-text input (synonyms, legacy
//! emoji-prefixed values, odd casing) is normalized once when a value is
//! parsed or deserialized; everything past that boundary compares enums.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Reserved id (and file stem) of a grouping's summary document
pub const OVERVIEW_ID: &str = "_overview";

/// Directory prefix marking a feature grouping
pub const FEATURE_PREFIX: &str = "feature-";

/// Directory prefix marking an area grouping
pub const AREA_PREFIX: &str = "area-";

const DEFAULT_TASK_TYPE: &str = "task";
const MAX_IDENTIFIER_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Blocked,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Blocked,
        TaskStatus::Done,
    ];

    /// Map free text onto a status. Unrecognized input falls back to `Todo`.
    pub fn normalize(raw: &str) -> Self {
        match normalize_words(raw).as_str() {
            "todo" | "to do" | "pending" | "open" | "new" | "backlog" | "not started"
            | "planned" => TaskStatus::Todo,
            "in progress" | "inprogress" | "wip" | "started" | "active" | "doing"
            | "working" => TaskStatus::InProgress,
            "review" | "in review" | "reviewing" | "testing" | "qa" => TaskStatus::Review,
            "blocked" | "on hold" | "waiting" | "stuck" => TaskStatus::Blocked,
            "done" | "complete" | "completed" | "closed" | "finished" | "resolved" => {
                TaskStatus::Done
            }
            _ => TaskStatus::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl FromStr for TaskStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(TaskStatus::normalize(s))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TaskStatus::normalize(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Map free text onto a priority. Unrecognized input falls back to `Medium`.
    pub fn normalize(raw: &str) -> Self {
        match normalize_words(raw).as_str() {
            "critical" | "p0" | "urgent" | "blocker" | "highest" => Priority::Critical,
            "high" | "p1" | "important" => Priority::High,
            "medium" | "p2" | "normal" | "moderate" => Priority::Medium,
            "low" | "p3" | "p4" | "minor" | "trivial" | "lowest" => Priority::Low,
            _ => Priority::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Priority::normalize(s))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Priority::normalize(&raw))
    }
}

/// Lowercase, drop leading emoji/punctuation, fold `_`/`-` into spaces.
fn normalize_words(raw: &str) -> String {
    let trimmed = raw.trim_start_matches(|ch: char| !ch.is_alphanumeric());
    trimmed
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Relationship fields of a task. Inverse edges are maintained by
/// [`crate::relations::RelationshipMaintainer`]; `depends_on` has no stored inverse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationships {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_task: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<String>,
}

impl Relationships {
    /// Every task id referenced by these fields
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.parent_task
            .iter()
            .chain(self.previous_task.iter())
            .chain(self.next_task.iter())
            .chain(self.depends_on.iter())
            .chain(self.subtasks.iter())
            .map(String::as_str)
    }

    /// Reject edges that point back at `id` or contradict each other
    pub fn validate_for(&self, id: &str) -> Result<()> {
        let self_ref = |field: &str| {
            Err(Error::InvalidArgument(format!(
                "task {id} cannot reference itself in {field}"
            )))
        };
        if self.parent_task.as_deref() == Some(id) {
            return self_ref("parentTask");
        }
        if self.previous_task.as_deref() == Some(id) {
            return self_ref("previousTask");
        }
        if self.next_task.as_deref() == Some(id) {
            return self_ref("nextTask");
        }
        if self.depends_on.iter().any(|dep| dep == id) {
            return self_ref("dependsOn");
        }
        if self.subtasks.iter().any(|child| child == id) {
            return self_ref("subtasks");
        }
        if self.previous_task.is_some() && self.previous_task == self.next_task {
            return Err(Error::InvalidArgument(format!(
                "task {id} has the same previousTask and nextTask"
            )));
        }
        if let Some(parent) = self.parent_task.as_deref() {
            if self.subtasks.iter().any(|child| child == parent) {
                return Err(Error::InvalidArgument(format!(
                    "task {id} lists its parent {parent} as a subtask"
                )));
            }
        }
        Ok(())
    }
}

/// A task document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub relations: Relationships,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdirectory: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_overview: bool,
    /// Metadata keys this crate does not model, preserved on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
    /// Body text after the metadata block
    #[serde(skip)]
    pub content: String,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            task_type: DEFAULT_TASK_TYPE.to_string(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            assigned_to: None,
            created_date: None,
            updated_date: None,
            due_date: None,
            tags: Vec::new(),
            relations: Relationships::default(),
            sequence: None,
            phase: None,
            subdirectory: None,
            is_overview: false,
            extra: BTreeMap::new(),
            content: String::new(),
        }
    }

    pub fn location(&self) -> Location {
        Location {
            phase: self.phase.clone(),
            subdirectory: self.subdirectory.clone(),
        }
    }

    pub fn set_location(&mut self, location: &Location) {
        self.phase = location.phase.clone();
        self.subdirectory = location.subdirectory.clone();
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    pub fn touch(&mut self) {
        self.updated_date = Some(Utc::now());
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Int(value) => value.to_string(),
    })
}

// `sequence: 04` in a hand-written document parses as an integer.
fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(u64),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(text)) => Some(text),
        Some(Raw::Int(value)) => Some(format!("{value:02}")),
        None => None,
    })
}

/// Where a task lives: `<root>/<phase?>/<subdirectory?>/<id>.md`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdirectory: Option<String>,
}

impl Location {
    pub fn new(phase: Option<&str>, subdirectory: Option<&str>) -> Self {
        Self {
            phase: phase.map(str::to_string),
            subdirectory: subdirectory.map(str::to_string),
        }
    }

    pub fn in_phase(phase: &str) -> Self {
        Self::new(Some(phase), None)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(phase) = self.phase.as_deref() {
            validate_name("phase", phase)?;
        }
        if let Some(subdirectory) = self.subdirectory.as_deref() {
            for segment in subdirectory.split('/') {
                validate_name("subdirectory", segment)?;
            }
        }
        Ok(())
    }
}

/// Partial update of a task. Outer `None` leaves a field alone; for clearable
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskPatch {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "present")]
    pub assigned_to: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<NaiveDate>>,
    pub tags: Option<Vec<String>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub parent_task: Option<Option<String>>,
    pub depends_on: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub previous_task: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub next_task: Option<Option<String>>,
    pub subtasks: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub sequence: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub phase: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub subdirectory: Option<Option<String>>,
}

// A present key (even `null`) becomes `Some(..)`; an absent key stays `None`.
fn present<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl TaskPatch {
    /// Apply every present field to `task`. Location fields are applied too;
    /// callers compare locations before and after to decide on a move.
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(task_type) = &self.task_type {
            task.task_type = task_type.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(assigned_to) = &self.assigned_to {
            task.assigned_to = assigned_to.clone();
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        if let Some(content) = &self.content {
            task.content = content.clone();
        }
        if let Some(parent) = &self.parent_task {
            task.relations.parent_task = parent.clone();
        }
        if let Some(depends_on) = &self.depends_on {
            task.relations.depends_on = dedup(depends_on);
        }
        if let Some(previous) = &self.previous_task {
            task.relations.previous_task = previous.clone();
        }
        if let Some(next) = &self.next_task {
            task.relations.next_task = next.clone();
        }
        if let Some(subtasks) = &self.subtasks {
            task.relations.subtasks = dedup(subtasks);
        }
        if let Some(sequence) = &self.sequence {
            task.sequence = sequence.clone();
        }
        if let Some(phase) = &self.phase {
            task.phase = phase.clone();
        }
        if let Some(subdirectory) = &self.subdirectory {
            task.subdirectory = subdirectory.clone();
        }
    }

    pub fn touches_location(&self) -> bool {
        self.phase.is_some() || self.subdirectory.is_some()
    }
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Derived status of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl PhaseStatus {
    /// all done -> completed; any blocked -> blocked; any in flight -> in-progress
    pub fn derive<I: IntoIterator<Item = TaskStatus>>(statuses: I) -> Self {
        let mut total = 0usize;
        let mut done = 0usize;
        let mut in_flight = false;
        let mut blocked = false;
        for status in statuses {
            total += 1;
            match status {
                TaskStatus::Done => done += 1,
                TaskStatus::Blocked => blocked = true,
                TaskStatus::InProgress | TaskStatus::Review => in_flight = true,
                TaskStatus::Todo => {}
            }
        }
        if blocked {
            PhaseStatus::Blocked
        } else if total > 0 && done == total {
            PhaseStatus::Completed
        } else if in_flight {
            PhaseStatus::InProgress
        } else {
            PhaseStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::InProgress => "in-progress",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered workflow bucket backed by `<root>/<id>/`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: PhaseStatus,
    pub order: u32,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingKind {
    Feature,
    Area,
}

impl GroupingKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            GroupingKind::Feature => FEATURE_PREFIX,
            GroupingKind::Area => AREA_PREFIX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingKind::Feature => "feature",
            GroupingKind::Area => "area",
        }
    }

    pub fn dir_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    /// Split a directory name into its grouping kind and bare name
    pub fn parse_dir_name(dir_name: &str) -> Option<(GroupingKind, &str)> {
        [GroupingKind::Feature, GroupingKind::Area]
            .into_iter()
            .find_map(|kind| {
                dir_name
                    .strip_prefix(kind.prefix())
                    .filter(|name| !name.is_empty())
                    .map(|name| (kind, name))
            })
    }
}

impl fmt::Display for GroupingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn from_tasks<'a, I: IntoIterator<Item = &'a Task>>(tasks: I) -> Self {
        let mut progress = Progress::default();
        for task in tasks {
            progress.total += 1;
            if task.is_completed() {
                progress.completed += 1;
            }
        }
        progress
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// A feature or area directory with its overview document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grouping {
    pub kind: GroupingKind,
    pub name: String,
    pub directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<Task>,
    pub tasks: Vec<String>,
    pub progress: Progress,
}

/// Phase and grouping names: `[A-Za-z0-9][A-Za-z0-9_-]*`
pub fn validate_name(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= MAX_IDENTIFIER_LEN
        && value.starts_with(|ch: char| ch.is_ascii_alphanumeric())
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(format!(
            "{kind} '{value}' must match [A-Za-z0-9][A-Za-z0-9_-]*"
        )))
    }
}

/// Task ids double as file stems: `[A-Za-z0-9_][A-Za-z0-9_.-]*`, no `..`
pub fn validate_task_id(value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= MAX_IDENTIFIER_LEN
        && !value.contains("..")
        && value.starts_with(|ch: char| ch.is_ascii_alphanumeric() || ch == '_')
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(format!(
            "task id '{value}' must match [A-Za-z0-9_][A-Za-z0-9_.-]*"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_normalizes_synonyms_and_emoji() {
        assert_eq!(TaskStatus::normalize("🔄 In Progress"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::normalize("in_progress"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::normalize("✅ Completed"), TaskStatus::Done);
        assert_eq!(TaskStatus::normalize("On-Hold"), TaskStatus::Blocked);
        assert_eq!(TaskStatus::normalize("QA"), TaskStatus::Review);
        assert_eq!(TaskStatus::normalize("whatever"), TaskStatus::Todo);
        assert_eq!(TaskStatus::normalize(""), TaskStatus::Todo);
    }

    #[test]
    fn priority_normalizes_with_default() {
        assert_eq!(Priority::normalize("P0"), Priority::Critical);
        assert_eq!(Priority::normalize("🔥 urgent"), Priority::Critical);
        assert_eq!(Priority::normalize("High"), Priority::High);
        assert_eq!(Priority::normalize("minor"), Priority::Low);
        assert_eq!(Priority::normalize("???"), Priority::Medium);
    }

    #[test]
    fn status_deserializes_through_normalization() {
        let status: TaskStatus = serde_json::from_str("\"Finished\"").expect("status");
        assert_eq!(status, TaskStatus::Done);
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in-progress\"");
    }

    #[test]
    fn phase_status_derivation() {
        use TaskStatus::*;
        assert_eq!(PhaseStatus::derive(Vec::<TaskStatus>::new()), PhaseStatus::Pending);
        assert_eq!(PhaseStatus::derive([Done, Done]), PhaseStatus::Completed);
        assert_eq!(PhaseStatus::derive([Done, Blocked]), PhaseStatus::Blocked);
        assert_eq!(PhaseStatus::derive([Todo, InProgress]), PhaseStatus::InProgress);
        assert_eq!(PhaseStatus::derive([Todo, Done]), PhaseStatus::Pending);
    }

    #[test]
    fn patch_distinguishes_absent_and_null() {
        let patch: TaskPatch =
            serde_json::from_str(r#"{"parentTask": null, "title": "x"}"#).expect("patch");
        assert_eq!(patch.parent_task, Some(None));
        assert_eq!(patch.next_task, None);
        assert_eq!(patch.title.as_deref(), Some("x"));
    }

    #[test]
    fn relationships_reject_self_reference() {
        let relations = Relationships {
            depends_on: vec!["a".to_string()],
            ..Relationships::default()
        };
        assert!(matches!(
            relations.validate_for("a"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(relations.validate_for("b").is_ok());
    }

    #[test]
    fn grouping_dir_names_round_trip() {
        assert_eq!(GroupingKind::Feature.dir_name("auth"), "feature-auth");
        assert_eq!(
            GroupingKind::parse_dir_name("area-infra"),
            Some((GroupingKind::Area, "infra"))
        );
        assert_eq!(GroupingKind::parse_dir_name("feature-"), None);
        assert_eq!(GroupingKind::parse_dir_name("alpha"), None);
    }

    #[test]
    fn identifier_validation() {
        assert!(validate_name("phase", "phase-1_b").is_ok());
        assert!(validate_name("phase", "../etc").is_err());
        assert!(validate_name("phase", "").is_err());
        assert!(validate_task_id(OVERVIEW_ID).is_ok());
        assert!(validate_task_id("TASK-001").is_ok());
        assert!(validate_task_id("a/b").is_err());
        assert!(validate_task_id("a..b").is_err());
    }
}
