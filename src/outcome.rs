//! Success values that may carry non-fatal relationship warnings.
//!
//! Multi-file operations commit their primary write and then attempt the
//! secondary (inverse-edge) writes. Secondary failures never roll back the
//! primary write; they are collected here so callers can tell a clean
//! success from a success with warnings.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A neighbour could not be loaded or rewritten
    InverseUpdateFailed,
    /// A deleted task left subtasks without a parent
    OrphanedSubtasks,
    /// A relationship points at an id that does not exist
    MissingReference,
    /// A reference to a removed task was cleaned up (or left in place)
    DanglingReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipWarning {
    pub kind: WarningKind,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    pub message: String,
}

impl RelationshipWarning {
    pub fn new(
        kind: WarningKind,
        task_id: impl Into<String>,
        related_id: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            task_id: task_id.into(),
            related_id: related_id.map(str::to_string),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RelationshipWarning>,
}

impl<T> Outcome<T> {
    pub fn with_warnings(data: T, warnings: Vec<RelationshipWarning>) -> Self {
        Self { data, warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            data: f(self.data),
            warnings: self.warnings,
        }
    }

    /// One-line summary of the warnings, if any
    pub fn message(&self) -> Option<String> {
        if self.warnings.is_empty() {
            return None;
        }
        let details: Vec<&str> = self
            .warnings
            .iter()
            .map(|warning| warning.message.as_str())
            .collect();
        Some(format!(
            "completed with {} warning(s): {}",
            self.warnings.len(),
            details.join("; ")
        ))
    }

    pub fn into_data(self) -> T {
        self.data
    }
}
