//! Error types for taskmd
//!
//! Exit codes:
//! - 0: Success (possibly with warnings)
//! - 2: User error (bad identifier, missing task, invalid patch)
//! - 3: Blocked by a guard (location conflict, non-empty phase, cycle)
//! - 4: Operation failed (filesystem, serialization, lock timeout)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the taskmd CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const GUARD_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No valid sequence among tasks: {}", .0.join(", "))]
    NoValidSequence(Vec<String>),

    // Guard blocks (exit code 3)
    #[error("Location conflict at {path}: {reason}")]
    LocationConflict { path: PathBuf, reason: String },

    #[error("{kind} cycle detected: {}", .path.join(" -> "))]
    CycleDetected { kind: &'static str, path: Vec<String> },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: "task",
            id: id.into(),
        }
    }

    pub fn phase_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: "phase",
            id: id.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotFound { .. }
            | Error::AlreadyExists { .. }
            | Error::InvalidIdentifier(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::NoValidSequence(_) => exit_codes::USER_ERROR,

            // Guard blocks
            Error::LocationConflict { .. } | Error::CycleDetected { .. } => {
                exit_codes::GUARD_BLOCKED
            }

            // Operation failures
            Error::Io(_)
            | Error::InvalidDocument { .. }
            | Error::Json(_)
            | Error::Yaml(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable machine-readable name of the error variant
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::AlreadyExists { .. } => "already_exists",
            Error::InvalidIdentifier(_) => "invalid_identifier",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidConfig(_) => "invalid_config",
            Error::NoValidSequence(_) => "no_valid_sequence",
            Error::LocationConflict { .. } => "location_conflict",
            Error::CycleDetected { .. } => "cycle_detected",
            Error::Io(_) => "io_failure",
            Error::InvalidDocument { .. } => "invalid_document",
            Error::Json(_) | Error::Yaml(_) | Error::TomlParse(_) | Error::TomlSerialize(_) => {
                "serialization"
            }
            Error::LockFailed(_) => "lock_failed",
        }
    }

    /// True when the error means "nothing stored under that id"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Result type alias for taskmd operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub kind: &'static str,
    pub code: i32,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            kind: err.kind(),
            code: err.exit_code(),
        }
    }
}
