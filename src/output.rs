//! Shared output formatting for taskmd CLI commands.
//!
//! JSON mode prints one envelope per command:
//! `{schema_version, command, success, status, data?, error?, message?, warnings?, next_steps?}`
//! where `status` is `success`, `success_with_warnings` or `error`.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};
use crate::outcome::{Outcome, RelationshipWarning};

pub const SCHEMA_VERSION: &str = "taskmd.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    success: bool,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "is_empty")]
    warnings: &'a [RelationshipWarning],
    #[serde(skip_serializing_if = "is_empty")]
    next_steps: &'a [String],
}

fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    emit(options, command, data, &[], None, human)
}

/// Emit an operation result whose secondary writes may have left warnings
pub fn emit_outcome<T: Serialize>(
    options: OutputOptions,
    command: &str,
    outcome: &Outcome<T>,
    mut human: HumanOutput,
) -> Result<()> {
    for warning in &outcome.warnings {
        human.push_warning(warning.message.clone());
    }
    if !outcome.is_clean() {
        human.push_next_step("taskmd check");
    }
    emit(
        options,
        command,
        &outcome.data,
        &outcome.warnings,
        outcome.message(),
        Some(&human),
    )
}

fn emit<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    warnings: &[RelationshipWarning],
    message: Option<String>,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let next_steps = human.map(|h| h.next_steps.as_slice()).unwrap_or_default();
        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            success: true,
            status: if warnings.is_empty() {
                "success"
            } else {
                "success_with_warnings"
            },
            data: Some(data),
            error: None,
            message,
            warnings,
            next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if let Some(human) = human {
        // warnings still reach stderr when stdout is quiet
        if options.quiet {
            for warning in &human.warnings {
                eprintln!("warning: {warning}");
            }
        } else {
            println!("{}", format_human(human));
        }
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        let payload: Envelope<'_, ()> = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            success: false,
            status: "error",
            data: None,
            error: Some(JsonError::from(err)),
            message: Some(err.to_string()),
            warnings: &[],
            next_steps: &next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// `group subcommand` from the raw arguments, for error envelopes emitted
/// before (or instead of) a parsed command
pub fn infer_command_name_from_args() -> String {
    infer_command_name(std::env::args().skip(1))
}

pub fn infer_command_name<I: IntoIterator<Item = String>>(args: I) -> String {
    let mut positional = args.into_iter().filter(|arg| !arg.starts_with('-'));
    let command = match positional.next() {
        Some(cmd) => cmd,
        None => return "taskmd".to_string(),
    };

    if matches!(command.as_str(), "task" | "phase" | "feature" | "area") {
        if let Some(sub) = positional.next() {
            return format!("{command} {sub}");
        }
    }
    command
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::NotFound { kind: "task", .. } => vec!["taskmd task list --all".to_string()],
        Error::NotFound { kind: "phase", .. } => vec!["taskmd phase list".to_string()],
        Error::NotFound { kind, .. } => vec![format!("taskmd {kind} list")],
        Error::CycleDetected { .. } => {
            vec!["remove one of the parentTask/dependsOn edges in the cycle".to_string()]
        }
        Error::LocationConflict { reason, .. } if reason.contains("force") => {
            vec!["re-run with --force to delete the tasks too".to_string()]
        }
        Error::LocationConflict { reason, .. } if reason.contains("migration") => {
            vec!["taskmd check --resume".to_string()]
        }
        Error::InvalidConfig(_) => vec!["fix .taskmd.toml then retry".to_string()],
        Error::LockFailed(_) => vec!["another taskmd process holds the lock; retry".to_string()],
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}
