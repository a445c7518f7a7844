//! Task document codec.
//!
//! A document is a YAML metadata block fenced by `---` lines, a blank line,
//! then free-form body text:
//!
//! ```text
//! ---
//! id: TASK-001
//! title: Wire up login
//! type: task
//! status: in-progress
//! ---
//!
//! Body text.
//! ```
//!
//! Encoding appends exactly one trailing newline to a non-empty body and
//! decoding strips exactly one, so bodies survive a rewrite byte-for-byte.

use std::path::Path;

use crate::error::{Error, Result};
use crate::model::Task;

const FENCE: &str = "---";

/// Render a task as document text
pub fn encode(task: &Task) -> Result<String> {
    let metadata = serde_yaml::to_string(task)?;
    let mut out = String::with_capacity(metadata.len() + task.content.len() + 16);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&metadata);
    if !metadata.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push('\n');
    if !task.content.is_empty() {
        out.push('\n');
        out.push_str(&task.content);
        out.push('\n');
    }
    Ok(out)
}

/// Parse document text. `path` only labels errors.
pub fn decode(text: &str, path: &Path) -> Result<Task> {
    let (metadata, body) = split(text).ok_or_else(|| Error::InvalidDocument {
        path: path.to_path_buf(),
        reason: "missing `---` metadata block".to_string(),
    })?;
    let mut task: Task = serde_yaml::from_str(metadata).map_err(|err| Error::InvalidDocument {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    if task.id.trim().is_empty() {
        return Err(Error::InvalidDocument {
            path: path.to_path_buf(),
            reason: "id cannot be empty".to_string(),
        });
    }
    task.content = body.to_string();
    Ok(task)
}

/// Split into (metadata, body), or `None` if there is no fenced block.
fn split(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = strip_fence_line(text)?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let metadata = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((metadata, trim_body(body)));
        }
        offset += line.len();
    }
    None
}

fn strip_fence_line(text: &str) -> Option<&str> {
    let first_len = text.find('\n').map(|idx| idx + 1).unwrap_or(text.len());
    if text[..first_len].trim_end() == FENCE {
        Some(&text[first_len..])
    } else {
        None
    }
}

fn trim_body(body: &str) -> &str {
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);
    body.strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, TaskStatus};
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("TASK-001.md")
    }

    #[test]
    fn encode_writes_fenced_camel_case_metadata() {
        let mut task = Task::new("TASK-001", "Write parser");
        task.relations.parent_task = Some("TASK-000".to_string());
        task.relations.depends_on = vec!["TASK-002".to_string()];
        task.sequence = Some("01".to_string());
        task.content = "Details".to_string();

        let text = encode(&task).expect("encode");
        assert!(text.starts_with("---\nid: TASK-001\n"));
        assert!(text.contains("parentTask: TASK-000"));
        assert!(text.contains("dependsOn:\n- TASK-002"));
        assert!(text.ends_with("---\n\nDetails\n"));
        let decoded = decode(&text, &path()).expect("decode");
        assert_eq!(decoded.sequence.as_deref(), Some("01"));
    }

    #[test]
    fn decode_reads_metadata_and_body() {
        let text = "---\nid: TASK-7\ntitle: Ship it\ntype: feature\nstatus: \"🔄 In Progress\"\npriority: P1\nsubtasks: [a, b]\n---\n\n# Heading\n\nBody\n";
        let task = decode(text, &path()).expect("decode");
        assert_eq!(task.id, "TASK-7");
        assert_eq!(task.task_type, "feature");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.relations.subtasks, vec!["a", "b"]);
        assert_eq!(task.content, "# Heading\n\nBody");
    }

    #[test]
    fn body_survives_rewrite() {
        let mut task = Task::new("t", "Title");
        task.content = "line one\n\nline two\n".to_string();
        let decoded = decode(&encode(&task).expect("encode"), &path()).expect("decode");
        assert_eq!(decoded.content, task.content);

        task.content.clear();
        let decoded = decode(&encode(&task).expect("encode"), &path()).expect("decode");
        assert_eq!(decoded.content, "");
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let text = "---\nid: x\ntitle: X\ntype: task\nstatus: todo\nestimate: 3\n---\n";
        let task = decode(text, &path()).expect("decode");
        assert!(task.extra.contains_key("estimate"));
        let rewritten = encode(&task).expect("encode");
        assert!(rewritten.contains("estimate: 3"));
    }

    #[test]
    fn numeric_sequence_is_read_as_token() {
        let text = "---\nid: 12\ntitle: X\ntype: task\nstatus: todo\nsequence: 4\n---\n";
        let task = decode(text, &path()).expect("decode");
        assert_eq!(task.id, "12");
        assert_eq!(task.sequence.as_deref(), Some("04"));
    }

    #[test]
    fn missing_block_or_required_key_is_invalid() {
        let err = decode("just text", &path()).expect_err("no block");
        assert!(matches!(err, Error::InvalidDocument { .. }));

        let err = decode("---\nid: x\ntitle: X\n---\n", &path()).expect_err("missing status");
        assert!(matches!(err, Error::InvalidDocument { .. }));
    }
}
