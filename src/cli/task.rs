//! taskmd task command implementations.

use chrono::NaiveDate;
use serde::Serialize;

use crate::cli::{Context, LocationArgs, TaskCommands, TaskFieldArgs};
use crate::error::{Error, Result};
use crate::model::{Location, Priority, Task, TaskPatch, TaskStatus};
use crate::outcome::Outcome;
use crate::output::{emit_outcome, emit_success, HumanOutput};
use crate::query::TaskFilter;
use crate::sequence::{group_parallel, SequenceGroup};

/// A task with its body, for output
#[derive(Serialize)]
struct TaskView<'a> {
    #[serde(flatten)]
    task: &'a Task,
    #[serde(skip_serializing_if = "str::is_empty")]
    content: &'a str,
}

impl<'a> From<&'a Task> for TaskView<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            task,
            content: &task.content,
        }
    }
}

#[derive(Serialize)]
struct TaskListOutput<'a> {
    total: usize,
    tasks: Vec<TaskView<'a>>,
}

#[derive(Serialize)]
struct SubtaskOutput<'a> {
    parent: &'a str,
    tasks: Vec<TaskView<'a>>,
    groups: Vec<SequenceGroup>,
}

pub(crate) fn run(ctx: &Context, command: TaskCommands) -> Result<()> {
    match command {
        TaskCommands::Create {
            title,
            id,
            fields,
            location,
        } => run_create(ctx, title, id, fields, location),
        TaskCommands::Get { id, location } => run_get(ctx, &id, location),
        TaskCommands::Update {
            id,
            title,
            fields,
            clear_assignee,
            clear_parent,
            clear_previous,
            clear_next,
            clear_due,
            clear_depends_on,
            location,
        } => {
            let mut patch = build_patch(title, fields)?;
            if clear_assignee {
                patch.assigned_to = Some(None);
            }
            if clear_parent {
                patch.parent_task = Some(None);
            }
            if clear_previous {
                patch.previous_task = Some(None);
            }
            if clear_next {
                patch.next_task = Some(None);
            }
            if clear_due {
                patch.due_date = Some(None);
            }
            if clear_depends_on {
                patch.depends_on = Some(Vec::new());
            }
            run_update(ctx, &id, &patch, location)
        }
        TaskCommands::Delete { id, location } => run_delete(ctx, &id, location),
        TaskCommands::Move {
            id,
            phase,
            subdirectory,
        } => run_move(ctx, &id, phase.as_deref(), subdirectory.as_deref()),
        TaskCommands::List {
            location,
            status,
            priority,
            task_type,
            tag,
            assignee,
            parent,
            depends_on,
            all,
            overviews,
            content,
        } => {
            let filter = TaskFilter {
                phase: location.phase,
                subdirectory: location.subdirectory,
                status: status.as_deref().map(TaskStatus::normalize),
                priority: priority.as_deref().map(Priority::normalize),
                task_type,
                tag,
                assigned_to: assignee,
                parent,
                depends_on,
                include_completed: all,
                include_content: content,
                include_overviews: overviews,
            };
            run_list(ctx, &filter)
        }
        TaskCommands::Next { phase } => run_next(ctx, phase.as_deref()),
        TaskCommands::Siblings { id } => run_siblings(ctx, &id),
        TaskCommands::Reorder { parent, ids } => run_reorder(ctx, &parent, &ids),
        TaskCommands::Parallel { parent, ids } => run_parallel(ctx, &parent, &ids),
    }
}

fn run_create(
    ctx: &Context,
    title: String,
    id: Option<String>,
    fields: TaskFieldArgs,
    location: LocationArgs,
) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }

    let mut task = Task::new(id.unwrap_or_default(), title);
    let mut patch = build_patch(None, fields)?;
    patch.phase = location.phase.map(Some);
    patch.subdirectory = location.subdirectory.map(Some);
    patch.apply(&mut task);

    let outcome = ctx.store.create(task, None)?;
    let created = &outcome.data;
    let mut human = HumanOutput::new("Task created");
    human.push_summary("ID", created.id.clone());
    human.push_summary("Status", created.status.to_string());
    human.push_summary("Priority", created.priority.to_string());
    if let Some(sequence) = &created.sequence {
        human.push_summary("Sequence", sequence.clone());
    }
    push_location(&mut human, created);

    emit_outcome(ctx.output, "task create", &view(&outcome), human)
}

fn run_get(ctx: &Context, id: &str, location: LocationArgs) -> Result<()> {
    let hint = location_hint(location);
    let task = ctx.store.get(id, hint.as_ref())?;

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    human.push_summary("Title", task.title.clone());
    human.push_summary("Type", task.task_type.clone());
    human.push_summary("Status", task.status.to_string());
    human.push_summary("Priority", task.priority.to_string());
    if let Some(assignee) = &task.assigned_to {
        human.push_summary("Assignee", assignee.clone());
    }
    if let Some(due) = task.due_date {
        human.push_summary("Due", due.to_string());
    }
    if !task.tags.is_empty() {
        human.push_summary("Tags", task.tags.join(", "));
    }
    push_location(&mut human, &task);
    push_relations(&mut human, &task);
    if !task.content.is_empty() {
        human.push_detail(task.content.clone());
    }

    emit_success(ctx.output, "task get", &TaskView::from(&task), Some(&human))
}

fn run_update(ctx: &Context, id: &str, patch: &TaskPatch, location: LocationArgs) -> Result<()> {
    let hint = location_hint(location);
    let outcome = ctx.store.update(id, patch, hint.as_ref())?;

    let mut human = HumanOutput::new("Task updated");
    human.push_summary("ID", outcome.data.id.clone());
    human.push_summary("Status", outcome.data.status.to_string());
    push_location(&mut human, &outcome.data);
    push_relations(&mut human, &outcome.data);

    emit_outcome(ctx.output, "task update", &view(&outcome), human)
}

fn run_delete(ctx: &Context, id: &str, location: LocationArgs) -> Result<()> {
    let hint = location_hint(location);
    let outcome = ctx.store.delete(id, hint.as_ref())?;

    let mut human = HumanOutput::new("Task deleted");
    human.push_summary("ID", outcome.data.id.clone());

    #[derive(Serialize)]
    struct DeleteOutput<'a> {
        id: &'a str,
    }
    let output = Outcome::with_warnings(
        DeleteOutput {
            id: &outcome.data.id,
        },
        outcome.warnings.clone(),
    );
    emit_outcome(ctx.output, "task delete", &output, human)
}

fn run_move(
    ctx: &Context,
    id: &str,
    phase: Option<&str>,
    subdirectory: Option<&str>,
) -> Result<()> {
    let outcome = ctx.store.migrator().move_task(id, subdirectory, phase)?;

    let mut human = HumanOutput::new("Task moved");
    human.push_summary("ID", outcome.data.id.clone());
    push_location(&mut human, &outcome.data);

    emit_outcome(ctx.output, "task move", &view(&outcome), human)
}

fn run_list(ctx: &Context, filter: &TaskFilter) -> Result<()> {
    let tasks = ctx.store.list(filter)?;
    let output = TaskListOutput {
        total: tasks.len(),
        tasks: tasks.iter().map(TaskView::from).collect(),
    };

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    if let Some(phase) = &filter.phase {
        human.push_summary("Phase", phase.clone());
    }
    for task in &tasks {
        human.push_detail(task_line(task));
    }

    emit_success(ctx.output, "task list", &output, Some(&human))
}

fn run_next(ctx: &Context, phase: Option<&str>) -> Result<()> {
    let next = ctx.store.find_next_task(phase)?;

    let human = match &next {
        Some(task) => {
            let mut human = HumanOutput::new("Next task");
            human.push_detail(task_line(task));
            push_location(&mut human, task);
            human
        }
        None => HumanOutput::new("No task is ready"),
    };

    let next = next.as_ref().map(TaskView::from);
    emit_success(ctx.output, "task next", &next, Some(&human))
}

fn run_siblings(ctx: &Context, id: &str) -> Result<()> {
    let siblings = ctx.store.siblings_of(id)?;
    let output = TaskListOutput {
        total: siblings.len(),
        tasks: siblings.iter().map(TaskView::from).collect(),
    };

    let mut human = HumanOutput::new("Siblings");
    human.push_summary("ID", id);
    human.push_summary("Total", siblings.len().to_string());
    for task in &siblings {
        let sequence = task.sequence.as_deref().unwrap_or("--");
        human.push_detail(format!("{sequence} {}", task_line(task)));
    }

    emit_success(ctx.output, "task siblings", &output, Some(&human))
}

fn run_reorder(ctx: &Context, parent: &str, ids: &[String]) -> Result<()> {
    let outcome = ctx.store.reorder_subtasks(parent, ids)?;
    emit_subtasks(ctx, "task reorder", "Subtasks reordered", parent, outcome)
}

fn run_parallel(ctx: &Context, parent: &str, ids: &[String]) -> Result<()> {
    let outcome = ctx.store.make_parallel(parent, ids)?;
    emit_subtasks(ctx, "task parallel", "Subtasks made parallel", parent, outcome)
}

fn emit_subtasks(
    ctx: &Context,
    command: &str,
    header: &str,
    parent: &str,
    outcome: Outcome<Vec<Task>>,
) -> Result<()> {
    let groups = group_parallel(&outcome.data);
    let mut human = HumanOutput::new(header);
    human.push_summary("Parent", parent);
    for task in &outcome.data {
        let sequence = task.sequence.as_deref().unwrap_or("--");
        human.push_detail(format!("{sequence} {} {}", task.id, task.title));
    }

    let output = Outcome::with_warnings(
        SubtaskOutput {
            parent,
            tasks: outcome.data.iter().map(TaskView::from).collect(),
            groups,
        },
        outcome.warnings.clone(),
    );
    emit_outcome(ctx.output, command, &output, human)
}

/// Patch from command-line fields; empty repeatable lists leave the field alone
fn build_patch(title: Option<String>, fields: TaskFieldArgs) -> Result<TaskPatch> {
    let content = match (fields.content, fields.content_file) {
        (Some(content), _) => Some(content),
        (None, Some(path)) => Some(std::fs::read_to_string(&path)?),
        (None, None) => None,
    };
    let due_date = fields.due.as_deref().map(parse_date).transpose()?;

    Ok(TaskPatch {
        title,
        task_type: fields.task_type,
        status: fields.status.as_deref().map(TaskStatus::normalize),
        priority: fields.priority.as_deref().map(Priority::normalize),
        assigned_to: fields.assignee.map(Some),
        due_date: due_date.map(Some),
        tags: non_empty(fields.tags),
        content,
        parent_task: fields.parent.map(Some),
        depends_on: non_empty(fields.depends_on),
        previous_task: fields.previous.map(Some),
        next_task: fields.next.map(Some),
        sequence: fields.sequence.map(Some),
        ..TaskPatch::default()
    })
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| Error::InvalidArgument(format!("due date '{raw}' is not YYYY-MM-DD: {err}")))
}

fn location_hint(args: LocationArgs) -> Option<Location> {
    if args.phase.is_none() && args.subdirectory.is_none() {
        return None;
    }
    Some(Location::new(args.phase.as_deref(), args.subdirectory.as_deref()))
}

fn task_line(task: &Task) -> String {
    let mut line = format!("[{}][{}] {} {}", task.status, task.priority, task.id, task.title);
    if let Some(phase) = &task.phase {
        line.push_str(&format!(" (phase: {phase})"));
    }
    if let Some(subdirectory) = &task.subdirectory {
        line.push_str(&format!(" ({subdirectory})"));
    }
    line
}

fn push_location(human: &mut HumanOutput, task: &Task) {
    if let Some(phase) = &task.phase {
        human.push_summary("Phase", phase.clone());
    }
    if let Some(subdirectory) = &task.subdirectory {
        human.push_summary("Subdirectory", subdirectory.clone());
    }
}

fn push_relations(human: &mut HumanOutput, task: &Task) {
    let relations = &task.relations;
    if let Some(parent) = &relations.parent_task {
        human.push_summary("Parent", parent.clone());
    }
    if !relations.subtasks.is_empty() {
        human.push_summary("Subtasks", relations.subtasks.join(", "));
    }
    if !relations.depends_on.is_empty() {
        human.push_summary("Depends on", relations.depends_on.join(", "));
    }
    if let Some(previous) = &relations.previous_task {
        human.push_summary("Previous", previous.clone());
    }
    if let Some(next) = &relations.next_task {
        human.push_summary("Next", next.clone());
    }
}

fn view(outcome: &Outcome<Task>) -> Outcome<TaskView<'_>> {
    Outcome::with_warnings(TaskView::from(&outcome.data), outcome.warnings.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_leaves_unset_fields_alone() {
        let fields = TaskFieldArgs {
            status: Some("WIP".to_string()),
            due: Some("2026-03-01".to_string()),
            ..TaskFieldArgs::default()
        };
        let patch = build_patch(None, fields).unwrap();
        assert_eq!(patch.status, Some(TaskStatus::InProgress));
        assert_eq!(
            patch.due_date,
            Some(Some(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()))
        );
        assert!(patch.tags.is_none());
        assert!(patch.depends_on.is_none());
        assert!(!patch.touches_location());
    }

    #[test]
    fn bad_due_date_is_invalid_argument() {
        let fields = TaskFieldArgs {
            due: Some("March 1st".to_string()),
            ..TaskFieldArgs::default()
        };
        let err = build_patch(None, fields).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn empty_location_gives_no_hint() {
        assert_eq!(location_hint(LocationArgs::default()), None);
        let hint = location_hint(LocationArgs {
            phase: Some("alpha".to_string()),
            subdirectory: None,
        });
        assert_eq!(hint, Some(Location::in_phase("alpha")));
    }
}
