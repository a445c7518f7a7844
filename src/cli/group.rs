//! taskmd feature/area command implementations.
//!
//! Both command groups share one implementation parameterized by kind.

use serde::Serialize;

use crate::cli::{Context, GroupCommands};
use crate::error::Result;
use crate::model::{Grouping, GroupingKind};
use crate::output::{emit_outcome, emit_success, HumanOutput};

#[derive(Serialize)]
struct GroupingListOutput<'a> {
    total: usize,
    groupings: &'a [Grouping],
}

pub(crate) fn run(ctx: &Context, kind: GroupingKind, command: GroupCommands) -> Result<()> {
    match command {
        GroupCommands::Create {
            name,
            phase,
            title,
            description,
        } => {
            let title = title.unwrap_or_else(|| name.clone());
            let outcome = ctx.store.create_grouping(
                kind,
                &name,
                phase.as_deref(),
                &title,
                description.as_deref(),
            )?;
            let mut human = HumanOutput::new(format!("{} created", capitalized(kind)));
            push_grouping(&mut human, &outcome.data);
            emit_outcome(ctx.output, &command_name(kind, "create"), &outcome, human)
        }
        GroupCommands::Get { name, phase } => {
            let grouping = ctx.store.get_grouping(kind, &name, phase.as_deref())?;
            let mut human = HumanOutput::new(format!("{} {}", capitalized(kind), grouping.name));
            push_grouping(&mut human, &grouping);
            for task in &grouping.tasks {
                human.push_detail(task.clone());
            }
            emit_success(
                ctx.output,
                &command_name(kind, "get"),
                &grouping,
                Some(&human),
            )
        }
        GroupCommands::List { phase } => {
            let groupings = ctx.store.list_groupings(Some(kind), phase.as_deref())?;
            let mut human = HumanOutput::new(format!("{}s", capitalized(kind)));
            human.push_summary("Total", groupings.len().to_string());
            for grouping in &groupings {
                human.push_detail(format!(
                    "{} {}/{} done ({})",
                    grouping.name,
                    grouping.progress.completed,
                    grouping.progress.total,
                    grouping.directory
                ));
            }
            let output = GroupingListOutput {
                total: groupings.len(),
                groupings: &groupings,
            };
            emit_success(
                ctx.output,
                &command_name(kind, "list"),
                &output,
                Some(&human),
            )
        }
        GroupCommands::Rename { old, new, phase } => {
            let outcome = ctx
                .store
                .migrator()
                .rename_grouping(kind, phase.as_deref(), &old, &new)?;
            let mut human = HumanOutput::new(format!("{} renamed", capitalized(kind)));
            human.push_summary("From", old);
            human.push_summary("To", new);
            human.push_summary("Tasks", outcome.data.tasks.to_string());
            emit_outcome(ctx.output, &command_name(kind, "rename"), &outcome, human)
        }
        GroupCommands::Move { name, from, to } => {
            let outcome = ctx.store.migrator().move_grouping(
                kind,
                &name,
                from.as_deref(),
                to.as_deref(),
            )?;
            let mut human = HumanOutput::new(format!("{} moved", capitalized(kind)));
            human.push_summary("Name", name);
            human.push_summary("From", from.unwrap_or_else(|| "(root)".to_string()));
            human.push_summary("To", to.unwrap_or_else(|| "(root)".to_string()));
            human.push_summary("Tasks", outcome.data.tasks.to_string());
            emit_outcome(ctx.output, &command_name(kind, "move"), &outcome, human)
        }
        GroupCommands::Delete { name, phase, force } => {
            let outcome = ctx
                .store
                .delete_grouping(kind, phase.as_deref(), &name, force)?;
            let mut human = HumanOutput::new(format!("{} deleted", capitalized(kind)));
            human.push_summary("Directory", outcome.data.directory.clone());
            human.push_summary("Tasks removed", outcome.data.removed.len().to_string());
            emit_outcome(ctx.output, &command_name(kind, "delete"), &outcome, human)
        }
    }
}

fn command_name(kind: GroupingKind, sub: &str) -> String {
    format!("{kind} {sub}")
}

fn capitalized(kind: GroupingKind) -> &'static str {
    match kind {
        GroupingKind::Feature => "Feature",
        GroupingKind::Area => "Area",
    }
}

fn push_grouping(human: &mut HumanOutput, grouping: &Grouping) {
    human.push_summary("Name", grouping.name.clone());
    human.push_summary("Directory", grouping.directory.clone());
    if let Some(phase) = &grouping.phase {
        human.push_summary("Phase", phase.clone());
    }
    if let Some(overview) = &grouping.overview {
        human.push_summary("Title", overview.title.clone());
    }
    human.push_summary(
        "Progress",
        format!(
            "{}/{} ({:.0}%)",
            grouping.progress.completed,
            grouping.progress.total,
            grouping.progress.ratio() * 100.0
        ),
    );
}
