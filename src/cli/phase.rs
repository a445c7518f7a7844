//! taskmd phase command implementations.

use serde::Serialize;

use crate::cli::{Context, PhaseCommands};
use crate::error::Result;
use crate::model::Phase;
use crate::output::{emit_outcome, emit_success, HumanOutput};
use crate::phase::PhaseUpdate;

#[derive(Serialize)]
struct PhaseListOutput<'a> {
    total: usize,
    phases: &'a [Phase],
}

pub(crate) fn run(ctx: &Context, command: PhaseCommands) -> Result<()> {
    match command {
        PhaseCommands::Create {
            id,
            name,
            description,
            order,
        } => {
            let outcome =
                ctx.store
                    .create_phase(&id, name.as_deref(), description.as_deref(), order)?;
            let mut human = HumanOutput::new("Phase created");
            push_phase(&mut human, &outcome.data);
            emit_outcome(ctx.output, "phase create", &outcome, human)
        }
        PhaseCommands::Get { id } => {
            let phase = ctx.store.get_phase(&id)?;
            let mut human = HumanOutput::new(format!("Phase {}", phase.id));
            push_phase(&mut human, &phase);
            for task in &phase.tasks {
                human.push_detail(task.clone());
            }
            emit_success(ctx.output, "phase get", &phase, Some(&human))
        }
        PhaseCommands::List => {
            let phases = ctx.store.list_phases()?;
            let mut human = HumanOutput::new("Phases");
            human.push_summary("Total", phases.len().to_string());
            for phase in &phases {
                human.push_detail(format!(
                    "{:>3} {} [{}] {} ({} task(s))",
                    phase.order,
                    phase.id,
                    phase.status,
                    phase.name,
                    phase.tasks.len()
                ));
            }
            let output = PhaseListOutput {
                total: phases.len(),
                phases: &phases,
            };
            emit_success(ctx.output, "phase list", &output, Some(&human))
        }
        PhaseCommands::Update {
            id,
            name,
            description,
            clear_description,
            order,
        } => {
            let update = PhaseUpdate {
                id: None,
                name,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
                order,
            };
            let phase = ctx.store.update_phase(&id, &update)?;
            let mut human = HumanOutput::new("Phase updated");
            push_phase(&mut human, &phase);
            emit_success(ctx.output, "phase update", &phase, Some(&human))
        }
        PhaseCommands::Rename { old, new } => {
            let outcome = ctx.store.migrator().rename_phase(&old, &new)?;
            let report = &outcome.data;
            let mut human = HumanOutput::new("Phase renamed");
            human.push_summary("From", old);
            human.push_summary("To", new);
            human.push_summary("Tasks", report.tasks.to_string());
            human.push_summary("Rewritten", report.rewritten.to_string());
            if report.resumed {
                human.push_summary("Resumed", "yes");
            }
            emit_outcome(ctx.output, "phase rename", &outcome, human)
        }
        PhaseCommands::Delete { id, force } => {
            let outcome = ctx.store.delete_phase(&id, force)?;
            let mut human = HumanOutput::new("Phase deleted");
            human.push_summary("Directory", outcome.data.directory.clone());
            human.push_summary("Tasks removed", outcome.data.removed.len().to_string());
            emit_outcome(ctx.output, "phase delete", &outcome, human)
        }
    }
}

fn push_phase(human: &mut HumanOutput, phase: &Phase) {
    human.push_summary("ID", phase.id.clone());
    human.push_summary("Name", phase.name.clone());
    human.push_summary("Status", phase.status.to_string());
    human.push_summary("Order", phase.order.to_string());
    human.push_summary("Tasks", phase.tasks.len().to_string());
    if let Some(description) = &phase.description {
        human.push_summary("Description", description.clone());
    }
}
