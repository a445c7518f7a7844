//! taskmd check: relationship audit plus interrupted-migration report.

use serde::Serialize;

use crate::cli::Context;
use crate::error::Result;
use crate::migrate::{MigrationJournal, MigrationReport};
use crate::outcome::Outcome;
use crate::output::{emit_outcome, HumanOutput};
use crate::relations::AuditIssue;

#[derive(Serialize)]
struct CheckOutput {
    consistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_migration: Option<MigrationJournal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resumed: Option<MigrationReport>,
    issues: Vec<AuditIssue>,
}

pub(crate) fn run(ctx: &Context, resume: bool) -> Result<()> {
    let migrator = ctx.store.migrator();
    let mut warnings = Vec::new();
    let resumed = if resume {
        migrator.resume_pending()?.map(|outcome| {
            warnings.extend(outcome.warnings);
            outcome.data
        })
    } else {
        None
    };
    let pending_migration = migrator.pending()?;
    let issues = ctx.store.audit()?;

    let mut human = HumanOutput::new(if issues.is_empty() && pending_migration.is_none() {
        "Task tree is consistent"
    } else {
        "Task tree needs attention"
    });
    human.push_summary("Issues", issues.len().to_string());
    if let Some(report) = &resumed {
        human.push_summary(
            "Resumed migration",
            format!("{} task(s), {} rewritten", report.tasks, report.rewritten),
        );
    }
    if let Some(journal) = &pending_migration {
        human.push_warning(format!(
            "migration started {} is unfinished",
            journal.started_at.to_rfc3339()
        ));
        human.push_next_step("taskmd check --resume");
    }
    for issue in &issues {
        human.push_detail(format!("[{:?}] {}", issue.kind, issue.message));
    }

    let output = CheckOutput {
        consistent: issues.is_empty() && pending_migration.is_none(),
        pending_migration,
        resumed,
        issues,
    };
    emit_outcome(ctx.output, "check", &Outcome::with_warnings(output, warnings), human)
}
