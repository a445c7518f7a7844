//! Workflow/Phase Migrator
//!
//! Moves single tasks between locations and moves whole phase or grouping
//! directories. Directory migrations run under the root file lock with every
//! in-process task lock drained, and go through the same steps each time:
//!
//! 1. write a journal naming the source and target
//! 2. copy the source directory to the target
//! 3. rewrite each copied document's `phase`/`subdirectory`
//! 4. update the phase registry (phase renames only)
//! 5. delete the source directory
//! 6. delete the journal
//!
//! A crash anywhere leaves the journal behind. Re-running the same migration,
//! or [`Migrator::resume_pending`], repeats the steps; each one is safe to
//! repeat, so the tree converges on the finished state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::group::grouping_location;
use crate::lock::FileLock;
use crate::model::{validate_name, GroupingKind, Location, Task, TaskPatch};
use crate::outcome::{Outcome, RelationshipWarning, WarningKind};
use crate::phase::validate_phase_id;
use crate::store::TaskStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    RenamePhase,
    RenameGrouping,
    MoveGrouping,
}

/// On-disk record of a directory migration in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationJournal {
    pub kind: MigrationKind,
    pub source: Location,
    pub target: Location,
    pub started_at: DateTime<Utc>,
}

impl MigrationJournal {
    fn same_migration(&self, kind: MigrationKind, source: &Location, target: &Location) -> bool {
        self.kind == kind && &self.source == source && &self.target == target
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub kind: MigrationKind,
    pub source: Location,
    pub target: Location,
    /// Documents found under the target afterwards
    pub tasks: usize,
    /// Documents whose location fields were rewritten
    pub rewritten: usize,
    /// Whether a journal from an interrupted run was picked up
    pub resumed: bool,
}

/// Result of deleting a phase or grouping directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub directory: String,
    pub removed: Vec<String>,
}

pub struct Migrator<'a> {
    store: &'a TaskStore,
}

impl<'a> Migrator<'a> {
    pub(crate) fn new(store: &'a TaskStore) -> Self {
        Self { store }
    }

    // =========================================================================
    // Single tasks
    // =========================================================================

    /// Move a task to another subdirectory and/or phase. `None` for the
    /// phase keeps the current one; `None` for the subdirectory moves the
    /// task to the top of the phase.
    pub fn move_task(
        &self,
        id: &str,
        subdirectory: Option<&str>,
        phase: Option<&str>,
    ) -> Result<Outcome<Task>> {
        if let Some(phase) = phase {
            if !self.store.phase_exists(phase)? {
                return Err(Error::phase_not_found(phase));
            }
        }
        let mut patch = TaskPatch {
            subdirectory: Some(subdirectory.map(str::to_string)),
            ..TaskPatch::default()
        };
        if let Some(phase) = phase {
            patch.phase = Some(Some(phase.to_string()));
        }
        self.store.update(id, &patch, None)
    }

    /// Write `task` at the path its location implies and remove `from`.
    /// Callers hold the task's lock.
    pub(crate) fn relocate(&self, from: &Path, task: &Task) -> Result<PathBuf> {
        let storage = self.store.storage();
        let target = storage.task_path(&task.id, &task.location());
        if target.exists() {
            return Err(Error::LocationConflict {
                path: target,
                reason: format!("a document for {} already exists there", task.id),
            });
        }
        storage.write_task(&target, task)?;
        storage.remove_file(from)?;
        tracing::info!(
            id = %task.id,
            from = %storage.relative(from).display(),
            to = %storage.relative(&target).display(),
            "moved task"
        );
        Ok(target)
    }

    // =========================================================================
    // Directory migrations
    // =========================================================================

    pub fn rename_phase(&self, old: &str, new: &str) -> Result<Outcome<MigrationReport>> {
        validate_name("phase", old)?;
        validate_phase_id(new)?;
        if old == new {
            return Err(Error::InvalidArgument(format!(
                "phase '{old}' already has that id"
            )));
        }
        self.migrate(
            MigrationKind::RenamePhase,
            Location::in_phase(old),
            Location::in_phase(new),
            || Error::phase_not_found(old),
        )
    }

    pub fn rename_grouping(
        &self,
        kind: GroupingKind,
        phase: Option<&str>,
        old: &str,
        new: &str,
    ) -> Result<Outcome<MigrationReport>> {
        validate_name(kind.as_str(), old)?;
        validate_name(kind.as_str(), new)?;
        if old == new {
            return Err(Error::InvalidArgument(format!(
                "{kind} '{old}' already has that name"
            )));
        }
        self.migrate(
            MigrationKind::RenameGrouping,
            grouping_location(kind, old, phase),
            grouping_location(kind, new, phase),
            || grouping_not_found(kind, old),
        )
    }

    /// Move a grouping between phases, or to/from the root with `None`
    pub fn move_grouping(
        &self,
        kind: GroupingKind,
        name: &str,
        from_phase: Option<&str>,
        to_phase: Option<&str>,
    ) -> Result<Outcome<MigrationReport>> {
        validate_name(kind.as_str(), name)?;
        if from_phase == to_phase {
            return Err(Error::InvalidArgument(format!(
                "{kind} '{name}' is already there"
            )));
        }
        if let Some(phase) = to_phase {
            if !self.store.phase_exists(phase)? {
                return Err(Error::phase_not_found(phase));
            }
        }
        self.migrate(
            MigrationKind::MoveGrouping,
            grouping_location(kind, name, from_phase),
            grouping_location(kind, name, to_phase),
            || grouping_not_found(kind, name),
        )
    }

    /// The interrupted migration, if a journal is on disk
    pub fn pending(&self) -> Result<Option<MigrationJournal>> {
        let storage = self.store.storage();
        storage.read_json_opt(&storage.journal_file())
    }

    /// Finish an interrupted migration. `Ok(None)` when nothing is pending.
    pub fn resume_pending(&self) -> Result<Option<Outcome<MigrationReport>>> {
        let Some(journal) = self.pending()? else {
            return Ok(None);
        };
        tracing::info!(kind = ?journal.kind, "resuming interrupted migration");
        let source = journal.source.clone();
        self.migrate(journal.kind, journal.source, journal.target, || {
            Error::LocationConflict {
                path: self.store.storage().location_dir(&source),
                reason: "migration source is missing".to_string(),
            }
        })
        .map(Some)
    }

    fn migrate(
        &self,
        kind: MigrationKind,
        source: Location,
        target: Location,
        missing: impl FnOnce() -> Error,
    ) -> Result<Outcome<MigrationReport>> {
        let store = self.store;
        let storage = store.storage();
        let _file_lock = FileLock::acquire(storage.lock_file(), store.config().lock_timeout_ms)?;
        let _guard = store.locks().lock_all();

        let source_dir = storage.location_dir(&source);
        let target_dir = storage.location_dir(&target);
        let journal_path = storage.journal_file();

        let resumed = match self.pending()? {
            Some(journal) if journal.same_migration(kind, &source, &target) => {
                tracing::info!(
                    source = %storage.relative(&source_dir).display(),
                    target = %storage.relative(&target_dir).display(),
                    "journal found, resuming migration"
                );
                true
            }
            Some(journal) => {
                return Err(Error::LocationConflict {
                    path: journal_path,
                    reason: format!(
                        "another migration is pending ({} -> {})",
                        storage.relative(&storage.location_dir(&journal.source)).display(),
                        storage.relative(&storage.location_dir(&journal.target)).display()
                    ),
                });
            }
            None => {
                if !source_dir.is_dir() {
                    return Err(missing());
                }
                if target_dir.exists() || self.target_registered(kind, &target)? {
                    return Err(Error::LocationConflict {
                        path: target_dir,
                        reason: "target already exists".to_string(),
                    });
                }
                let journal = MigrationJournal {
                    kind,
                    source: source.clone(),
                    target: target.clone(),
                    started_at: Utc::now(),
                };
                storage.write_json(&journal_path, &journal)?;
                tracing::debug!(path = %journal_path.display(), "wrote migration journal");
                false
            }
        };

        if source_dir.is_dir() {
            let copied = storage.copy_dir_recursive(&source_dir, &target_dir)?;
            tracing::debug!(copied, "copied migration source");
        }

        let mut warnings = Vec::new();
        let (tasks, rewritten) = self.relink(&target_dir, &mut warnings)?;

        if kind == MigrationKind::RenamePhase {
            if let (Some(old), Some(new)) = (source.phase.as_deref(), target.phase.as_deref()) {
                let mut registry = store.read_registry()?;
                if registry.rename(old, new) {
                    store.write_registry(&registry)?;
                }
            }
        }

        storage.remove_dir(&source_dir)?;
        if journal_path.exists() {
            storage.remove_file(&journal_path)?;
        }
        tracing::info!(
            kind = ?kind,
            source = %storage.relative(&source_dir).display(),
            target = %storage.relative(&target_dir).display(),
            tasks,
            rewritten,
            "migration complete"
        );

        let report = MigrationReport {
            kind,
            source,
            target,
            tasks,
            rewritten,
            resumed,
        };
        Ok(Outcome::with_warnings(report, warnings))
    }

    fn target_registered(&self, kind: MigrationKind, target: &Location) -> Result<bool> {
        match (kind, target.phase.as_deref()) {
            (MigrationKind::RenamePhase, Some(phase)) => {
                Ok(self.store.read_registry()?.get(phase).is_some())
            }
            _ => Ok(false),
        }
    }

    /// Point every document under `dir` at the location its path implies.
    /// Returns (documents seen, documents rewritten).
    fn relink(
        &self,
        dir: &Path,
        warnings: &mut Vec<RelationshipWarning>,
    ) -> Result<(usize, usize)> {
        let storage = self.store.storage();
        let mut seen = 0;
        let mut rewritten = 0;
        for path in storage.task_files(dir)? {
            let Some(location) = storage.location_of(&path) else {
                continue;
            };
            let mut task = match storage.read_task(&path) {
                Ok(task) => task,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "cannot relink document");
                    warnings.push(RelationshipWarning::new(
                        WarningKind::InverseUpdateFailed,
                        file_stem(&path),
                        None,
                        format!("could not rewrite location of {}: {err}", path.display()),
                    ));
                    continue;
                }
            };
            seen += 1;
            if task.location() != location {
                task.set_location(&location);
                storage.write_task(&path, &task)?;
                rewritten += 1;
            }
        }
        Ok((seen, rewritten))
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Delete a phase directory and its registry entry. A phase that still
    /// holds tasks needs `force`.
    pub fn delete_phase(&self, id: &str, force: bool) -> Result<Outcome<Removal>> {
        validate_name("phase", id)?;
        let store = self.store;
        let _file_lock = FileLock::acquire(
            store.storage().lock_file(),
            store.config().lock_timeout_ms,
        )?;
        let _guard = store.locks().lock_all();

        let mut registry = store.read_registry()?;
        let dir = store.storage().phase_dir(id);
        if !dir.is_dir() && registry.get(id).is_none() {
            return Err(Error::phase_not_found(id));
        }

        let outcome = self.remove_tree(&dir, force)?;
        if registry.remove(id).is_some() {
            store.write_registry(&registry)?;
        }
        Ok(outcome)
    }

    /// Delete a feature or area directory. One that still holds tasks needs
    /// `force`.
    pub fn delete_grouping(
        &self,
        kind: GroupingKind,
        phase: Option<&str>,
        name: &str,
        force: bool,
    ) -> Result<Outcome<Removal>> {
        validate_name(kind.as_str(), name)?;
        let store = self.store;
        let _file_lock = FileLock::acquire(
            store.storage().lock_file(),
            store.config().lock_timeout_ms,
        )?;
        let _guard = store.locks().lock_all();

        let dir = store
            .storage()
            .location_dir(&grouping_location(kind, name, phase));
        if !dir.is_dir() {
            return Err(grouping_not_found(kind, name));
        }
        self.remove_tree(&dir, force)
    }

    /// Remove `dir`. Tasks outside it that still reference removed ids are
    /// reported as dangling, not rewritten.
    fn remove_tree(&self, dir: &Path, force: bool) -> Result<Outcome<Removal>> {
        let store = self.store;
        let storage = store.storage();
        let removed: Vec<String> = store
            .load_dir(dir)?
            .into_iter()
            .filter(|located| !located.task.is_overview)
            .map(|located| located.task.id)
            .collect();
        if !removed.is_empty() && !force {
            return Err(Error::LocationConflict {
                path: dir.to_path_buf(),
                reason: format!(
                    "directory still holds {} task(s); pass force to delete it",
                    removed.len()
                ),
            });
        }

        let gone: HashSet<&str> = removed.iter().map(String::as_str).collect();
        let mut warnings = Vec::new();
        for located in store.load_all()? {
            if located.path.starts_with(dir) {
                continue;
            }
            for referenced in located.task.relations.referenced_ids() {
                if gone.contains(referenced) {
                    warnings.push(RelationshipWarning::new(
                        WarningKind::DanglingReference,
                        located.task.id.clone(),
                        Some(referenced),
                        format!("{} still references deleted task {referenced}", located.task.id),
                    ));
                }
            }
        }

        storage.remove_dir(dir)?;
        let directory = storage.relative(dir).to_string_lossy().into_owned();
        tracing::info!(directory = %directory, tasks = removed.len(), "deleted directory");
        Ok(Outcome::with_warnings(Removal { directory, removed }, warnings))
    }
}

fn grouping_not_found(kind: GroupingKind, name: &str) -> Error {
    Error::NotFound {
        kind: kind.as_str(),
        id: name.to_string(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::TaskStatus;
    use tempfile::TempDir;

    fn store() -> (TempDir, TaskStore) {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(Config::with_root(dir.path().join("tasks"))).unwrap();
        (dir, store)
    }

    #[test]
    fn relocate_refuses_to_overwrite() {
        let (_dir, store) = store();
        store.create_phase("alpha", None, None, None).unwrap();
        store.create_phase("beta", None, None, None).unwrap();
        store
            .create(Task::new("t1", "One"), Some(&Location::in_phase("alpha")))
            .unwrap();

        let mut moved = store.get("t1", None).unwrap();
        moved.set_location(&Location::in_phase("beta"));
        let target = store.storage().task_path("t1", &Location::in_phase("beta"));
        std::fs::write(&target, "---\nid: t1\ntitle: Squatter\n---\n").unwrap();

        let from = store.storage().task_path("t1", &Location::in_phase("alpha"));
        let err = store.migrator().relocate(&from, &moved).unwrap_err();
        assert!(matches!(err, Error::LocationConflict { .. }));
        assert!(from.is_file());
    }

    #[test]
    fn move_task_keeps_phase_when_unset() {
        let (_dir, store) = store();
        store.create_phase("alpha", None, None, None).unwrap();
        store
            .create(Task::new("t1", "One"), Some(&Location::in_phase("alpha")))
            .unwrap();

        let moved = store
            .migrator()
            .move_task("t1", Some("feature-auth"), None)
            .unwrap()
            .into_data();
        assert_eq!(moved.phase.as_deref(), Some("alpha"));
        assert_eq!(moved.subdirectory.as_deref(), Some("feature-auth"));
        assert!(store
            .storage()
            .root()
            .join("alpha/feature-auth/t1.md")
            .is_file());
        assert!(!store.storage().root().join("alpha/t1.md").exists());
    }

    #[test]
    fn move_task_to_missing_phase_fails() {
        let (_dir, store) = store();
        store.create(Task::new("t1", "One"), None).unwrap();
        let err = store.migrator().move_task("t1", None, Some("ghost")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn rename_grouping_rewrites_subdirectory() {
        let (_dir, store) = store();
        store
            .create_grouping(GroupingKind::Feature, "old", None, "Old", None)
            .unwrap();
        let location = grouping_location(GroupingKind::Feature, "old", None);
        store.create(Task::new("t1", "One"), Some(&location)).unwrap();

        let report = store
            .migrator()
            .rename_grouping(GroupingKind::Feature, None, "old", "new")
            .unwrap()
            .into_data();
        assert_eq!(report.tasks, 2);
        assert!(!report.resumed);
        let task = store.get("t1", None).unwrap();
        assert_eq!(task.subdirectory.as_deref(), Some("feature-new"));
        assert!(store.migrator().pending().unwrap().is_none());
    }

    #[test]
    fn foreign_journal_blocks_other_migrations() {
        let (_dir, store) = store();
        store.create_phase("alpha", None, None, None).unwrap();
        store.create_phase("gamma", None, None, None).unwrap();
        let journal = MigrationJournal {
            kind: MigrationKind::RenamePhase,
            source: Location::in_phase("gamma"),
            target: Location::in_phase("delta"),
            started_at: Utc::now(),
        };
        store
            .storage()
            .write_json(&store.storage().journal_file(), &journal)
            .unwrap();

        let err = store.migrator().rename_phase("alpha", "beta").unwrap_err();
        assert!(matches!(err, Error::LocationConflict { .. }));
    }

    #[test]
    fn delete_grouping_reports_dangling_references() {
        let (_dir, store) = store();
        store
            .create_grouping(GroupingKind::Area, "ops", None, "Ops", None)
            .unwrap();
        let location = grouping_location(GroupingKind::Area, "ops", None);
        let mut inside = Task::new("inside", "Inside");
        inside.status = TaskStatus::Done;
        store.create(inside, Some(&location)).unwrap();
        let mut outside = Task::new("outside", "Outside");
        outside.relations.depends_on = vec!["inside".to_string()];
        store.create(outside, None).unwrap();

        let err = store
            .delete_grouping(GroupingKind::Area, None, "ops", false)
            .unwrap_err();
        assert!(matches!(err, Error::LocationConflict { .. }));

        let outcome = store
            .delete_grouping(GroupingKind::Area, None, "ops", true)
            .unwrap();
        assert_eq!(outcome.data.removed, vec!["inside"]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::DanglingReference);
        assert_eq!(
            store.get("outside", None).unwrap().relations.depends_on,
            vec!["inside"]
        );
    }
}
