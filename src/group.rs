//! Features and areas
//!
//! A grouping is a `feature-<name>` or `area-<name>` directory, either at the
//! tasks root or inside a phase, holding an overview document and the tasks
//! filed under it.

use crate::error::{Error, Result};
use crate::migrate::Removal;
use crate::model::{
    validate_name, Grouping, GroupingKind, Location, Progress, Task, OVERVIEW_ID,
};
use crate::outcome::Outcome;
use crate::store::TaskStore;

/// Where the documents of a grouping live
pub fn grouping_location(kind: GroupingKind, name: &str, phase: Option<&str>) -> Location {
    Location::new(phase, Some(&kind.dir_name(name)))
}

impl TaskStore {
    /// Create the grouping directory and its overview document
    pub fn create_grouping(
        &self,
        kind: GroupingKind,
        name: &str,
        phase: Option<&str>,
        title: &str,
        description: Option<&str>,
    ) -> Result<Outcome<Grouping>> {
        validate_name(kind.as_str(), name)?;
        if let Some(phase) = phase {
            if !self.phase_exists(phase)? {
                return Err(Error::phase_not_found(phase));
            }
        }
        let location = grouping_location(kind, name, phase);
        let dir = self.storage().location_dir(&location);
        if dir.exists() {
            return Err(Error::AlreadyExists {
                kind: kind.as_str(),
                id: name.to_string(),
            });
        }
        std::fs::create_dir_all(&dir)?;

        let title = if title.trim().is_empty() { name } else { title };
        let mut overview = Task::new(OVERVIEW_ID, title);
        overview.task_type = kind.as_str().to_string();
        overview.content = description.unwrap_or_default().to_string();
        let outcome = self.create(overview, Some(&location))?;
        tracing::info!(kind = %kind, name, phase = ?phase, "created grouping");

        let grouping = self.get_grouping(kind, name, phase)?;
        Ok(outcome.map(|_| grouping))
    }

    pub fn get_grouping(
        &self,
        kind: GroupingKind,
        name: &str,
        phase: Option<&str>,
    ) -> Result<Grouping> {
        validate_name(kind.as_str(), name)?;
        let location = grouping_location(kind, name, phase);
        let dir = self.storage().location_dir(&location);
        if !dir.is_dir() {
            return Err(Error::NotFound {
                kind: kind.as_str(),
                id: name.to_string(),
            });
        }

        let mut overview = None;
        let mut tasks = Vec::new();
        for located in self.load_dir(&dir)? {
            if located.task.is_overview {
                if located.path.parent() == Some(dir.as_path()) {
                    overview = Some(located.task);
                }
            } else {
                tasks.push(located.task);
            }
        }
        Ok(Grouping {
            kind,
            name: name.to_string(),
            directory: self.storage().relative(&dir).to_string_lossy().into_owned(),
            phase: phase.map(str::to_string),
            overview,
            progress: Progress::from_tasks(&tasks),
            tasks: tasks.into_iter().map(|task| task.id).collect(),
        })
    }

    /// Groupings at the root and inside every phase, or inside one phase
    pub fn list_groupings(
        &self,
        kind: Option<GroupingKind>,
        phase: Option<&str>,
    ) -> Result<Vec<Grouping>> {
        let scopes: Vec<Option<String>> = match phase {
            Some(phase) => vec![Some(phase.to_string())],
            None => {
                let mut scopes = vec![None];
                scopes.extend(
                    self.storage()
                        .child_dirs(self.storage().root())?
                        .into_iter()
                        .filter(|dir| GroupingKind::parse_dir_name(dir).is_none())
                        .map(Some),
                );
                scopes
            }
        };

        let mut groupings = Vec::new();
        for scope in scopes {
            let dir = self
                .storage()
                .location_dir(&Location::new(scope.as_deref(), None));
            for dir_name in self.storage().child_dirs(&dir)? {
                let Some((found, name)) = GroupingKind::parse_dir_name(&dir_name) else {
                    continue;
                };
                if kind.is_some_and(|kind| kind != found) {
                    continue;
                }
                groupings.push(self.get_grouping(found, name, scope.as_deref())?);
            }
        }
        Ok(groupings)
    }

    /// Remove a grouping directory; see [`crate::migrate::Migrator::delete_grouping`]
    pub fn delete_grouping(
        &self,
        kind: GroupingKind,
        phase: Option<&str>,
        name: &str,
        force: bool,
    ) -> Result<Outcome<Removal>> {
        self.migrator().delete_grouping(kind, phase, name, force)
    }
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
    fn create_grouping_writes_overview() {
        let (_dir, store) = store();
        store.create_phase("alpha", None, None, None).unwrap();
        let grouping = store
            .create_grouping(GroupingKind::Feature, "auth", Some("alpha"), "Auth", Some("Login"))
            .unwrap()
            .into_data();
        assert_eq!(grouping.directory, "alpha/feature-auth");
        let overview = grouping.overview.unwrap();
        assert_eq!(overview.task_type, "feature");
        assert_eq!(overview.content, "Login");
        assert_eq!(grouping.progress, Progress::default());

        let err = store
            .create_grouping(GroupingKind::Feature, "auth", Some("alpha"), "Auth", None)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { kind: "feature", .. }));
    }

    #[test]
    fn grouping_requires_existing_phase() {
        let (_dir, store) = store();
        let err = store
            .create_grouping(GroupingKind::Area, "ui", Some("nope"), "UI", None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn progress_counts_non_overview_tasks() {
        let (_dir, store) = store();
        store
            .create_grouping(GroupingKind::Area, "ui", None, "UI", None)
            .unwrap();
        let location = grouping_location(GroupingKind::Area, "ui", None);
        let mut done = Task::new("a", "A");
        done.status = TaskStatus::Done;
        store.create(done, Some(&location)).unwrap();
        store.create(Task::new("b", "B"), Some(&location)).unwrap();

        let grouping = store.get_grouping(GroupingKind::Area, "ui", None).unwrap();
        assert_eq!(grouping.progress, Progress { completed: 1, total: 2 });
        assert_eq!(grouping.tasks, vec!["a", "b"]);
    }

    #[test]
    fn list_groupings_spans_root_and_phases() {
        let (_dir, store) = store();
        store.create_phase("alpha", None, None, None).unwrap();
        store
            .create_grouping(GroupingKind::Feature, "root", None, "Root", None)
            .unwrap();
        store
            .create_grouping(GroupingKind::Feature, "inner", Some("alpha"), "Inner", None)
            .unwrap();
        store
            .create_grouping(GroupingKind::Area, "ops", Some("alpha"), "Ops", None)
            .unwrap();

        let names: Vec<String> = store
            .list_groupings(Some(GroupingKind::Feature), None)
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["root", "inner"]);
        assert_eq!(store.list_groupings(None, Some("alpha")).unwrap().len(), 2);
    }
}
