//! Task Store
//!
//! Resolves task ids to documents under the tasks root and performs the
//! primary create/get/update/delete writes. Inverse relationship edges are
//! handed to [`RelationshipMaintainer`]; location changes are handed to the
//! [`Migrator`].
//!
//! Every mutation first computes the set of ids it may write (the task plus
//! its old and new neighbours), locks that set in one step, then re-computes
//! it under the lock. If the set grew in between, the locks are released and
//! the whole thing is retried.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use ulid::Ulid;

use crate::config::{Config, IdConfig, IdFormat};
use crate::error::{Error, Result};
use crate::lock::TaskLocks;
use crate::migrate::Migrator;
use crate::model::{validate_task_id, Location, Task, TaskPatch, OVERVIEW_ID};
use crate::outcome::Outcome;
use crate::relations::RelationshipMaintainer;
use crate::storage::Storage;

const MAX_LOCK_ATTEMPTS: usize = 8;
const MAX_GENERATED_ID_ATTEMPTS: usize = 16;
const FALLBACK_SLUG: &str = "task";

/// A task together with the file it was read from
#[derive(Debug, Clone)]
pub struct Located {
    pub task: Task,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    storage: Storage,
    config: Config,
    locks: Arc<TaskLocks>,
}

impl TaskStore {
    pub fn new(config: Config) -> Self {
        Self {
            storage: Storage::new(config.tasks_root.clone()),
            config,
            locks: Arc::new(TaskLocks::new()),
        }
    }

    /// Build a store and make sure its root directory exists
    pub fn open(config: Config) -> Result<Self> {
        let store = Self::new(config);
        store.storage.init()?;
        Ok(store)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub(crate) fn locks(&self) -> &TaskLocks {
        &self.locks
    }

    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(self)
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Read a document, filling an absent location from where the file sits
    pub(crate) fn read_at(&self, path: &Path) -> Result<Task> {
        let mut task = self.storage.read_task(path)?;
        if task.phase.is_none() && task.subdirectory.is_none() {
            if let Some(location) = self.storage.location_of(path) {
                task.set_location(&location);
            }
        }
        if task.id == OVERVIEW_ID {
            task.is_overview = true;
        }
        Ok(task)
    }

    /// Find the document for `id`. The hint is tried first; on a miss the
    /// whole tree is searched, by file name and then by metadata id.
    pub fn locate(&self, id: &str, hint: Option<&Location>) -> Result<Located> {
        validate_task_id(id)?;
        if let Some(hint) = hint {
            let path = self.storage.task_path(id, hint);
            if path.is_file() {
                let task = self.read_at(&path)?;
                return Ok(Located { task, path });
            }
            tracing::debug!(id, "location hint missed, searching tree");
        }

        for path in self.storage.files_named(id)? {
            match self.read_at(&path) {
                Ok(task) if task.id == id => return Ok(Located { task, path }),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable document")
                }
            }
        }

        // Hand-written documents may not be named after their id.
        self.load_all()?
            .into_iter()
            .find(|located| located.task.id == id)
            .ok_or_else(|| Error::task_not_found(id))
    }

    pub fn get(&self, id: &str, hint: Option<&Location>) -> Result<Task> {
        self.locate(id, hint).map(|located| located.task)
    }

    /// Every readable document under the root
    pub fn load_all(&self) -> Result<Vec<Located>> {
        self.load_dir(self.storage.root())
    }

    /// Every readable document under `dir`; unreadable ones are logged and skipped
    pub fn load_dir(&self, dir: &Path) -> Result<Vec<Located>> {
        let mut tasks = Vec::new();
        for path in self.storage.task_files(dir)? {
            match self.read_at(&path) {
                Ok(task) => tasks.push(Located { task, path }),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable document")
                }
            }
        }
        Ok(tasks)
    }

    // =========================================================================
    // Locking
    // =========================================================================

    /// Lock the ids `plan` reports, re-check the plan under the lock, then run.
    pub(crate) fn with_locked<T>(
        &self,
        plan: impl Fn(&Self) -> Result<BTreeSet<String>>,
        run: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<T> {
        for attempt in 0..MAX_LOCK_ATTEMPTS {
            let ids = plan(self)?;
            let guard = self.locks.lock_ids(ids.iter().cloned());
            let replanned = plan(self)?;
            if guard.covers_all(&replanned) {
                return run(self);
            }
            tracing::debug!(attempt, "neighbour set changed while locking, retrying");
        }
        Err(Error::LockFailed(self.storage.lock_file()))
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Write a new task and link its neighbours back to it.
    ///
    /// An empty id is generated from the configured format. `hint`, when
    /// given, overrides the task's own phase/subdirectory.
    pub fn create(&self, task: Task, hint: Option<&Location>) -> Result<Outcome<Task>> {
        let generated = task.id.trim().is_empty();
        let mut attempts = 0;
        loop {
            let mut candidate = task.clone();
            if generated {
                candidate.id = self.generate_id(&candidate.title)?;
            }
            match self.create_once(candidate, hint) {
                Err(Error::AlreadyExists { .. })
                    if generated && attempts + 1 < MAX_GENERATED_ID_ATTEMPTS =>
                {
                    attempts += 1;
                    tracing::debug!(attempts, "generated id was taken, retrying");
                }
                result => return result,
            }
        }
    }

    fn create_once(&self, mut task: Task, hint: Option<&Location>) -> Result<Outcome<Task>> {
        task.id = task.id.trim().to_string();
        validate_task_id(&task.id)?;
        if task.title.trim().is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
        if task.id == OVERVIEW_ID {
            task.is_overview = true;
        }
        if let Some(hint) = hint {
            task.set_location(hint);
        }
        task.location().validate()?;
        validate_relations(&task)?;

        let id = task.id.clone();
        let relations = task.relations.clone();
        self.with_locked(
            |store| {
                let mut ids = RelationshipMaintainer::touched_ids(store, None, &relations);
                ids.insert(id.clone());
                Ok(ids)
            },
            |store| store.create_locked(task),
        )
    }

    fn create_locked(&self, mut task: Task) -> Result<Outcome<Task>> {
        let path = self.storage.task_path(&task.id, &task.location());
        if path.exists() || (!task.is_overview && !self.storage.files_named(&task.id)?.is_empty())
        {
            return Err(Error::AlreadyExists {
                kind: "task",
                id: task.id,
            });
        }
        RelationshipMaintainer::check_cycles(self, &task.id, &task.relations)?;

        let now = Utc::now();
        task.created_date.get_or_insert(now);
        task.updated_date.get_or_insert(now);
        if let Some(parent) = task.relations.parent_task.as_deref() {
            task.sequence = self.sequence_under(parent, &task.id, task.sequence.as_deref())?;
        }

        self.storage.write_task(&path, &task)?;
        tracing::info!(id = %task.id, path = %path.display(), "created task");

        let mut maintainer = RelationshipMaintainer::new(self);
        maintainer.check_dependencies(&task);
        maintainer.propagate(None, &task);
        Ok(maintainer.finish(task))
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Apply a partial patch. A changed phase or subdirectory moves the file.
    pub fn update(
        &self,
        id: &str,
        patch: &TaskPatch,
        hint: Option<&Location>,
    ) -> Result<Outcome<Task>> {
        validate_task_id(id)?;
        self.with_locked(
            |store| {
                let current = store.locate(id, hint)?;
                let mut next = current.task.clone();
                patch.apply(&mut next);
                let mut ids = RelationshipMaintainer::touched_ids(
                    store,
                    Some(&current.task.relations),
                    &next.relations,
                );
                ids.insert(id.to_string());
                Ok(ids)
            },
            |store| store.update_locked(id, patch, hint),
        )
    }

    fn update_locked(
        &self,
        id: &str,
        patch: &TaskPatch,
        hint: Option<&Location>,
    ) -> Result<Outcome<Task>> {
        let current = self.locate(id, hint)?;
        let mut task = current.task.clone();
        patch.apply(&mut task);
        if task.title.trim().is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
        task.location().validate()?;
        validate_relations(&task)?;

        let before = &current.task.relations;
        let after = &task.relations;
        if before.parent_task != after.parent_task
            || before.depends_on != after.depends_on
            || before.subtasks != after.subtasks
        {
            RelationshipMaintainer::check_cycles(self, id, after)?;
        }

        if before.parent_task != after.parent_task {
            if let Some(parent) = after.parent_task.clone() {
                task.sequence = self.sequence_under(&parent, id, task.sequence.as_deref())?;
            }
        }

        task.touch();
        let target = self.storage.task_path(id, &task.location());
        let path = if patch.touches_location() && target != current.path {
            self.migrator().relocate(&current.path, &task)?
        } else {
            self.storage.write_task(&current.path, &task)?;
            current.path.clone()
        };
        tracing::info!(id, path = %path.display(), "updated task");

        let mut maintainer = RelationshipMaintainer::new(self);
        if task.relations.depends_on != current.task.relations.depends_on {
            maintainer.check_dependencies(&task);
        }
        maintainer.propagate(Some(&current.task), &task);
        Ok(maintainer.finish(task))
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Sever every edge pointing at the task, then remove its file.
    /// Returns the removed task.
    pub fn delete(&self, id: &str, hint: Option<&Location>) -> Result<Outcome<Task>> {
        validate_task_id(id)?;
        self.with_locked(
            |store| {
                let current = store.locate(id, hint)?;
                let mut ids = RelationshipMaintainer::severed_ids(store, &current.task)?;
                ids.insert(id.to_string());
                Ok(ids)
            },
            |store| store.delete_locked(id, hint),
        )
    }

    fn delete_locked(&self, id: &str, hint: Option<&Location>) -> Result<Outcome<Task>> {
        let current = self.locate(id, hint)?;
        let subtasks = &current.task.relations.subtasks;
        if self.config.relations.block_delete_with_subtasks && !subtasks.is_empty() {
            return Err(Error::LocationConflict {
                path: current.path,
                reason: format!("task {id} still has {} subtask(s)", subtasks.len()),
            });
        }

        let mut maintainer = RelationshipMaintainer::new(self);
        maintainer.sever(&current.task);
        self.storage.remove_file(&current.path)?;
        tracing::info!(id, path = %current.path.display(), "deleted task");
        Ok(maintainer.finish(current.task))
    }

    // =========================================================================
    // Id generation
    // =========================================================================

    /// Next id in the configured format, unique among existing file stems
    pub fn generate_id(&self, title: &str) -> Result<String> {
        let ids = &self.config.ids;
        let id = match ids.format {
            IdFormat::Sequential => {
                let prefix = ids.prefix.trim();
                let next = self
                    .existing_ids()?
                    .iter()
                    .filter_map(|id| sequential_number(id, prefix))
                    .max()
                    .unwrap_or(0)
                    + 1;
                format!("{prefix}-{next:03}")
            }
            IdFormat::Slug => unique_slug(&slugify(title, ids), &self.existing_ids()?),
            IdFormat::Ulid => Ulid::new().to_string().to_lowercase(),
        };
        Ok(id)
    }

    fn existing_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .storage
            .task_files(self.storage.root())?
            .iter()
            .filter_map(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| stem != OVERVIEW_ID)
            .collect())
    }
}

/// Every referenced id must be usable as a file stem
fn validate_relations(task: &Task) -> Result<()> {
    for related in task.relations.referenced_ids() {
        validate_task_id(related)?;
    }
    task.relations.validate_for(&task.id)
}

fn sequential_number(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.strip_prefix('-')?.parse().ok()
}

/// Lowercase title words without stop words, joined by `-`
fn slugify(title: &str, ids: &IdConfig) -> String {
    let mut slug = String::new();
    let words = title
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty() && !ids.is_stop_word(word))
        .map(|word| word.to_ascii_lowercase());
    for word in words {
        let needed = if slug.is_empty() {
            word.len()
        } else {
            word.len() + 1
        };
        if slug.len() + needed > ids.max_slug_len {
            if slug.is_empty() {
                slug.push_str(&word[..ids.max_slug_len]);
            }
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word);
    }
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

fn unique_slug(base: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(base) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !existing.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;
    use tempfile::TempDir;

    fn store_with(format: IdFormat) -> (TempDir, TaskStore) {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_root(dir.path().join("tasks"));
        config.ids.format = format;
        let store = TaskStore::open(config).unwrap();
        (dir, store)
    }

    #[test]
    fn create_sets_dates_and_location() {
        let (_dir, store) = store_with(IdFormat::Sequential);
        let created = store
            .create(Task::new("", "First"), Some(&Location::in_phase("alpha")))
            .unwrap()
            .into_data();
        assert_eq!(created.id, "TASK-001");
        assert!(created.created_date.is_some());
        assert_eq!(created.phase.as_deref(), Some("alpha"));
        assert!(store.storage().root().join("alpha/TASK-001.md").is_file());

        let second = store.create(Task::new("", "Second"), None).unwrap().into_data();
        assert_eq!(second.id, "TASK-002");
    }

    #[test]
    fn create_rejects_duplicate_ids_anywhere() {
        let (_dir, store) = store_with(IdFormat::Sequential);
        store.create(Task::new("a", "A"), None).unwrap();
        let err = store
            .create(Task::new("a", "Again"), Some(&Location::in_phase("beta")))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn overview_ids_are_unique_per_directory_only() {
        let (_dir, store) = store_with(IdFormat::Sequential);
        let first = store
            .create(Task::new(OVERVIEW_ID, "Alpha"), Some(&Location::in_phase("alpha")))
            .unwrap()
            .into_data();
        assert!(first.is_overview);
        store
            .create(Task::new(OVERVIEW_ID, "Beta"), Some(&Location::in_phase("beta")))
            .unwrap();
        let beta = store
            .get(OVERVIEW_ID, Some(&Location::in_phase("beta")))
            .unwrap();
        assert_eq!(beta.title, "Beta");
    }

    #[test]
    fn get_falls_back_when_hint_misses() {
        let (_dir, store) = store_with(IdFormat::Sequential);
        store
            .create(Task::new("x", "X"), Some(&Location::in_phase("alpha")))
            .unwrap();
        let found = store.get("x", Some(&Location::in_phase("wrong"))).unwrap();
        assert_eq!(found.phase.as_deref(), Some("alpha"));
        assert!(store.get("missing", None).unwrap_err().is_not_found());
    }

    #[test]
    fn get_finds_documents_not_named_after_their_id() {
        let (_dir, store) = store_with(IdFormat::Sequential);
        let path = store.storage().root().join("alpha/renamed.md");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "---\nid: real\ntitle: Real\ntype: task\nstatus: todo\n---\n").unwrap();
        let located = store.locate("real", None).unwrap();
        assert_eq!(located.path, path);
        assert_eq!(located.task.phase.as_deref(), Some("alpha"));
    }

    #[test]
    fn update_stamps_and_moves_on_location_change() {
        let (_dir, store) = store_with(IdFormat::Sequential);
        let created = store.create(Task::new("t", "T"), None).unwrap().into_data();
        let patch = TaskPatch {
            status: Some(TaskStatus::InProgress),
            phase: Some(Some("beta".to_string())),
            ..TaskPatch::default()
        };
        let updated = store.update("t", &patch, None).unwrap().into_data();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert!(updated.updated_date >= created.updated_date);
        assert!(store.storage().root().join("beta/t.md").is_file());
        assert!(!store.storage().root().join("t.md").exists());
    }

    #[test]
    fn slug_ids_drop_stop_words_and_avoid_collisions() {
        let (_dir, store) = store_with(IdFormat::Slug);
        let first = store
            .create(Task::new("", "Fix the login page"), None)
            .unwrap()
            .into_data();
        assert_eq!(first.id, "fix-login-page");
        let second = store
            .create(Task::new("", "Fix the login page"), None)
            .unwrap()
            .into_data();
        assert_eq!(second.id, "fix-login-page-2");
    }

    #[test]
    fn ulid_ids_are_lowercase() {
        let (_dir, store) = store_with(IdFormat::Ulid);
        let id = store.generate_id("anything").unwrap();
        assert_eq!(id.len(), 26);
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn slugify_truncates_at_word_boundary() {
        let mut ids = IdConfig::default();
        ids.max_slug_len = 10;
        assert_eq!(slugify("alpha beta gamma", &ids), "alpha-beta");
        assert_eq!(slugify("supercalifragilistic", &ids), "supercalif");
        assert_eq!(slugify("!!!", &ids), FALLBACK_SLUG);
    }

    #[test]
    fn delete_can_be_blocked_by_subtasks() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_root(dir.path().join("tasks"));
        config.relations.block_delete_with_subtasks = true;
        let store = TaskStore::open(config).unwrap();
        store.create(Task::new("p", "Parent"), None).unwrap();
        let mut child = Task::new("c", "Child");
        child.relations.parent_task = Some("p".to_string());
        store.create(child, None).unwrap();

        let err = store.delete("p", None).unwrap_err();
        assert!(matches!(err, Error::LocationConflict { .. }));
        assert!(store.get("p", None).is_ok());
    }
}
