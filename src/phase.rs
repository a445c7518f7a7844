//! Phases
//!
//! A phase is a directory directly under the tasks root plus an optional
//! entry in `phases.json` carrying its display name, description and order.
//! Directories without a registry entry still count as phases and sort after
//! the registered ones. A phase's status is derived from its tasks, never
//! stored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::FileLock;
use crate::migrate::Removal;
use crate::model::{validate_name, GroupingKind, Location, Phase, PhaseStatus, Task, OVERVIEW_ID};
use crate::outcome::Outcome;
use crate::store::TaskStore;

/// Task type given to phase overview documents
const PHASE_TASK_TYPE: &str = "phase";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PhaseEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order: u32,
}

/// Contents of `phases.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PhaseRegistry {
    #[serde(default)]
    pub phases: Vec<PhaseEntry>,
}

impl PhaseRegistry {
    pub fn get(&self, id: &str) -> Option<&PhaseEntry> {
        self.phases.iter().find(|entry| entry.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut PhaseEntry> {
        self.phases.iter_mut().find(|entry| entry.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<PhaseEntry> {
        let index = self.phases.iter().position(|entry| entry.id == id)?;
        Some(self.phases.remove(index))
    }

    /// Point the entry for `old` at `new`; a name that mirrored the id follows it
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        match self.get_mut(old) {
            Some(entry) => {
                if entry.name == old {
                    entry.name = new.to_string();
                }
                entry.id = new.to_string();
                true
            }
            None => false,
        }
    }

    fn next_order(&self) -> u32 {
        self.phases
            .iter()
            .map(|entry| entry.order + 1)
            .max()
            .unwrap_or(1)
    }

    fn sort(&mut self) {
        self.phases
            .sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    }
}

/// Partial update of a phase. `id` renames the phase directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseUpdate {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub order: Option<u32>,
}

/// Phase ids may not look like grouping directories
pub(crate) fn validate_phase_id(id: &str) -> Result<()> {
    validate_name("phase", id)?;
    if GroupingKind::parse_dir_name(id).is_some() {
        return Err(Error::InvalidIdentifier(format!(
            "phase '{id}' uses a reserved feature/area prefix"
        )));
    }
    Ok(())
}

impl TaskStore {
    pub(crate) fn read_registry(&self) -> Result<PhaseRegistry> {
        Ok(self
            .storage()
            .read_json_opt(&self.storage().registry_file())?
            .unwrap_or_default())
    }

    pub(crate) fn write_registry(&self, registry: &PhaseRegistry) -> Result<()> {
        self.storage()
            .write_json(&self.storage().registry_file(), registry)
    }

    fn registry_lock(&self) -> Result<FileLock> {
        FileLock::acquire(self.storage().lock_file(), self.config().lock_timeout_ms)
    }

    pub fn phase_exists(&self, id: &str) -> Result<bool> {
        Ok(self.storage().phase_dir(id).is_dir() || self.read_registry()?.get(id).is_some())
    }

    /// Phase ids in display order with their registry entries
    fn ordered_phases(&self) -> Result<Vec<(String, Option<PhaseEntry>)>> {
        let mut registry = self.read_registry()?;
        registry.sort();
        let mut phases: Vec<(String, Option<PhaseEntry>)> = registry
            .phases
            .iter()
            .map(|entry| (entry.id.clone(), Some(entry.clone())))
            .collect();
        for dir in self.storage().child_dirs(self.storage().root())? {
            if GroupingKind::parse_dir_name(&dir).is_none() && registry.get(&dir).is_none() {
                phases.push((dir, None));
            }
        }
        Ok(phases)
    }

    /// Position of each phase in display order
    pub(crate) fn phase_rank(&self) -> Result<HashMap<String, usize>> {
        Ok(self
            .ordered_phases()?
            .into_iter()
            .enumerate()
            .map(|(rank, (id, _))| (id, rank))
            .collect())
    }

    /// Register a phase, create its directory and its overview document
    pub fn create_phase(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        order: Option<u32>,
    ) -> Result<Outcome<Phase>> {
        validate_phase_id(id)?;
        let _lock = self.registry_lock()?;

        let mut registry = self.read_registry()?;
        let dir = self.storage().phase_dir(id);
        if dir.exists() || registry.get(id).is_some() {
            return Err(Error::AlreadyExists {
                kind: "phase",
                id: id.to_string(),
            });
        }

        let name = name.unwrap_or(id).to_string();
        let order = order.unwrap_or_else(|| registry.next_order());
        std::fs::create_dir_all(&dir)?;
        registry.phases.push(PhaseEntry {
            id: id.to_string(),
            name: name.clone(),
            description: description.map(str::to_string),
            order,
        });
        registry.sort();
        self.write_registry(&registry)?;

        let mut overview = Task::new(OVERVIEW_ID, name);
        overview.task_type = PHASE_TASK_TYPE.to_string();
        overview.content = description.unwrap_or_default().to_string();
        let outcome = self.create(overview, Some(&Location::in_phase(id)))?;
        tracing::info!(phase = id, order, "created phase");

        let phase = self.get_phase(id)?;
        Ok(outcome.map(|_| phase))
    }

    pub fn get_phase(&self, id: &str) -> Result<Phase> {
        validate_name("phase", id)?;
        let registry = self.read_registry()?;
        let entry = registry.get(id);
        if entry.is_none() && !self.storage().phase_dir(id).is_dir() {
            return Err(Error::phase_not_found(id));
        }
        let fallback_order = registry.next_order();
        self.build_phase(id, entry, fallback_order)
    }

    /// Registered phases in order, then unregistered directories by name
    pub fn list_phases(&self) -> Result<Vec<Phase>> {
        let fallback = self.read_registry()?.next_order();
        self.ordered_phases()?
            .into_iter()
            .enumerate()
            .map(|(index, (id, entry))| {
                let order = fallback.saturating_add(index as u32);
                self.build_phase(&id, entry.as_ref(), order)
            })
            .collect()
    }

    fn build_phase(&self, id: &str, entry: Option<&PhaseEntry>, fallback_order: u32) -> Result<Phase> {
        let located = self.load_dir(&self.storage().phase_dir(id))?;
        let overview = located
            .iter()
            .find(|l| l.task.is_overview && l.path.parent() == Some(self.storage().phase_dir(id).as_path()));
        let tasks: Vec<&Task> = located
            .iter()
            .map(|l| &l.task)
            .filter(|task| !task.is_overview)
            .collect();

        let description = entry
            .and_then(|entry| entry.description.clone())
            .or_else(|| {
                overview
                    .map(|l| l.task.content.clone())
                    .filter(|content| !content.is_empty())
            });
        Ok(Phase {
            id: id.to_string(),
            name: entry
                .map(|entry| entry.name.clone())
                .or_else(|| overview.map(|l| l.task.title.clone()))
                .unwrap_or_else(|| id.to_string()),
            description,
            status: PhaseStatus::derive(tasks.iter().map(|task| task.status)),
            order: entry.map(|entry| entry.order).unwrap_or(fallback_order),
            tasks: tasks.iter().map(|task| task.id.clone()).collect(),
        })
    }

    /// Change a phase's registry fields; a new id renames the directory first
    pub fn update_phase(&self, id: &str, update: &PhaseUpdate) -> Result<Phase> {
        validate_name("phase", id)?;
        let mut current = id.to_string();
        if let Some(new_id) = update.id.as_deref().filter(|new_id| *new_id != id) {
            self.migrator().rename_phase(id, new_id)?;
            current = new_id.to_string();
        }

        let _lock = self.registry_lock()?;
        let mut registry = self.read_registry()?;
        if registry.get(&current).is_none() {
            if !self.storage().phase_dir(&current).is_dir() {
                return Err(Error::phase_not_found(current));
            }
            let order = registry.next_order();
            registry.phases.push(PhaseEntry {
                id: current.clone(),
                name: current.clone(),
                description: None,
                order,
            });
        }
        if let Some(entry) = registry.get_mut(&current) {
            if let Some(name) = &update.name {
                entry.name = name.clone();
            }
            if let Some(description) = &update.description {
                entry.description = description.clone();
            }
            if let Some(order) = update.order {
                entry.order = order;
            }
        }
        registry.sort();
        self.write_registry(&registry)?;
        tracing::info!(phase = %current, "updated phase");
        self.get_phase(&current)
    }

    /// Remove a phase directory; see [`crate::migrate::Migrator::delete_phase`]
    pub fn delete_phase(&self, id: &str, force: bool) -> Result<Outcome<Removal>> {
        self.migrator().delete_phase(id, force)
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
    fn create_phase_registers_and_writes_overview() {
        let (_dir, store) = store();
        let phase = store
            .create_phase("alpha", Some("Alpha"), Some("First stage"), None)
            .unwrap()
            .into_data();
        assert_eq!(phase.name, "Alpha");
        assert_eq!(phase.order, 1);
        assert_eq!(phase.status, PhaseStatus::Pending);
        assert!(phase.tasks.is_empty());
        assert!(store.storage().root().join("alpha/_overview.md").is_file());

        let err = store.create_phase("alpha", None, None, None).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { kind: "phase", .. }));
    }

    #[test]
    fn reserved_prefixes_are_not_phase_ids() {
        let (_dir, store) = store();
        let err = store.create_phase("feature-x", None, None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn unregistered_directories_list_after_registered_phases() {
        let (_dir, store) = store();
        store.create_phase("zeta", None, None, Some(1)).unwrap();
        store.create_phase("beta", None, None, Some(2)).unwrap();
        std::fs::create_dir_all(store.storage().root().join("adhoc")).unwrap();
        std::fs::create_dir_all(store.storage().root().join("feature-root")).unwrap();

        let ids: Vec<String> = store.list_phases().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["zeta", "beta", "adhoc"]);
        assert_eq!(store.phase_rank().unwrap()["adhoc"], 2);
    }

    #[test]
    fn status_follows_contained_tasks() {
        let (_dir, store) = store();
        store.create_phase("alpha", None, None, None).unwrap();
        let location = Location::in_phase("alpha");
        let mut a = Task::new("a", "A");
        a.status = TaskStatus::Done;
        store.create(a, Some(&location)).unwrap();
        assert_eq!(store.get_phase("alpha").unwrap().status, PhaseStatus::Completed);

        let mut b = Task::new("b", "B");
        b.status = TaskStatus::Review;
        store.create(b, Some(&location)).unwrap();
        let phase = store.get_phase("alpha").unwrap();
        assert_eq!(phase.status, PhaseStatus::InProgress);
        assert_eq!(phase.tasks, vec!["a", "b"]);
    }

    #[test]
    fn update_phase_changes_registry_fields() {
        let (_dir, store) = store();
        store.create_phase("alpha", None, None, None).unwrap();
        let update = PhaseUpdate {
            name: Some("Alpha One".to_string()),
            description: Some(Some("desc".to_string())),
            order: Some(7),
            ..PhaseUpdate::default()
        };
        let phase = store.update_phase("alpha", &update).unwrap();
        assert_eq!(phase.name, "Alpha One");
        assert_eq!(phase.description.as_deref(), Some("desc"));
        assert_eq!(phase.order, 7);
        assert!(store.get_phase("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn registry_rename_follows_mirrored_names() {
        let mut registry = PhaseRegistry::default();
        registry.phases.push(PhaseEntry {
            id: "alpha".to_string(),
            name: "alpha".to_string(),
            description: None,
            order: 1,
        });
        assert!(registry.rename("alpha", "beta"));
        assert_eq!(registry.get("beta").map(|e| e.name.as_str()), Some("beta"));
        assert!(!registry.rename("alpha", "gamma"));
    }
}
