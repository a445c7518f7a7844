//! Storage layer for taskmd
//!
//! Owns the directory layout under the tasks root and the raw file I/O.
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//!   phases.json                 # Phase registry (names, order, descriptions)
//!   .taskmd.lock                # Cross-process migration lock
//!   .taskmd-migration.json      # Journal of an unfinished migration
//!   <id>.md                     # Task outside any phase
//!   <phase>/
//!     _overview.md              # Phase overview document
//!     <id>.md
//!     feature-<name>/
//!       _overview.md            # Feature overview document
//!       <id>.md
//!     area-<name>/
//!       ...
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::document;
use crate::error::{Error, Result};
use crate::lock;
use crate::model::{GroupingKind, Location, Task};

/// Phase registry file name
pub const REGISTRY_FILE: &str = "phases.json";

/// Cross-process lock file name
pub const LOCK_FILE: &str = ".taskmd.lock";

/// Migration journal file name
pub const JOURNAL_FILE: &str = ".taskmd-migration.json";

/// Extension of task documents
pub const DOCUMENT_EXTENSION: &str = "md";

/// Storage manager for one tasks root
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn phase_dir(&self, phase: &str) -> PathBuf {
        self.root.join(phase)
    }

    /// `<root>/<phase?>/<subdirectory?>`
    pub fn location_dir(&self, location: &Location) -> PathBuf {
        let mut dir = self.root.clone();
        if let Some(phase) = location.phase.as_deref() {
            dir.push(phase);
        }
        if let Some(subdirectory) = location.subdirectory.as_deref() {
            for segment in subdirectory.split('/') {
                dir.push(segment);
            }
        }
        dir
    }

    /// `<root>/<phase?>/<subdirectory?>/<id>.md`
    pub fn task_path(&self, id: &str, location: &Location) -> PathBuf {
        self.location_dir(location)
            .join(format!("{id}.{DOCUMENT_EXTENSION}"))
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn journal_file(&self) -> PathBuf {
        self.root.join(JOURNAL_FILE)
    }

    /// Location implied by where `path` sits under the root
    pub fn location_of(&self, path: &Path) -> Option<Location> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut dirs: Vec<String> = relative
            .parent()
            .map(|parent| {
                parent
                    .components()
                    .filter_map(|component| match component {
                        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if dirs.is_empty() {
            return Some(Location::default());
        }
        let phase = if GroupingKind::parse_dir_name(&dirs[0]).is_some() {
            None
        } else {
            Some(dirs.remove(0))
        };
        let subdirectory = if dirs.is_empty() {
            None
        } else {
            Some(dirs.join("/"))
        };
        Some(Location {
            phase,
            subdirectory,
        })
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    // =========================================================================
    // Task documents
    // =========================================================================

    pub fn read_task(&self, path: &Path) -> Result<Task> {
        let text = fs::read_to_string(path)?;
        document::decode(&text, path)
    }

    pub fn write_task(&self, path: &Path, task: &Task) -> Result<()> {
        let text = document::encode(task)?;
        lock::write_atomic_str(path, &text)
    }

    pub fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    /// Every task document under `dir`, sorted; hidden entries are skipped
    pub fn task_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let pattern = format!(
            "{}/**/*.{DOCUMENT_EXTENSION}",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        self.glob_documents(&pattern)
    }

    /// Documents named `<id>.md` anywhere under the root
    pub fn files_named(&self, id: &str) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let pattern = format!(
            "{}/**/{}.{DOCUMENT_EXTENSION}",
            glob::Pattern::escape(&self.root.to_string_lossy()),
            glob::Pattern::escape(id)
        );
        self.glob_documents(&pattern)
    }

    fn glob_documents(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let entries = glob::glob(pattern)
            .map_err(|err| Error::InvalidArgument(format!("bad glob pattern {pattern}: {err}")))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| Error::Io(err.into_error()))?;
            if path.is_file() && !self.is_hidden(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn is_hidden(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative.components().any(|component| match component {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        })
    }

    /// Names of visible subdirectories of `dir`, sorted
    pub fn child_dirs(&self, dir: &Path) -> Result<Vec<String>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    // =========================================================================
    // Directory migration helpers
    // =========================================================================

    /// Copy `src` into `dst` recursively, overwriting files already there.
    /// Returns the number of files copied.
    pub fn copy_dir_recursive(&self, src: &Path, dst: &Path) -> Result<usize> {
        fs::create_dir_all(dst)?;
        let mut copied = 0;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            let target = dst.join(entry.file_name());
            if entry.file_type()?.is_dir() {
                copied += self.copy_dir_recursive(&entry.path(), &target)?;
            } else {
                fs::copy(entry.path(), &target)?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    pub fn remove_dir(&self, dir: &Path) -> Result<()> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Path relative to the root, for journals and messages
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    // =========================================================================
    // JSON side files (atomic writes for safety)
    // =========================================================================

    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read JSON if the file exists
    pub fn read_json_opt<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        self.read_json(path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("tasks"));
        storage.init().unwrap();
        (dir, storage)
    }

    #[test]
    fn task_paths_follow_layout() {
        let storage = Storage::new("/r");
        let location = Location::new(Some("alpha"), Some("feature-auth"));
        assert_eq!(
            storage.task_path("T-1", &location),
            PathBuf::from("/r/alpha/feature-auth/T-1.md")
        );
        assert_eq!(
            storage.task_path("T-1", &Location::default()),
            PathBuf::from("/r/T-1.md")
        );
    }

    #[test]
    fn location_of_inverts_task_path() {
        let storage = Storage::new("/r");
        for location in [
            Location::default(),
            Location::in_phase("alpha"),
            Location::new(Some("alpha"), Some("area-ops")),
            Location::new(None, Some("feature-auth")),
        ] {
            let path = storage.task_path("x", &location);
            assert_eq!(storage.location_of(&path), Some(location));
        }
    }

    #[test]
    fn task_files_skip_hidden_and_non_documents() {
        let (_dir, storage) = setup();
        let root = storage.root().to_path_buf();
        fs::create_dir_all(root.join("alpha/feature-x")).unwrap();
        fs::create_dir_all(root.join(".trash")).unwrap();
        fs::write(root.join("alpha/a.md"), "x").unwrap();
        fs::write(root.join("alpha/feature-x/b.md"), "x").unwrap();
        fs::write(root.join("alpha/notes.txt"), "x").unwrap();
        fs::write(root.join(".trash/c.md"), "x").unwrap();

        let files = storage.task_files(&root).unwrap();
        assert_eq!(
            files,
            vec![root.join("alpha/a.md"), root.join("alpha/feature-x/b.md")]
        );
        assert_eq!(storage.files_named("b").unwrap(), vec![root.join("alpha/feature-x/b.md")]);
        assert!(storage.task_files(&root.join("missing")).unwrap().is_empty());
    }

    #[test]
    fn copy_dir_recursive_copies_tree() {
        let (_dir, storage) = setup();
        let root = storage.root().to_path_buf();
        fs::create_dir_all(root.join("old/feature-x")).unwrap();
        fs::write(root.join("old/a.md"), "a").unwrap();
        fs::write(root.join("old/feature-x/b.md"), "b").unwrap();

        let copied = storage
            .copy_dir_recursive(&root.join("old"), &root.join("new"))
            .unwrap();
        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(root.join("new/feature-x/b.md")).unwrap(), "b");
        assert_eq!(storage.child_dirs(&root).unwrap(), vec!["new", "old"]);
    }
}
