#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

use taskmd::config::Config;
use taskmd::model::{Location, Task};
use taskmd::store::TaskStore;

/// A temporary project directory with a tasks root inside it
pub struct TestRoot {
    dir: TempDir,
    store: TaskStore,
}

impl TestRoot {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let mut config = Config::with_root(dir.path().join("tasks"));
        adjust(&mut config);
        let store = TaskStore::open(config).expect("failed to open store");
        Self { dir, store }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("tasks")
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Create a task with only an id and title, at `location`
    pub fn add(&self, id: &str, location: Option<&Location>) -> Task {
        self.store
            .create(Task::new(id, format!("Task {id}")), location)
            .expect("create task")
            .into_data()
    }

    /// Create a task after letting the caller fill in fields
    pub fn add_with(&self, id: &str, fill: impl FnOnce(&mut Task)) -> Task {
        let mut task = Task::new(id, format!("Task {id}"));
        fill(&mut task);
        self.store
            .create(task, None)
            .expect("create task")
            .into_data()
    }

    pub fn get(&self, id: &str) -> Task {
        self.store.get(id, None).expect("get task")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.root().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    /// The CLI binary, run from the project directory against this root
    pub fn cmd(&self) -> Command {
        let mut cmd = taskmd_cmd();
        cmd.current_dir(self.path());
        cmd.arg("--root").arg(self.root());
        cmd
    }
}

pub fn taskmd_cmd() -> Command {
    let mut cmd = Command::cargo_bin("taskmd").expect("binary");
    cmd.env_remove("TASKMD_ROOT");
    cmd.env_remove("RUST_LOG");
    cmd
}

pub fn ids(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|task| task.id.clone()).collect()
}
