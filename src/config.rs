//! Configuration loading and management
//!
//! Handles parsing of `.taskmd.toml` configuration files. The loaded value is
//! handed to [`crate::storage::Storage`] and the stores explicitly; nothing in
//! the engine reads configuration from process-wide state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File name looked up by [`Config::load_from_dir`]
pub const CONFIG_FILE: &str = ".taskmd.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding phases, groupings and task documents.
    /// Relative paths resolve against the directory the config was loaded from.
    #[serde(default = "default_tasks_root")]
    pub tasks_root: PathBuf,

    /// Maximum number of body characters returned by listings with content
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,

    /// How long to wait for the cross-process migration lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Task id generation
    #[serde(default)]
    pub ids: IdConfig,

    /// Relationship maintenance policy
    #[serde(default)]
    pub relations: RelationsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks_root: default_tasks_root(),
            max_context_length: default_max_context_length(),
            lock_timeout_ms: default_lock_timeout_ms(),
            ids: IdConfig::default(),
            relations: RelationsConfig::default(),
        }
    }
}

fn default_tasks_root() -> PathBuf {
    PathBuf::from(".tasks")
}

fn default_max_context_length() -> usize {
    4000
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

/// Id format used when a task is created without an id
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdFormat {
    /// `<prefix>-001`, one past the highest existing number
    #[default]
    Sequential,
    /// Title slug with stop words removed
    Slug,
    /// Lowercase ULID
    Ulid,
}

/// Id generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default)]
    pub format: IdFormat,

    /// Prefix for sequential ids
    #[serde(default = "default_id_prefix")]
    pub prefix: String,

    /// Words dropped from titles when building slug ids
    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,

    /// Maximum slug length before the collision suffix
    #[serde(default = "default_max_slug_len")]
    pub max_slug_len: usize,
}

fn default_id_prefix() -> String {
    "TASK".to_string()
}

fn default_stop_words() -> Vec<String> {
    [
        "a", "an", "and", "the", "of", "for", "to", "in", "on", "with", "by", "at", "from", "or",
    ]
    .iter()
    .map(|word| word.to_string())
    .collect()
}

fn default_max_slug_len() -> usize {
    40
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            format: IdFormat::default(),
            prefix: default_id_prefix(),
            stop_words: default_stop_words(),
            max_slug_len: default_max_slug_len(),
        }
    }
}

/// Relationship maintenance configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationsConfig {
    /// Refuse to delete a task that still has subtasks instead of orphaning them
    #[serde(default)]
    pub block_delete_with_subtasks: bool,
}

impl Config {
    /// Load configuration from a `.taskmd.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.validate()?;
        if config.tasks_root.is_relative() {
            if let Some(parent) = path.parent() {
                config.tasks_root = parent.join(&config.tasks_root);
            }
        }
        Ok(config)
    }

    /// Load configuration from a directory, or return defaults rooted there
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::with_root(dir.join(default_tasks_root())))
        }
    }

    /// Default configuration with an explicit tasks root
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            tasks_root: root.into(),
            ..Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tasks_root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "tasks_root cannot be empty".to_string(),
            ));
        }
        if self.max_context_length == 0 {
            return Err(Error::InvalidConfig(
                "max_context_length must be > 0".to_string(),
            ));
        }
        self.ids.validate()
    }
}

impl IdConfig {
    fn validate(&self) -> Result<()> {
        let prefix = self.prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidConfig(
                "ids.prefix cannot be empty".to_string(),
            ));
        }
        if !prefix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(Error::InvalidConfig(
                "ids.prefix must be alphanumeric".to_string(),
            ));
        }
        if self.max_slug_len < 8 {
            return Err(Error::InvalidConfig(
                "ids.max_slug_len must be >= 8".to_string(),
            ));
        }
        Ok(())
    }

    /// True if `word` is a configured stop word (case-insensitive)
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words
            .iter()
            .any(|stop| stop.eq_ignore_ascii_case(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.tasks_root, PathBuf::from(".tasks"));
        assert_eq!(cfg.max_context_length, 4000);
        assert_eq!(cfg.lock_timeout_ms, 5000);
        assert_eq!(cfg.ids.format, IdFormat::Sequential);
        assert_eq!(cfg.ids.prefix, "TASK");
        assert!(cfg.ids.is_stop_word("The"));
        assert!(!cfg.relations.block_delete_with_subtasks);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
tasks_root = "work"
max_context_length = 200
lock_timeout_ms = 100

[ids]
format = "slug"
prefix = "PRJ"
stop_words = ["please"]
max_slug_len = 12

[relations]
block_delete_with_subtasks = true
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.tasks_root, dir.path().join("work"));
        assert_eq!(cfg.max_context_length, 200);
        assert_eq!(cfg.lock_timeout_ms, 100);
        assert_eq!(cfg.ids.format, IdFormat::Slug);
        assert_eq!(cfg.ids.prefix, "PRJ");
        assert_eq!(cfg.ids.stop_words, vec!["please".to_string()]);
        assert_eq!(cfg.ids.max_slug_len, 12);
        assert!(cfg.relations.block_delete_with_subtasks);
    }

    #[test]
    fn invalid_prefix_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[ids]\nprefix = \"no spaces\"").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_from_dir_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path()).expect("defaults");
        assert_eq!(cfg.tasks_root, dir.path().join(".tasks"));
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("tasks_root = \".tasks\""));
    }
}
