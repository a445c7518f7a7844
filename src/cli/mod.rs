//! Command-line interface for taskmd
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::model::GroupingKind;
use crate::output::OutputOptions;
use crate::store::TaskStore;

mod check;
mod group;
mod phase;
mod task;

/// taskmd - Markdown task tracker
///
/// Tasks are markdown documents with YAML front matter, filed under phases,
/// features and areas. Relationship edges are kept consistent in both
/// directions on every write.
#[derive(Parser, Debug)]
#[command(name = "taskmd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Tasks root directory (defaults to `tasks_root` from .taskmd.toml)
    #[arg(long, global = true, env = "TASKMD_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, inspect, edit and move tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// Phase management
    #[command(subcommand)]
    Phase(PhaseCommands),

    /// Feature directories
    #[command(subcommand)]
    Feature(GroupCommands),

    /// Area directories
    #[command(subcommand)]
    Area(GroupCommands),

    /// Audit relationship consistency and report interrupted migrations
    Check {
        /// Finish an interrupted migration before auditing
        #[arg(long)]
        resume: bool,
    },
}

/// Task fields shared by `create` and `update`
#[derive(Args, Debug, Default)]
pub struct TaskFieldArgs {
    /// Task type (task, bug, feature, ...)
    #[arg(long = "type")]
    pub task_type: Option<String>,

    /// Status: todo, in-progress, review, blocked, done
    #[arg(long)]
    pub status: Option<String>,

    /// Priority: low, medium, high, critical
    #[arg(long)]
    pub priority: Option<String>,

    /// Assignee
    #[arg(long)]
    pub assignee: Option<String>,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,

    /// Tag (repeatable; replaces the tag list on update)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Parent task id
    #[arg(long)]
    pub parent: Option<String>,

    /// Dependency id (repeatable; replaces the list on update)
    #[arg(long = "depends-on")]
    pub depends_on: Vec<String>,

    /// Previous task in the chain
    #[arg(long)]
    pub previous: Option<String>,

    /// Next task in the chain
    #[arg(long)]
    pub next: Option<String>,

    /// Sequence token (01, 02a, ...)
    #[arg(long)]
    pub sequence: Option<String>,

    /// Body text
    #[arg(long)]
    pub content: Option<String>,

    /// Read body text from a file
    #[arg(long, conflicts_with = "content")]
    pub content_file: Option<PathBuf>,
}

/// Location hint for task lookups
#[derive(Args, Debug, Default)]
pub struct LocationArgs {
    /// Phase the task lives in
    #[arg(long)]
    pub phase: Option<String>,

    /// Subdirectory inside the phase (feature-x, area-y, ...)
    #[arg(long)]
    pub subdirectory: Option<String>,
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Create {
        /// Task title
        title: String,

        /// Explicit id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        #[command(flatten)]
        fields: TaskFieldArgs,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Show a task
    Get {
        id: String,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Change task fields
    Update {
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        fields: TaskFieldArgs,

        /// Clear the assignee
        #[arg(long, conflicts_with = "assignee")]
        clear_assignee: bool,

        /// Clear the parent task
        #[arg(long, conflicts_with = "parent")]
        clear_parent: bool,

        /// Clear the previous task
        #[arg(long, conflicts_with = "previous")]
        clear_previous: bool,

        /// Clear the next task
        #[arg(long, conflicts_with = "next")]
        clear_next: bool,

        /// Clear the due date
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,

        /// Clear all dependencies
        #[arg(long, conflicts_with = "depends_on")]
        clear_depends_on: bool,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Delete a task and detach its relationships
    Delete {
        id: String,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Move a task to another phase and/or subdirectory
    Move {
        id: String,

        /// Target phase (keeps the current phase when omitted)
        #[arg(long)]
        phase: Option<String>,

        /// Target subdirectory (top of the phase when omitted)
        #[arg(long)]
        subdirectory: Option<String>,
    },

    /// List tasks
    List {
        #[command(flatten)]
        location: LocationArgs,

        /// Filter by status
        #[arg(long)]
        status: Option<String>,

        /// Filter by priority
        #[arg(long)]
        priority: Option<String>,

        /// Filter by type
        #[arg(long = "type")]
        task_type: Option<String>,

        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,

        /// Filter by assignee
        #[arg(long)]
        assignee: Option<String>,

        /// Filter by parent task
        #[arg(long)]
        parent: Option<String>,

        /// Only tasks depending on this id
        #[arg(long)]
        depends_on: Option<String>,

        /// Include completed tasks
        #[arg(long)]
        all: bool,

        /// Include overview documents
        #[arg(long)]
        overviews: bool,

        /// Include (truncated) body text
        #[arg(long)]
        content: bool,
    },

    /// Show the task to work on next
    Next {
        /// Only consider this phase
        #[arg(long)]
        phase: Option<String>,
    },

    /// Show tasks that share a parent (or a directory) with a task
    Siblings { id: String },

    /// Renumber a parent's subtasks in the given order
    Reorder {
        parent: String,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Give subtasks a shared sequence base so they run in parallel
    Parallel {
        parent: String,

        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// Phase subcommands
#[derive(Subcommand, Debug)]
pub enum PhaseCommands {
    /// Create a phase
    Create {
        id: String,

        /// Display name (defaults to the id)
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Sort position (defaults to after the last phase)
        #[arg(long)]
        order: Option<u32>,
    },

    /// Show a phase
    Get { id: String },

    /// List phases in order
    List,

    /// Change a phase's name, description or order
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, conflicts_with = "description")]
        clear_description: bool,

        #[arg(long)]
        order: Option<u32>,
    },

    /// Rename a phase directory and rewrite its tasks
    Rename { old: String, new: String },

    /// Delete a phase
    Delete {
        id: String,

        /// Delete even if the phase still holds tasks
        #[arg(long)]
        force: bool,
    },
}

/// Feature/area subcommands
#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// Create a grouping directory with an overview
    Create {
        name: String,

        /// Phase to create it in (tasks root when omitted)
        #[arg(long)]
        phase: Option<String>,

        /// Overview title (defaults to the name)
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Show a grouping and its progress
    Get {
        name: String,

        #[arg(long)]
        phase: Option<String>,
    },

    /// List groupings
    List {
        /// Only this phase
        #[arg(long)]
        phase: Option<String>,
    },

    /// Rename a grouping directory
    Rename {
        old: String,
        new: String,

        #[arg(long)]
        phase: Option<String>,
    },

    /// Move a grouping to another phase
    Move {
        name: String,

        /// Current phase (tasks root when omitted)
        #[arg(long)]
        from: Option<String>,

        /// Target phase (tasks root when omitted)
        #[arg(long)]
        to: Option<String>,
    },

    /// Delete a grouping
    Delete {
        name: String,

        #[arg(long)]
        phase: Option<String>,

        /// Delete even if it still holds tasks
        #[arg(long)]
        force: bool,
    },
}

/// What every command needs: the opened store and output mode
pub(crate) struct Context {
    pub store: TaskStore,
    pub output: OutputOptions,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = self.context()?;
        match self.command {
            Commands::Task(cmd) => task::run(&ctx, cmd),
            Commands::Phase(cmd) => phase::run(&ctx, cmd),
            Commands::Feature(cmd) => group::run(&ctx, GroupingKind::Feature, cmd),
            Commands::Area(cmd) => group::run(&ctx, GroupingKind::Area, cmd),
            Commands::Check { resume } => check::run(&ctx, resume),
        }
    }

    fn context(&self) -> Result<Context> {
        let cwd = std::env::current_dir()?;
        let mut config = Config::load_from_dir(&cwd)?;
        if let Some(root) = &self.root {
            config.tasks_root = if root.is_absolute() {
                root.clone()
            } else {
                cwd.join(root)
            };
        }
        tracing::debug!(root = %config.tasks_root.display(), "opening task store");
        Ok(Context {
            store: TaskStore::open(config)?,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        })
    }
}
