//! taskmd - Markdown task tracking library
//!
//! Tasks are markdown documents with YAML front matter stored under a tasks
//! root, filed by phase and by feature/area directory. The library keeps the
//! relationship graph between them consistent on every write.
//!
//! # Core Concepts
//!
//! - **Tasks**: `<root>/<phase?>/<subdirectory?>/<id>.md`
//! - **Relationships**: parent/subtasks, previous/next chains and
//!   dependencies, each maintained in both directions
//! - **Sequences**: `01`, `02a`, `02b` ordering tokens for subtasks
//! - **Phases**: ordered workflow buckets registered in `phases.json`
//! - **Features / Areas**: `feature-*` and `area-*` grouping directories
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.taskmd.toml`
//! - `error`: Error types and result aliases
//! - `model`: Task, phase and grouping data types
//! - `document`: Front matter codec
//! - `storage`: Paths and file access under the tasks root
//! - `lock`: File locking, per-task locks and atomic writes
//! - `store`: Task create/get/update/delete
//! - `relations`: Inverse-edge maintenance and consistency audit
//! - `sequence`: Sequence tokens, reorder and parallel groups
//! - `query`: Filtering, dependency lookups and next-task selection
//! - `phase`, `group`: Phase and feature/area management
//! - `migrate`: Task moves and journaled directory migrations
//! - `outcome`: Results carrying non-fatal relationship warnings
//! - `output`: Human and JSON output for the CLI

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod group;
pub mod lock;
pub mod migrate;
pub mod model;
pub mod outcome;
pub mod output;
pub mod phase;
pub mod query;
pub mod relations;
pub mod sequence;
pub mod storage;
pub mod store;

pub use error::{Error, Result};
pub use model::{Location, Task, TaskPatch};
pub use outcome::{Outcome, RelationshipWarning, WarningKind};
pub use store::TaskStore;
