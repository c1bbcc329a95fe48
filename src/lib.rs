//! # katmer - agentless configuration management and remote execution
//!
//! `katmer` applies a task file to a set of targets over a pluggable
//! [`provider`] transport (local process or SSH), rendering
//! [`template`]-driven values and evaluating per-task [`controls`]
//! (conditionals, loops, privilege escalation, retries) along the way.
//!
//! ## Core Concepts
//!
//! - **Inventory**: targets and groups, resolved from a selection pattern
//!   mini-language (see [`inventory`]).
//! - **Task file**: a flat, ordered list of tasks, each invoking exactly one
//!   module (see [`taskfile`]).
//! - **Modules**: the units of work a task can invoke (see [`modules`]).
//! - **Providers**: the transport a task runs over — local or SSH (see
//!   [`provider`]).
//! - **Engine**: ties inventory, task file, and providers together and
//!   drives execution (see [`engine`]).
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use katmer::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let inventory = katmer::inventory::normalize(&[layer])?;
//!     let task_file: TaskFile = serde_yaml::from_str(&content)?;
//!
//!     let engine = EngineEntry::new(false);
//!     let report = engine.run(inventory, task_file, Default::default()).await?;
//!     println!("{:?}", report.summary);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of the most commonly used types.

    pub use crate::config::EngineConfig;
    pub use crate::engine::{EngineEntry, RunReport};
    pub use crate::error::{Error, Result};
    pub use crate::executor::{RunSummary, TaskContext, TaskExecutor};
    pub use crate::inventory::{resolve_pattern, Inventory, ResolvedHost};
    pub use crate::modules::{Module, ModuleRegistry, ModuleResult};
    pub use crate::provider::Provider;
    pub use crate::taskfile::{Task, TaskFile};
    pub use crate::template::TemplateEngine;
}

/// Error types and result alias used throughout the crate.
pub mod error;

/// Per-task conditionals, loops, privilege escalation, and retry/until
/// control flow, applied around a module invocation.
pub mod controls;

/// The execution engine: runs a [`taskfile::TaskFile`] against a resolved
/// [`inventory::Inventory`], task by task, target by target.
pub mod engine;

/// Task execution plumbing: variable scope construction, per-target task
/// context, and the run summary tally.
pub mod executor;

/// Target and group inventory: normalization from YAML layers and the
/// selection pattern mini-language.
pub mod inventory;

/// Built-in module implementations: the units of work a task can invoke.
///
/// - **Package management**: `apt`, `package`
/// - **File operations**: `copy`, `file`, `template`, `archive`, `unarchive`
/// - **System administration**: `cron`, `hostname`, `systemd_unit`
/// - **Command execution**: `command`, `shell`
/// - **Source control**: `git`
/// - **Networking**: `uri`
/// - **Diagnostics**: `debug`, `assert`, `set_fact`, `gather_facts`
pub mod modules;

/// The connection layer a task runs over: local process execution or SSH.
pub mod provider;

/// Reusable `minijinja` filters shared across the template engine and
/// modules that need ad hoc value formatting.
pub mod plugins;

/// Task file parsing: targets, defaults, and the ordered task list.
pub mod taskfile;

/// `minijinja`-backed template rendering for strings and task parameters.
pub mod template;

/// Layered engine configuration: defaults, config files, environment,
/// and CLI overrides.
pub mod config;

/// Command-line interface: argument parsing, subcommands, and terminal
/// output formatting.
pub mod cli;

/// Returns the current version of katmer.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns detailed version information including build metadata.
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        rust_version: option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown"),
        target: std::env::consts::ARCH,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Detailed version information for the katmer build.
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Semantic version string
    pub version: &'static str,
    /// Minimum Rust version required
    pub rust_version: &'static str,
    /// Target triple for the build
    pub target: &'static str,
    /// Build profile (debug or release)
    pub profile: &'static str,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "katmer {} ({}, {})",
            self.version, self.target, self.profile
        )
    }
}
