//! Subcommand implementations for the `katmer` CLI.
//!
//! Each subcommand module owns one `clap::Parser` args struct and an
//! `execute` method; [`CommandContext`] carries the cross-cutting state
//! (config, output formatter, global flags) every subcommand needs.

pub mod check;
pub mod list;
pub mod run;
pub mod validate;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;

use crate::cli::output::OutputFormatter;
use crate::cli::Cli;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::taskfile::TaskFile;

/// Shared state built once from parsed CLI flags and handed to whichever
/// subcommand runs.
pub struct CommandContext {
    pub config: EngineConfig,
    pub output: OutputFormatter,
    pub inventory_path: Option<PathBuf>,
    pub extra_vars: Vec<String>,
    pub verbosity: u8,
    pub forks: usize,
}

impl CommandContext {
    pub fn new(cli: &Cli, config: EngineConfig) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity());
        Self {
            config,
            output,
            inventory_path: cli.inventory.clone(),
            extra_vars: cli.extra_vars.clone(),
            verbosity: cli.verbosity(),
            forks: cli.forks,
        }
    }

    /// Effective inventory path: CLI flag, falling back to the config layer.
    pub fn inventory_path(&self) -> Option<&PathBuf> {
        self.inventory_path.as_ref().or(self.config.inventory.as_ref())
    }

    /// Parse `-e`/`--extra-vars` into a scope-ready JSON map. A bare
    /// `key=value` is parsed as a YAML scalar (so `count=3` becomes a
    /// number); `@file.yml` merges in every key from that file.
    pub fn parse_extra_vars(&self) -> Result<IndexMap<String, Value>> {
        let mut vars = IndexMap::new();
        for entry in &self.extra_vars {
            if let Some(file_path) = entry.strip_prefix('@') {
                let content = std::fs::read_to_string(file_path)?;
                let file_vars: HashMap<String, Value> = serde_yaml::from_str(&content)
                    .map_err(|e| Error::config(format!("extra-vars file '{file_path}': {e}")))?;
                vars.extend(file_vars);
            } else if let Some((key, value)) = entry.split_once('=') {
                let parsed: Value = serde_yaml::from_str(value)
                    .map(|y: serde_yaml::Value| serde_json::to_value(y).unwrap_or(Value::Null))
                    .unwrap_or_else(|_| Value::String(value.to_string()));
                vars.insert(key.to_string(), parsed);
            } else {
                return Err(Error::config(format!(
                    "invalid --extra-vars entry '{entry}', expected key=value or @file.yml"
                )));
            }
        }
        Ok(vars)
    }
}

/// Read and normalize an inventory file (YAML) into an [`Inventory`].
pub fn load_inventory(path: &Path) -> Result<Inventory> {
    let content = std::fs::read_to_string(path)?;
    let layer: serde_yaml::Value = serde_yaml::from_str(&content)?;
    crate::inventory::normalize(&[layer])
}

/// Read and parse a task file (YAML) into a [`TaskFile`].
pub fn load_task_file(path: &Path) -> Result<TaskFile> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(Error::Yaml)
}

/// Trait every subcommand args struct implements so `main` can dispatch
/// uniformly.
#[async_trait::async_trait]
pub trait Runnable {
    async fn run(&self, ctx: &mut CommandContext) -> anyhow::Result<i32>;
}
