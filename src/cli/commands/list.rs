//! `list-targets` / `list-tasks`: inspect an inventory or task file without
//! running anything.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use super::{load_inventory, load_task_file, CommandContext, Runnable};
use crate::inventory::resolve_pattern;

#[derive(Parser, Debug, Clone)]
pub struct ListTargetsArgs {
    /// Selection pattern (§4.3 mini-language); defaults to every target.
    #[arg(default_value = "all")]
    pub pattern: String,
}

#[derive(Parser, Debug, Clone)]
pub struct ListTasksArgs {
    /// Path to the task file (YAML).
    #[arg(required = true)]
    pub task_file: PathBuf,
}

impl ListTargetsArgs {
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let Some(inventory_path) = ctx.inventory_path().cloned() else {
            ctx.output.error("no inventory specified; pass -i/--inventory or set KATMER_INVENTORY");
            return Ok(1);
        };
        let inventory = load_inventory(&inventory_path)
            .with_context(|| format!("failed to load inventory: {}", inventory_path.display()))?;

        let names = match resolve_pattern(&inventory, &self.pattern) {
            Ok(names) => names,
            Err(e) => {
                ctx.output.warning(&e.to_string());
                return Ok(0);
            }
        };

        ctx.output.section(&format!("Targets matching '{}' ({})", self.pattern, names.len()));
        ctx.output.list("targets", &names);
        Ok(0)
    }
}

impl ListTasksArgs {
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        if !self.task_file.exists() {
            ctx.output.error(&format!("task file not found: {}", self.task_file.display()));
            return Ok(1);
        }
        let task_file = load_task_file(&self.task_file)
            .with_context(|| format!("failed to load task file: {}", self.task_file.display()))?;

        ctx.output.section(&format!("Tasks in {}", self.task_file.display()));
        for (idx, task) in task_file.tasks.iter().enumerate() {
            let targets = task.targets.as_pattern();
            println!(
                "  {:>3}. {} [{}] (targets: {})",
                idx + 1,
                task.display_name(),
                task.module_name(),
                targets
            );
        }
        println!("\nTotal tasks: {}", task_file.tasks.len());
        Ok(0)
    }
}

#[async_trait::async_trait]
impl Runnable for ListTargetsArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}

#[async_trait::async_trait]
impl Runnable for ListTasksArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_targets_defaults_to_all() {
        let args = ListTargetsArgs::try_parse_from(["list-targets"]).unwrap();
        assert_eq!(args.pattern, "all");
    }

    #[test]
    fn list_targets_accepts_explicit_pattern() {
        let args = ListTargetsArgs::try_parse_from(["list-targets", "webservers"]).unwrap();
        assert_eq!(args.pattern, "webservers");
    }

    #[test]
    fn list_tasks_requires_path() {
        let args = ListTasksArgs::try_parse_from(["list-tasks", "site.yml"]).unwrap();
        assert_eq!(args.task_file, PathBuf::from("site.yml"));
    }
}
