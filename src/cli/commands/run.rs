//! `run`: execute a task file against the inventory.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use super::{load_inventory, load_task_file, CommandContext, Runnable};
use crate::engine::EngineEntry;

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the task file (YAML).
    #[arg(required = true)]
    pub task_file: PathBuf,
}

impl RunArgs {
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute_with_mode(ctx, ctx.config.check_mode).await
    }

    pub(super) async fn execute_with_mode(&self, ctx: &mut CommandContext, check_mode: bool) -> Result<i32> {
        let start = Instant::now();

        if !self.task_file.exists() {
            ctx.output.error(&format!("task file not found: {}", self.task_file.display()));
            return Ok(1);
        }
        let Some(inventory_path) = ctx.inventory_path().cloned() else {
            ctx.output.error("no inventory specified; pass -i/--inventory or set KATMER_INVENTORY");
            return Ok(1);
        };

        ctx.output.banner(&format!(
            "TASK FILE: {}",
            self.task_file.file_name().unwrap_or_default().to_string_lossy()
        ));
        if check_mode {
            ctx.output.warning("running in CHECK MODE - no changes will be made");
        }

        let inventory = load_inventory(&inventory_path)
            .with_context(|| format!("failed to load inventory: {}", inventory_path.display()))?;
        let task_file = load_task_file(&self.task_file)
            .with_context(|| format!("failed to load task file: {}", self.task_file.display()))?;
        let extra_vars = ctx.parse_extra_vars()?;

        let engine = EngineEntry::new(check_mode);
        let report = engine.run(inventory, task_file, extra_vars).await?;

        let exit_code = ctx.output.recap(&report.summary, report.had_unsuppressed_failure);
        ctx.output.info(&format!("run finished in {:.2}s", start.elapsed().as_secs_f64()));
        Ok(exit_code)
    }
}

#[async_trait::async_trait]
impl Runnable for RunArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_task_file_path() {
        let args = RunArgs::try_parse_from(["run", "site.yml"]).unwrap();
        assert_eq!(args.task_file, PathBuf::from("site.yml"));
    }
}
