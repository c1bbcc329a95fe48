//! `check`: run a task file in check (dry-run) mode.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use super::{CommandContext, Runnable};
use crate::cli::commands::run::RunArgs;

#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Path to the task file (YAML).
    #[arg(required = true)]
    pub task_file: PathBuf,
}

impl CheckArgs {
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        ctx.output.banner("CHECK MODE - DRY RUN");
        let run_args = RunArgs {
            task_file: self.task_file.clone(),
        };
        run_args.execute_with_mode(ctx, true).await
    }
}

#[async_trait::async_trait]
impl Runnable for CheckArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_task_file_path() {
        let args = CheckArgs::try_parse_from(["check", "site.yml"]).unwrap();
        assert_eq!(args.task_file, PathBuf::from("site.yml"));
    }
}
