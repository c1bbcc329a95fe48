//! `validate`: check a task file's shape without touching any target.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use super::{load_task_file, CommandContext, Runnable};
use crate::engine::validate_task_file;

#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the task file (YAML).
    #[arg(required = true)]
    pub task_file: PathBuf,
}

impl ValidateArgs {
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        if !self.task_file.exists() {
            ctx.output.error(&format!("task file not found: {}", self.task_file.display()));
            return Ok(1);
        }

        let task_file = load_task_file(&self.task_file)
            .with_context(|| format!("failed to parse task file: {}", self.task_file.display()))?;

        match validate_task_file(&task_file) {
            Ok(()) => {
                ctx.output.info(&format!(
                    "{} is valid ({} task{})",
                    self.task_file.display(),
                    task_file.tasks.len(),
                    if task_file.tasks.len() == 1 { "" } else { "s" }
                ));
                println!("{}: valid", self.task_file.display());
                Ok(0)
            }
            Err(e) => {
                ctx.output.error(&e.to_string());
                Ok(1)
            }
        }
    }
}

#[async_trait::async_trait]
impl Runnable for ValidateArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_task_file_path() {
        let args = ValidateArgs::try_parse_from(["validate", "site.yml"]).unwrap();
        assert_eq!(args.task_file, PathBuf::from("site.yml"));
    }
}
