//! Engine entry point: runs a parsed [`crate::taskfile::TaskFile`] against a
//! normalized [`crate::inventory::Inventory`], task by task, target by
//! target, in declared order.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::executor::{build_scope, RunSummary, TaskContext, TaskExecutor};
use crate::inventory::{Inventory, Resolver};
use crate::modules::ModuleRegistry;
use crate::taskfile::{apply_defaults, Task, TaskFile};
use crate::template::TemplateEngine;

/// Top-level run outcome: per-task, per-target summary plus whether any
/// unsuppressed task failure occurred (maps to the process exit code).
#[derive(Debug, Default)]
pub struct RunReport {
    pub summary: RunSummary,
    pub had_unsuppressed_failure: bool,
}

pub struct EngineEntry {
    registry: Arc<ModuleRegistry>,
    templates: Arc<TemplateEngine>,
    check_mode: bool,
}

impl EngineEntry {
    pub fn new(check_mode: bool) -> Self {
        Self {
            registry: Arc::new(ModuleRegistry::with_builtins()),
            templates: Arc::new(TemplateEngine::new()),
            check_mode,
        }
    }

    /// Validate `task_file`'s shape, resolve `inventory`, and run every task
    /// in file order against every target it selects. Returns a
    /// [`RunReport`]; the caller maps `had_unsuppressed_failure` to a
    /// non-zero process exit code.
    #[instrument(skip(self, inventory, task_file, extra_vars))]
    pub async fn run(
        &self,
        inventory: Inventory,
        task_file: TaskFile,
        extra_vars: IndexMap<String, Value>,
    ) -> Result<RunReport> {
        validate_task_file(&task_file)?;

        let resolver = Resolver::new(inventory);
        let mut report = RunReport::default();
        let file_targets = task_file
            .targets
            .as_ref()
            .map(|t| t.as_pattern())
            .unwrap_or_else(|| "all".to_string());

        for task in &task_file.tasks {
            let task = task.clone_with_defaults(task_file.defaults.as_ref());
            let pattern = if matches!(&task.targets, crate::taskfile::Targets::One(s) if s == "all")
            {
                file_targets.clone()
            } else {
                task.targets.as_pattern()
            };

            let hosts = match resolver.resolve(&pattern) {
                Ok(hosts) => hosts,
                Err(err) => {
                    warn!(task = %task.display_name(), error = %err, "no targets resolved for task");
                    return Err(err);
                }
            };

            for host in hosts {
                let provider = resolver.provider_for(host).await?;
                let environment: IndexMap<String, Value> = host
                    .environment
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
                    .collect();
                let scope = build_scope(host, &extra_vars, &task.variables);
                let ctx = TaskContext::new(
                    host.name.clone(),
                    provider,
                    scope,
                    environment,
                    self.templates.clone(),
                    self.check_mode,
                );

                let executor = TaskExecutor::new(self.registry.clone());
                match executor.run(&task, &ctx).await {
                    Ok(result) => {
                        info!(task = %task.display_name(), target = %host.name, changed = result.changed, "task finished");
                        report.summary.record(&result);
                    }
                    Err(Error::TaskExecutionFailed { task, target, message }) => {
                        report.had_unsuppressed_failure = true;
                        report.summary.failed += 1;
                        warn!(%task, %target, %message, "task failed");
                    }
                    Err(err) => {
                        resolver.dispose().await;
                        return Err(err);
                    }
                }
            }
        }

        resolver.dispose().await;
        Ok(report)
    }
}

/// Reject malformed task files before any target is touched: every task must
/// resolve to exactly one module (already enforced by [`Task`]'s
/// `Deserialize`, re-checked here defensively for tasks built in-process).
pub fn validate_task_file(task_file: &TaskFile) -> Result<()> {
    if task_file.tasks.is_empty() {
        return Err(Error::config("task file contains no tasks"));
    }
    for task in &task_file.tasks {
        if task.module_name().is_empty() {
            return Err(Error::config(format!(
                "task '{}' has no module",
                task.display_name()
            )));
        }
    }
    Ok(())
}

impl Task {
    /// Clone `self` and fold in file-level `defaults`, if any.
    fn clone_with_defaults(&self, defaults: Option<&crate::taskfile::TaskDefaults>) -> Task {
        let mut task = self.clone();
        if let Some(defaults) = defaults {
            apply_defaults(&mut task, defaults);
        }
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_task_file() {
        let task_file = TaskFile {
            targets: None,
            defaults: None,
            tasks: vec![],
        };
        assert!(validate_task_file(&task_file).is_err());
    }

    #[test]
    fn run_rejects_empty_task_file() {
        let task_file = TaskFile {
            targets: None,
            defaults: None,
            tasks: vec![],
        };
        let inventory = Inventory::default();
        let entry = EngineEntry::new(false);
        let result = tokio_test::block_on(entry.run(inventory, task_file, IndexMap::new()));
        assert!(result.is_err());
    }
}
