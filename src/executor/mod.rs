//! Per-(task,target) execution context and the task executor that drives a
//! module through the control stack.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, instrument};

use crate::controls;
use crate::error::{Error, Result};
use crate::inventory::ResolvedHost;
use crate::modules::{constraints, ModuleParams, ModuleRegistry, ModuleResult};
use crate::provider::{ExecOptions, ExecResult, OsInfo, Provider};
use crate::taskfile::Task;
use crate::template::TemplateEngine;

/// The per-(task,target) execution record handed to controls and modules.
/// `exec_options` is mutated in place by the `environment` and `become`
/// controls for the remainder of the task.
pub struct TaskContext {
    pub target_name: String,
    pub provider: Arc<AsyncMutex<Box<dyn Provider>>>,
    pub exec_options: std::sync::Mutex<ExecOptions>,
    pub variables: std::sync::Mutex<IndexMap<String, Value>>,
    pub environment: std::sync::Mutex<IndexMap<String, Value>>,
    pub templates: Arc<TemplateEngine>,
    pub check_mode: bool,
}

impl TaskContext {
    pub fn new(
        target_name: String,
        provider: Arc<AsyncMutex<Box<dyn Provider>>>,
        variables: IndexMap<String, Value>,
        environment: IndexMap<String, Value>,
        templates: Arc<TemplateEngine>,
        check_mode: bool,
    ) -> Self {
        Self {
            target_name,
            provider,
            exec_options: std::sync::Mutex::new(ExecOptions::default()),
            variables: std::sync::Mutex::new(variables),
            environment: std::sync::Mutex::new(environment),
            templates,
            check_mode,
        }
    }

    /// Run `command`, erroring on non-zero exit / timeout.
    pub async fn exec(&self, command: &str) -> Result<ExecResult> {
        let options = self.exec_options.lock().unwrap().clone();
        let provider = self.provider.lock().await;
        provider.executor(options).run(command, None).await
    }

    /// Run `command`, never erroring; failures come back as a non-zero
    /// [`ExecResult`].
    pub async fn exec_safe(&self, command: &str) -> ExecResult {
        let options = self.exec_options.lock().unwrap().clone();
        let provider = self.provider.lock().await;
        provider.executor(options).run_safe(command, None).await
    }

    pub async fn os_info(&self) -> OsInfo {
        let provider = self.provider.lock().await;
        provider.os_info().cloned().unwrap_or_else(OsInfo::unknown)
    }

    pub async fn write_file(&self, path: &str, content: &[u8], mode: Option<u32>) -> Result<()> {
        let provider = self.provider.lock().await;
        provider.write_file(path, content, mode).await
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let provider = self.provider.lock().await;
        provider.read_file(path).await
    }

    /// Snapshot `variables` (plus `environment`/`target`) as the scope
    /// object used for template rendering and expression evaluation.
    pub fn scope(&self) -> Value {
        let vars = self.variables.lock().unwrap();
        let mut map = serde_json::Map::new();
        for (k, v) in vars.iter() {
            map.insert(k.clone(), v.clone());
        }
        map.insert("target".to_string(), Value::String(self.target_name.clone()));
        Value::Object(map)
    }

    pub fn set_variable(&self, key: impl Into<String>, value: Value) {
        self.variables.lock().unwrap().insert(key.into(), value);
    }

    pub fn get_variable(&self, key: &str) -> Option<Value> {
        self.variables.lock().unwrap().get(key).cloned()
    }

    pub fn render(&self, text: &str) -> String {
        self.templates
            .render_template(text, &self.scope())
            .unwrap_or_else(|_| text.to_string())
    }

    pub fn render_params(&self, params: &ModuleParams) -> ModuleParams {
        let scope = self.scope();
        params
            .iter()
            .map(|(k, v)| (k.clone(), self.templates.eval_iterative(v, &scope, false)))
            .collect()
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

fn format_delta(start: &chrono::DateTime<Utc>, end: &chrono::DateTime<Utc>) -> String {
    let ms = (*end - *start).num_milliseconds().max(0) as u64;
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Drives one task against one already-`ensure_ready` target: constraint
/// solve, module lifecycle, and the control stack (environment, when,
/// register, until, loop, become).
pub struct TaskExecutor {
    registry: Arc<ModuleRegistry>,
}

impl TaskExecutor {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self { registry }
    }

    /// Run `task` against `ctx`. Returns the final [`ModuleResult`] (for a
    /// looped task, the result of the last iteration, with `data.loop_results`
    /// holding every iteration's result).
    #[instrument(skip(self, ctx, task), fields(target = %ctx.target_name, task = %task.display_name()))]
    pub async fn run(&self, task: &Task, ctx: &TaskContext) -> Result<ModuleResult> {
        controls::become_control::apply(task, ctx)?;

        let module = self
            .registry
            .get(task.module_name())
            .ok_or_else(|| Error::config(format!("unknown module '{}'", task.module_name())))?;

        let result = if let Some(loop_spec) = &task.loop_control {
            // `loop` wraps environment/when from the outside: each iteration
            // binds `item`/`loop.*` before either is (re-)evaluated, so a
            // `when` referencing the loop variable sees it bound.
            let items = controls::loop_control::resolve_items(loop_spec, ctx)?;
            let mut results = Vec::with_capacity(items.len());
            let mut last = ModuleResult::ok("loop produced no items");
            for (index, item) in items.iter().enumerate() {
                controls::loop_control::bind_item(loop_spec, ctx, item, index, items.len());
                controls::environment::apply(task, ctx)?;

                if let Some(when) = &task.when {
                    if !controls::when::evaluate(when, ctx)? {
                        let skipped = ModuleResult::skipped("condition evaluated false");
                        results.push(serde_json::to_value(&skipped).unwrap_or(Value::Null));
                        last = skipped;
                        continue;
                    }
                }

                let iteration = self.run_module_with_until(&*module, task, ctx).await?;
                let should_break = loop_spec
                    .break_when
                    .as_ref()
                    .map(|expr| ctx.templates.eval_bool(expr, &ctx.scope()).unwrap_or(false))
                    .unwrap_or(false);
                last = iteration.clone();
                results.push(serde_json::to_value(&iteration).unwrap_or(Value::Null));
                if let Some(pause) = loop_spec.pause_ms {
                    tokio::time::sleep(std::time::Duration::from_millis(pause)).await;
                }
                if should_break {
                    break;
                }
            }
            last.data.insert("loop_results".to_string(), Value::Array(results));
            last
        } else {
            controls::environment::apply(task, ctx)?;

            if let Some(when) = &task.when {
                if !controls::when::evaluate(when, ctx)? {
                    return Ok(ModuleResult::skipped("condition evaluated false"));
                }
            }

            self.run_module_with_until(&*module, task, ctx).await?
        };

        if let Some(register) = &task.register {
            controls::register::apply(register, ctx, &result);
        }

        Ok(result)
    }

    async fn run_module_with_until(
        &self,
        module: &dyn (crate::modules::Module),
        task: &Task,
        ctx: &TaskContext,
    ) -> Result<ModuleResult> {
        let retries = task.until.as_ref().map(|u| u.retries).unwrap_or(0);
        let delay_ms = task.until.as_ref().map(|u| u.delay_ms).unwrap_or(0);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let result = self.run_module_once(module, task, ctx).await;
            let rendered = match &result {
                Ok(r) => r.clone(),
                Err(e) => ModuleResult::failed(e.to_string()),
            };

            let satisfied = match &task.until {
                Some(until) => controls::until::is_satisfied(until, ctx, &rendered).unwrap_or(false),
                None => true,
            };

            if satisfied || attempts as u64 > retries {
                let mut final_result = rendered;
                if task.until.is_some() {
                    // `attempts` reports retries consumed, not executions
                    // performed: the first execution isn't a retry.
                    final_result.attempts = Some(attempts.saturating_sub(1));
                    final_result.retries = Some(retries as u32);
                    if !satisfied {
                        final_result.failed = true;
                    }
                }
                if final_result.failed && !task.allow_failure {
                    error!(task = %task.display_name(), target = %ctx.target_name, msg = ?final_result.msg, "task failed");
                    return Err(Error::TaskExecutionFailed {
                        task: task.display_name(),
                        target: ctx.target_name.clone(),
                        message: final_result.msg.clone().unwrap_or_default(),
                    });
                }
                return Ok(final_result);
            }

            if delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }
        }
    }

    async fn run_module_once(
        &self,
        module: &dyn (crate::modules::Module),
        task: &Task,
        ctx: &TaskContext,
    ) -> Result<ModuleResult> {
        let params = ctx.render_params(&task.params);
        let start = Utc::now();

        {
            let mut provider = ctx.provider.lock().await;
            constraints::solve(module.name(), &module.constraints(), provider.as_mut()).await?;
        }
        module.check(ctx, &params).await?;
        module.initialize(ctx, &params).await?;
        let mut result = module.execute(ctx, &params).await?;
        module.cleanup(ctx, &params).await?;

        let end = Utc::now();
        result.start.get_or_insert_with(|| start.to_rfc3339());
        result.end.get_or_insert_with(now_iso);
        result.delta.get_or_insert_with(|| format_delta(&start, &end));
        Ok(result)
    }
}

/// Monotonic counter for synthesizing distinct loop-index var names; unused
/// today but kept for nested-loop disambiguation hooks.
pub static TASK_SEQUENCE: AtomicU32 = AtomicU32::new(0);

pub fn next_task_sequence() -> u32 {
    TASK_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Summary accumulated by [`crate::engine::EngineEntry::run`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunSummary {
    pub ok: u32,
    pub changed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl RunSummary {
    pub fn record(&mut self, result: &ModuleResult) {
        if result.skipped {
            self.skipped += 1;
        } else if result.failed {
            self.failed += 1;
        } else if result.changed {
            self.changed += 1;
        } else {
            self.ok += 1;
        }
    }
}

/// Build the per-target variable scope: target variables, then task-file
/// variables, then per-task variables (later wins).
pub fn build_scope(
    host: &ResolvedHost,
    file_vars: &IndexMap<String, Value>,
    task_vars: &IndexMap<String, Value>,
) -> IndexMap<String, Value> {
    let mut scope = IndexMap::new();
    for (k, v) in &host.variables {
        scope.insert(k.clone(), serde_json::to_value(v).unwrap_or(Value::Null));
    }
    scope.extend(file_vars.clone());
    scope.extend(task_vars.clone());
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_delta_as_hms_millis() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::milliseconds(3_723_456);
        assert_eq!(format_delta(&start, &end), "1:02:03.456");
    }

    #[test]
    fn run_summary_buckets_results() {
        let mut summary = RunSummary::default();
        summary.record(&ModuleResult::ok("x"));
        summary.record(&ModuleResult::changed("x"));
        summary.record(&ModuleResult::skipped("x"));
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.skipped, 1);
    }
}
