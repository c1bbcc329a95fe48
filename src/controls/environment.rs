//! `environment` control (order 10): merges provider ⊕ task environment
//! into the executor's per-call env before the module runs.

use crate::error::Result;
use crate::executor::TaskContext;
use crate::taskfile::Task;

/// If `task.environment` is a string, expression-evaluate it against
/// `ctx.variables` to yield a map; otherwise use it directly. Render every
/// value as a template string, drop null/undefined, and merge into
/// `ctx.exec_options.env` (task-declared keys win over provider defaults
/// already present in the environment scope).
pub fn apply(task: &Task, ctx: &TaskContext) -> Result<()> {
    let Some(env_spec) = &task.environment else {
        return Ok(());
    };

    let scope = ctx.scope();
    let resolved = env_spec.resolve(ctx, &scope)?;

    let mut env = ctx.environment.lock().unwrap().clone();
    for (k, v) in resolved {
        env.insert(k, v);
    }
    *ctx.environment.lock().unwrap() = env.clone();

    let mut options = ctx.exec_options.lock().unwrap();
    for (k, v) in env {
        if let Some(s) = v.as_str() {
            options.env.insert(k, s.to_string());
        } else if !v.is_null() {
            options.env.insert(k, v.to_string());
        }
    }
    Ok(())
}
