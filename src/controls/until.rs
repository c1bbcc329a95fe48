//! `until` control (order 50): wraps `execute` in a do-while that re-runs
//! until `condition` evaluates truthy against the rendered result, bounded
//! by `retries` (default 0 ⇒ single run), with `delay` between attempts. On
//! exhaustion the last result is returned with `{failed:true, attempts,
//! retries}`.
//!
//! The retry loop itself lives in [`crate::executor::TaskExecutor`] (it
//! needs to re-invoke the full module lifecycle per attempt); this module
//! holds the spec type and the condition check it evaluates each iteration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::executor::TaskContext;
use crate::modules::ModuleResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UntilSpec {
    pub condition: String,
    #[serde(default)]
    pub retries: u64,
    #[serde(default, rename = "delay")]
    pub delay_ms: u64,
}

/// `true` once `result` satisfies `condition` evaluated against
/// `ctx.variables` extended with `result`.
pub fn is_satisfied(spec: &UntilSpec, ctx: &TaskContext, result: &ModuleResult) -> Result<bool> {
    let mut scope = ctx.scope();
    if let serde_json::Value::Object(map) = &mut scope {
        map.insert(
            "result".to_string(),
            serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
        );
    }
    ctx.templates.eval_bool(&spec.condition, &scope)
}
