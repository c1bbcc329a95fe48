//! `debug`: print a message or a variable's value from the task's scope.
//! Runs entirely on the control side, never touching the target.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "(undefined)".to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

pub struct DebugModule;

#[async_trait]
impl super::Module for DebugModule {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        if params.get("msg").is_none() && params.get("var").is_none() {
            return Err(Error::config("debug: either 'msg' or 'var' must be provided"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        if let Some(var_name) = params.get_string("var") {
            let value = ctx.get_variable(&var_name).unwrap_or(Value::Null);
            let rendered = format!("{var_name} = {}", format_value(&value));
            info!(target: "katmer::debug", "{rendered}");
            return Ok(ModuleResult::ok(rendered).with_data(var_name, value));
        }

        let msg = params.get_string("msg").unwrap_or_default();
        let rendered = ctx.render(&msg);
        info!(target: "katmer::debug", "{rendered}");
        Ok(ModuleResult::ok(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_value_renders_strings_bare() {
        assert_eq!(format_value(&Value::String("hi".to_string())), "hi");
        assert_eq!(format_value(&Value::Null), "(undefined)");
    }
}
