//! `assert`: fail the task unless every condition expression evaluates
//! truthy against the task's scope. Runs entirely on the control side.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

fn conditions(params: &ModuleParams) -> Result<Vec<String>> {
    if let Some(list) = params.get_vec_string("that") {
        if list.is_empty() {
            return Err(Error::config("assert: 'that' cannot be empty"));
        }
        return Ok(list);
    }
    Err(Error::config("assert: 'that' must be provided"))
}

pub struct AssertModule;

#[async_trait]
impl super::Module for AssertModule {
    fn name(&self) -> &'static str {
        "assert"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        conditions(params)?;
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let scope = ctx.scope();
        let mut failed = Vec::new();

        for condition in conditions(params)? {
            match ctx.templates.eval_bool(&condition, &scope) {
                Ok(true) => {}
                Ok(false) => failed.push(condition),
                Err(e) => failed.push(format!("{condition} (evaluation error: {e})")),
            }
        }

        if failed.is_empty() {
            let success_msg = params.get_string("success_msg").unwrap_or_else(|| "all assertions passed".to_string());
            return Ok(ModuleResult::ok(success_msg));
        }

        let fail_msg = params
            .get_string("fail_msg")
            .unwrap_or_else(|| format!("assertion failed: {}", failed.join("; ")));
        Err(Error::config(fail_msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_rejects_empty_that() {
        let mut params = ModuleParams::new();
        params.insert("that".to_string(), serde_json::json!([]));
        assert!(conditions(&params).is_err());
    }
}
