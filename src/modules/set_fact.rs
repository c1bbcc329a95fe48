//! `set_fact`: set one or more variables on the task's running scope. Runs
//! entirely in [`TaskContext`] and never touches the target, so it behaves
//! identically in check mode.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult};

pub struct SetFactModule;

#[async_trait]
impl super::Module for SetFactModule {
    fn name(&self) -> &'static str {
        "set_fact"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        let fact_count = params.keys().filter(|k| k.as_str() != "cacheable").count();
        if fact_count == 0 {
            return Err(Error::config("set_fact: at least one key=value pair must be set"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let mut names = Vec::new();
        let mut result = ModuleResult::ok("");

        for (key, value) in params {
            if key == "cacheable" {
                continue;
            }
            ctx.set_variable(key.clone(), value.clone());
            result = result.with_data(key.clone(), value.clone());
            names.push(key.clone());
        }

        result.msg = Some(if names.len() == 1 {
            format!("set fact: {}", names[0])
        } else {
            format!("set {} facts: {}", names.len(), names.join(", "))
        });
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_at_least_one_fact() {
        let params = ModuleParams::new();
        assert_eq!(params.keys().filter(|k| k.as_str() != "cacheable").count(), 0);
    }
}
