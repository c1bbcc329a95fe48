//! `shell`: run a command through the target's default shell, enabling
//! pipes, redirects, globs, and variable expansion.

use async_trait::async_trait;

use crate::error::Result;
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

pub struct ShellModule;

#[async_trait]
impl super::Module for ShellModule {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        params.get_string_required("cmd")?;
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let cmd = params.get_string_required("cmd")?;

        if let Some(creates) = params.get_string("creates") {
            let check = format!("test -e {}", shell_words::quote(&creates));
            if ctx.exec_safe(&check).await.is_success() {
                return Ok(ModuleResult::ok(format!("skipped, '{creates}' already exists")));
            }
        }
        if let Some(removes) = params.get_string("removes") {
            let check = format!("test -e {}", shell_words::quote(&removes));
            if !ctx.exec_safe(&check).await.is_success() {
                return Ok(ModuleResult::ok(format!("skipped, '{removes}' does not exist")));
            }
        }

        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!("would execute: {cmd}")));
        }

        let chdir = params.get_string("chdir");
        let script = match &chdir {
            Some(dir) => format!("cd {} && {}", shell_words::quote(dir), cmd),
            None => cmd.clone(),
        };

        let result = ctx.exec_safe(&script).await;
        let warn_on_stderr = params.get_bool_or("warn", true);

        if !result.is_success() {
            return Err(crate::error::Error::ExecFailed {
                code: result.code,
                stderr: if result.stderr.is_empty() { result.stdout } else { result.stderr },
            });
        }

        let mut module_result = ModuleResult::changed(format!("'{cmd}' executed"));
        module_result.stdout = Some(result.stdout);
        module_result.stderr = Some(result.stderr.clone());
        if warn_on_stderr && !result.stderr.is_empty() {
            module_result = module_result.with_data("warnings", serde_json::json!([result.stderr]));
        }
        Ok(module_result)
    }
}
