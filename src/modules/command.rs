//! `command`: run a command without shell interpretation (no pipes,
//! redirects, or variable expansion). For shell features, use `shell`.

use async_trait::async_trait;

use crate::error::Result;
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

pub struct CommandModule;

impl CommandModule {
    fn build_command_line(params: &ModuleParams) -> Result<String> {
        if let Some(argv) = params.get_vec_string("argv") {
            if argv.is_empty() {
                return Err(crate::error::Error::config("argv cannot be empty"));
            }
            return Ok(shell_words::join(&argv));
        }
        params.get_string_required("cmd")
    }

    /// `creates`/`removes` skip the command entirely when the named path
    /// already exists / is already absent, without touching the target.
    async fn skip_reason(ctx: &TaskContext, params: &ModuleParams) -> Option<String> {
        if let Some(creates) = params.get_string("creates") {
            let check = format!("test -e {}", shell_words::quote(&creates));
            if ctx.exec_safe(&check).await.is_success() {
                return Some(format!("skipped, '{creates}' already exists"));
            }
        }
        if let Some(removes) = params.get_string("removes") {
            let check = format!("test -e {}", shell_words::quote(&removes));
            if !ctx.exec_safe(&check).await.is_success() {
                return Some(format!("skipped, '{removes}' does not exist"));
            }
        }
        None
    }
}

#[async_trait]
impl super::Module for CommandModule {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        if params.get("cmd").is_none() && params.get("argv").is_none() {
            return Err(crate::error::Error::config(
                "command: either 'cmd' or 'argv' must be provided",
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        if let Some(reason) = Self::skip_reason(ctx, params).await {
            return Ok(ModuleResult::ok(reason));
        }

        let command = Self::build_command_line(params)?;
        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!("would execute: {command}")));
        }

        let chdir = params.get_string("chdir");
        let prefixed = match &chdir {
            Some(dir) => format!("cd {} && {}", shell_words::quote(dir), command),
            None => command.clone(),
        };
        let warn_on_stderr = params.get_bool_or("warn", true);
        let result = ctx.exec_safe(&prefixed).await;

        if !result.is_success() {
            return Err(crate::error::Error::ExecFailed {
                code: result.code,
                stderr: if result.stderr.is_empty() { result.stdout } else { result.stderr },
            });
        }

        let mut module_result = ModuleResult::changed(format!("'{command}' executed"));
        module_result.stdout = Some(result.stdout);
        module_result.stderr = Some(result.stderr.clone());
        if warn_on_stderr && !result.stderr.is_empty() {
            module_result = module_result.with_data("warnings", serde_json::json!([result.stderr]));
        }
        Ok(module_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_line_prefers_argv() {
        let mut params = ModuleParams::new();
        params.insert("argv".to_string(), serde_json::json!(["echo", "hi there"]));
        let line = CommandModule::build_command_line(&params).unwrap();
        assert_eq!(line, "echo 'hi there'");
    }

    #[test]
    fn build_command_line_rejects_empty_argv() {
        let mut params = ModuleParams::new();
        params.insert("argv".to_string(), serde_json::json!([]));
        assert!(CommandModule::build_command_line(&params).is_err());
    }
}
