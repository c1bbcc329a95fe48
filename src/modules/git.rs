//! `git`: clone or update a git repository on the target, checking out a
//! branch/tag/commit, over `ctx.exec` so it works the same locally and over
//! SSH.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

fn ssh_command_env(params: &ModuleParams) -> Option<String> {
    let mut parts = vec!["ssh".to_string()];
    if let Some(key) = params.get_string("key_file") {
        parts.push(format!("-i {}", shell_words::quote(&key)));
        parts.push("-o IdentitiesOnly=yes".to_string());
    }
    if params.get_bool_or("accept_hostkey", false) {
        parts.push("-o StrictHostKeyChecking=no".to_string());
        parts.push("-o UserKnownHostsFile=/dev/null".to_string());
    }
    if let Some(opts) = params.get_string("ssh_opts") {
        parts.push(opts);
    }
    if parts.len() > 1 {
        Some(parts.join(" "))
    } else {
        None
    }
}

fn env_prefix(params: &ModuleParams) -> String {
    match ssh_command_env(params) {
        Some(cmd) => format!("GIT_SSH_COMMAND={} ", shell_words::quote(&cmd)),
        None => String::new(),
    }
}

async fn current_commit(ctx: &TaskContext, dest: &str) -> Option<String> {
    let quoted = shell_words::quote(dest);
    let result = ctx.exec_safe(&format!("git -C {quoted} rev-parse HEAD")).await;
    if result.is_success() {
        Some(result.stdout.trim().to_string())
    } else {
        None
    }
}

pub struct GitModule;

#[async_trait]
impl super::Module for GitModule {
    fn name(&self) -> &'static str {
        "git"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        params.get_string_required("repo")?;
        params.get_string_required("dest")?;
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let repo = params.get_string_required("repo")?;
        let dest = params.get_string_required("dest")?;
        let dest_quoted = shell_words::quote(&dest);
        let version = params.get_string("version").unwrap_or_else(|| "HEAD".to_string());
        let depth = params.get_i64("depth");
        let force = params.get_bool_or("force", false);
        let env = env_prefix(params);

        let exists = ctx.exec_safe(&format!("test -d {dest_quoted}/.git")).await.is_success();
        let before = if exists { current_commit(ctx, &dest).await } else { None };

        if !exists {
            if ctx.check_mode {
                return Ok(ModuleResult::changed(format!("would clone '{repo}' into '{dest}'")));
            }
            let depth_flag = depth.map(|d| format!("--depth {d} ")).unwrap_or_default();
            let clone_cmd = format!("{env}git clone {depth_flag}{} {dest_quoted}", shell_words::quote(&repo));
            let result = ctx.exec(&clone_cmd).await?;
            if !result.is_success() {
                return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
            }
        } else {
            if force {
                ctx.exec(&format!("git -C {dest_quoted} reset --hard")).await?;
                ctx.exec(&format!("git -C {dest_quoted} clean -fd")).await?;
            }
            if ctx.check_mode {
                return Ok(ModuleResult::changed(format!("would fetch updates for '{dest}'")));
            }
            let fetch_cmd = format!("{env}git -C {dest_quoted} fetch --all --tags");
            let result = ctx.exec(&fetch_cmd).await?;
            if !result.is_success() {
                return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
            }
        }

        if version != "HEAD" || !exists {
            let checkout_cmd = format!(
                "git -C {dest_quoted} checkout {} 2>/dev/null || git -C {dest_quoted} checkout -b {} origin/{}",
                shell_words::quote(&version),
                shell_words::quote(&version),
                shell_words::quote(&version),
            );
            if !ctx.check_mode {
                ctx.exec_safe(&checkout_cmd).await;
            }
        }

        let after = current_commit(ctx, &dest).await;
        if exists && before == after && !force {
            return Ok(ModuleResult::ok(format!("'{dest}' already at '{}'", after.clone().unwrap_or_default()))
                .with_data("commit", serde_json::json!(after)));
        }

        let verb = if exists { "updated" } else { "cloned" };
        Ok(ModuleResult::changed(format!("{verb} '{repo}' into '{dest}'"))
            .with_data("before", serde_json::json!(before))
            .with_data("after", serde_json::json!(after)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_command_env_combines_key_and_hostkey_options() {
        let mut params = ModuleParams::new();
        params.insert("key_file".to_string(), serde_json::json!("/home/u/.ssh/id_ed25519"));
        params.insert("accept_hostkey".to_string(), serde_json::json!(true));
        let cmd = ssh_command_env(&params).unwrap();
        assert!(cmd.contains("-i"));
        assert!(cmd.contains("StrictHostKeyChecking=no"));
    }

    #[test]
    fn env_prefix_empty_without_ssh_options() {
        let params = ModuleParams::new();
        assert_eq!(env_prefix(&params), "");
    }
}
