//! `hostname`: set the system hostname, preferring `hostnamectl` on systemd
//! targets and falling back to `/etc/hostname` + `hostname` otherwise.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

static HOSTNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Systemd,
    File,
}

async fn detect_strategy(ctx: &TaskContext) -> Strategy {
    if ctx.exec_safe("which hostnamectl").await.is_success()
        && ctx.exec_safe("test -d /run/systemd/system").await.is_success()
    {
        Strategy::Systemd
    } else {
        Strategy::File
    }
}

async fn current_hostname(ctx: &TaskContext) -> String {
    ctx.exec_safe("hostname").await.stdout.trim().to_string()
}

pub struct HostnameModule;

#[async_trait]
impl super::Module for HostnameModule {
    fn name(&self) -> &'static str {
        "hostname"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        let name = params.get_string_required("name")?;
        if !HOSTNAME_PATTERN.is_match(&name) {
            return Err(Error::config(format!("hostname: invalid hostname '{name}'")));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let name = params.get_string_required("name")?;
        let current = current_hostname(ctx).await;

        if current == name {
            return Ok(ModuleResult::ok(format!("hostname already '{name}'")));
        }
        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!("would set hostname to '{name}'")));
        }

        let quoted = shell_words::quote(&name);
        let strategy = match params.get_string("use") {
            Some(s) if s == "systemd" => Strategy::Systemd,
            Some(s) if s == "file" => Strategy::File,
            _ => detect_strategy(ctx).await,
        };

        let result = match strategy {
            Strategy::Systemd => ctx.exec(&format!("hostnamectl set-hostname {quoted}")).await?,
            Strategy::File => {
                ctx.write_file("/etc/hostname", format!("{name}\n").as_bytes(), None).await?;
                ctx.exec(&format!("hostname {quoted}")).await?
            }
        };
        if !result.is_success() {
            return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
        }

        Ok(ModuleResult::changed(format!("hostname set to '{name}'"))
            .with_data("previous", serde_json::json!(current))
            .with_data("current", serde_json::json!(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_pattern_rejects_invalid_names() {
        assert!(HOSTNAME_PATTERN.is_match("web-01.internal"));
        assert!(!HOSTNAME_PATTERN.is_match("-bad"));
        assert!(!HOSTNAME_PATTERN.is_match("bad_host!"));
    }
}
