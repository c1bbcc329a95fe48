//! `systemd`: manage a systemd unit's running/enabled state via `systemctl`,
//! and optionally install the unit file itself.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{ModuleParams, ModuleResult, ParamExt};

static UNIT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_@.\-]+\.(service|socket|timer|path|mount|automount|swap|slice|scope|target)$").unwrap()
});

fn normalize_unit(name: &str) -> String {
    if UNIT_NAME.is_match(name) {
        name.to_string()
    } else {
        format!("{name}.service")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Started,
    Stopped,
    Restarted,
    Reloaded,
}

impl RunState {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "started" | "running" => Ok(RunState::Started),
            "stopped" => Ok(RunState::Stopped),
            "restarted" => Ok(RunState::Restarted),
            "reloaded" => Ok(RunState::Reloaded),
            other => Err(Error::config(format!(
                "systemd: invalid state '{other}' (expected started, stopped, restarted, reloaded)"
            ))),
        }
    }
}

async fn is_active(ctx: &TaskContext, unit: &str) -> bool {
    ctx.exec_safe(&format!("systemctl is-active --quiet {}", shell_words::quote(unit)))
        .await
        .is_success()
}

async fn is_enabled(ctx: &TaskContext, unit: &str) -> bool {
    ctx.exec_safe(&format!("systemctl is-enabled --quiet {}", shell_words::quote(unit)))
        .await
        .is_success()
}

pub struct SystemdModule;

#[async_trait]
impl super::Module for SystemdModule {
    fn name(&self) -> &'static str {
        "systemd"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        params.get_string_required("name")?;
        if let Some(state) = params.get_string("state") {
            RunState::parse(&state)?;
        }
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let unit = normalize_unit(&params.get_string_required("name")?);
        let quoted = shell_words::quote(&unit);
        let mut changed = false;
        let mut notes = Vec::new();

        if params.get_bool_or("daemon_reload", false) {
            if ctx.check_mode {
                notes.push("would run daemon-reload".to_string());
            } else {
                ctx.exec("systemctl daemon-reload").await?;
                notes.push("daemon-reload executed".to_string());
                changed = true;
            }
        }

        if let Some(content) = params.get_string("content") {
            let dest = params
                .get_string("unit_path")
                .map(|p| format!("{p}/{unit}"))
                .unwrap_or_else(|| format!("/etc/systemd/system/{unit}"));
            let existing = ctx.read_file(&dest).await.ok();
            if existing.as_deref() != Some(content.as_bytes()) {
                if ctx.check_mode {
                    notes.push(format!("would write unit file '{dest}'"));
                } else {
                    ctx.write_file(&dest, content.as_bytes(), params.get_u32("mode")).await?;
                    ctx.exec("systemctl daemon-reload").await?;
                    notes.push(format!("wrote unit file '{dest}'"));
                }
                changed = true;
            }
        }

        if let Some(enabled) = params.get_bool("enabled") {
            let currently = is_enabled(ctx, &unit).await;
            if enabled != currently {
                if ctx.check_mode {
                    notes.push(format!("would {} '{unit}'", if enabled { "enable" } else { "disable" }));
                } else {
                    let verb = if enabled { "enable" } else { "disable" };
                    let result = ctx.exec(&format!("systemctl {verb} {quoted}")).await?;
                    if !result.is_success() {
                        return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
                    }
                    notes.push(format!("{verb}d '{unit}'"));
                }
                changed = true;
            }
        }

        if let Some(state) = params.get_string("state") {
            let state = RunState::parse(&state)?;
            let active = is_active(ctx, &unit).await;
            let (verb, will_change) = match state {
                RunState::Started => ("start", !active),
                RunState::Stopped => ("stop", active),
                RunState::Restarted => ("restart", true),
                RunState::Reloaded => ("reload-or-restart", true),
            };
            if will_change {
                if ctx.check_mode {
                    notes.push(format!("would {verb} '{unit}'"));
                } else {
                    let result = ctx.exec(&format!("systemctl {verb} {quoted}")).await?;
                    if !result.is_success() {
                        return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
                    }
                    notes.push(format!("{verb}ed '{unit}'"));
                }
                changed = true;
            }
        }

        if notes.is_empty() {
            notes.push(format!("'{unit}' already in desired state"));
        }
        let msg = notes.join("; ");
        Ok(if changed {
            ModuleResult::changed(msg)
        } else {
            ModuleResult::ok(msg)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_names_to_service_units() {
        assert_eq!(normalize_unit("nginx"), "nginx.service");
        assert_eq!(normalize_unit("foo.timer"), "foo.timer");
    }

    #[test]
    fn run_state_parses_aliases() {
        assert_eq!(RunState::parse("running").unwrap(), RunState::Started);
        assert!(RunState::parse("bogus").is_err());
    }
}
