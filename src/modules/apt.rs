//! `apt`: Debian/Ubuntu package management. A thin specialization of the
//! generic [`super::package`] module for APT-specific options (`.deb` file
//! installs, `autoremove`, `cache_valid_time`) that `package` has no notion
//! of.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{validate_package_name, ModuleParams, ModuleResult, ParamExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AptState {
    Present,
    Absent,
    Latest,
}

impl AptState {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "present" | "installed" => Ok(AptState::Present),
            "absent" | "removed" => Ok(AptState::Absent),
            "latest" => Ok(AptState::Latest),
            other => Err(Error::config(format!(
                "apt: invalid state '{other}' (expected present, absent, latest)"
            ))),
        }
    }
}

async fn is_installed(ctx: &TaskContext, package: &str) -> bool {
    let quoted = shell_words::quote(package);
    ctx.exec_safe(&format!("dpkg -s {quoted}")).await.is_success()
}

async fn cache_is_stale(ctx: &TaskContext, valid_secs: u64) -> bool {
    let probe = ctx
        .exec_safe("stat -c %Y /var/cache/apt/pkgcache.bin 2>/dev/null || echo 0")
        .await;
    let mtime: u64 = probe.stdout.trim().parse().unwrap_or(0);
    if mtime == 0 {
        return true;
    }
    let now = ctx.exec_safe("date +%s").await;
    let now: u64 = now.stdout.trim().parse().unwrap_or(0);
    now.saturating_sub(mtime) > valid_secs
}

pub struct AptModule;

#[async_trait]
impl super::Module for AptModule {
    fn name(&self) -> &'static str {
        "apt"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        if params.get("deb").is_none() {
            let names = params.get_vec_string("name").unwrap_or_default();
            if names.is_empty() && params.get_string("name").is_none() {
                return Err(Error::config("apt: 'name' or 'deb' must be provided"));
            }
            for name in names {
                validate_package_name(&name)?;
            }
        }
        let state = params.get_string("state").unwrap_or_else(|| "present".to_string());
        AptState::parse(&state)?;
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let update_cache = params.get_bool_or("update_cache", false);
        let cache_valid_time = params.get_i64("cache_valid_time").unwrap_or(0).max(0) as u64;

        if update_cache && (cache_valid_time == 0 || cache_is_stale(ctx, cache_valid_time).await) {
            if ctx.check_mode {
                return Ok(ModuleResult::changed("would refresh apt cache"));
            }
            let result = ctx.exec("apt-get update").await?;
            if !result.is_success() {
                return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
            }
        }

        if let Some(deb) = params.get_string("deb") {
            let quoted = shell_words::quote(&deb);
            if ctx.check_mode {
                return Ok(ModuleResult::changed(format!("would install local package '{deb}'")));
            }
            let result = ctx.exec(&format!("DEBIAN_FRONTEND=noninteractive apt install -y {quoted}")).await?;
            if !result.is_success() {
                return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
            }
            return Ok(ModuleResult::changed(format!("installed local package '{deb}'")));
        }

        let packages = {
            let names = params.get_vec_string("name").unwrap_or_default();
            if names.is_empty() {
                vec![params.get_string_required("name")?]
            } else {
                names
            }
        };
        for name in &packages {
            validate_package_name(name)?;
        }
        let state = AptState::parse(&params.get_string("state").unwrap_or_else(|| "present".to_string()))?;

        let mut to_install = Vec::new();
        let mut to_remove = Vec::new();
        for package in &packages {
            let installed = is_installed(ctx, package).await;
            match state {
                AptState::Present => {
                    if !installed {
                        to_install.push(package.clone());
                    }
                }
                AptState::Latest => to_install.push(package.clone()),
                AptState::Absent => {
                    if installed {
                        to_remove.push(package.clone());
                    }
                }
            }
        }

        if to_install.is_empty() && to_remove.is_empty() {
            return Ok(ModuleResult::ok("all packages already in desired state"));
        }
        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!(
                "would install: [{}], remove: [{}]",
                to_install.join(", "),
                to_remove.join(", ")
            )));
        }

        if !to_install.is_empty() {
            let joined = to_install.join(" ");
            let result = ctx
                .exec(&format!("DEBIAN_FRONTEND=noninteractive apt-get install -y {joined}"))
                .await?;
            if !result.is_success() {
                return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
            }
        }
        if !to_remove.is_empty() {
            let joined = to_remove.join(" ");
            let autoremove = if params.get_bool_or("autoremove", false) { " --autoremove" } else { "" };
            let result = ctx.exec(&format!("apt-get remove -y{autoremove} {joined}")).await?;
            if !result.is_success() {
                return Err(Error::ExecFailed { code: result.code, stderr: result.stderr });
            }
        }

        Ok(ModuleResult::changed(format!(
            "installed: [{}], removed: [{}]",
            to_install.join(", "),
            to_remove.join(", ")
        ))
        .with_data("installed", serde_json::json!(to_install))
        .with_data("removed", serde_json::json!(to_remove)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apt_state_parses_aliases() {
        assert_eq!(AptState::parse("installed").unwrap(), AptState::Present);
        assert_eq!(AptState::parse("removed").unwrap(), AptState::Absent);
        assert!(AptState::parse("bogus").is_err());
    }
}
