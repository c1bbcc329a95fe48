//! `package`: install/remove packages through whichever system package
//! manager is present on the target (apt, dnf, yum, pacman, zypper, apk,
//! brew), probed and driven entirely over `ctx.exec` so it works the same
//! locally and over SSH.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

use super::{validate_package_name, ModuleParams, ModuleResult, ParamExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
    Apk,
    Brew,
}

impl PackageManager {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "apt" | "apt-get" => Ok(PackageManager::Apt),
            "dnf" => Ok(PackageManager::Dnf),
            "yum" => Ok(PackageManager::Yum),
            "pacman" => Ok(PackageManager::Pacman),
            "zypper" => Ok(PackageManager::Zypper),
            "apk" => Ok(PackageManager::Apk),
            "brew" | "homebrew" => Ok(PackageManager::Brew),
            other => Err(Error::config(format!("package: unknown package manager '{other}'"))),
        }
    }

    async fn detect(ctx: &TaskContext) -> Result<Self> {
        const CANDIDATES: &[(&str, PackageManager)] = &[
            ("apt-get", PackageManager::Apt),
            ("dnf", PackageManager::Dnf),
            ("yum", PackageManager::Yum),
            ("pacman", PackageManager::Pacman),
            ("zypper", PackageManager::Zypper),
            ("apk", PackageManager::Apk),
            ("brew", PackageManager::Brew),
        ];
        for (bin, manager) in CANDIDATES {
            if ctx.exec_safe(&format!("which {bin}")).await.is_success() {
                return Ok(*manager);
            }
        }
        Err(Error::config("package: could not detect a supported package manager on target"))
    }

    fn install_cmd(&self, packages: &[String]) -> String {
        let joined = packages.join(" ");
        match self {
            PackageManager::Apt => format!("DEBIAN_FRONTEND=noninteractive apt-get install -y {joined}"),
            PackageManager::Dnf => format!("dnf install -y {joined}"),
            PackageManager::Yum => format!("yum install -y {joined}"),
            PackageManager::Pacman => format!("pacman -S --noconfirm {joined}"),
            PackageManager::Zypper => format!("zypper install -y {joined}"),
            PackageManager::Apk => format!("apk add {joined}"),
            PackageManager::Brew => format!("brew install {joined}"),
        }
    }

    fn remove_cmd(&self, packages: &[String]) -> String {
        let joined = packages.join(" ");
        match self {
            PackageManager::Apt => format!("apt-get remove -y {joined}"),
            PackageManager::Dnf => format!("dnf remove -y {joined}"),
            PackageManager::Yum => format!("yum remove -y {joined}"),
            PackageManager::Pacman => format!("pacman -R --noconfirm {joined}"),
            PackageManager::Zypper => format!("zypper remove -y {joined}"),
            PackageManager::Apk => format!("apk del {joined}"),
            PackageManager::Brew => format!("brew uninstall {joined}"),
        }
    }

    fn update_cmd(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get update",
            PackageManager::Dnf => "dnf makecache",
            PackageManager::Yum => "yum makecache",
            PackageManager::Pacman => "pacman -Sy",
            PackageManager::Zypper => "zypper refresh",
            PackageManager::Apk => "apk update",
            PackageManager::Brew => "brew update",
        }
    }

    async fn is_installed(&self, ctx: &TaskContext, package: &str) -> bool {
        let quoted = shell_words::quote(package);
        let check = match self {
            PackageManager::Apt => format!("dpkg -s {quoted}"),
            PackageManager::Dnf | PackageManager::Yum | PackageManager::Zypper => format!("rpm -q {quoted}"),
            PackageManager::Pacman => format!("pacman -Q {quoted}"),
            PackageManager::Apk => format!("apk info -e {quoted}"),
            PackageManager::Brew => format!("brew list {quoted}"),
        };
        ctx.exec_safe(&check).await.is_success()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackageState {
    Present,
    Absent,
    Latest,
}

impl PackageState {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "present" | "installed" => Ok(PackageState::Present),
            "absent" | "removed" => Ok(PackageState::Absent),
            "latest" => Ok(PackageState::Latest),
            other => Err(Error::config(format!(
                "package: invalid state '{other}' (expected present, absent, latest)"
            ))),
        }
    }
}

fn wanted_packages(params: &ModuleParams) -> Result<Vec<String>> {
    let names = params
        .get_vec_string("name")
        .unwrap_or(Vec::new());
    let names = if names.is_empty() {
        vec![params.get_string_required("name")?]
    } else {
        names
    };
    for name in &names {
        validate_package_name(name)?;
    }
    Ok(names)
}

pub struct PackageModule;

#[async_trait]
impl super::Module for PackageModule {
    fn name(&self) -> &'static str {
        "package"
    }

    async fn check(&self, _ctx: &TaskContext, params: &ModuleParams) -> Result<()> {
        wanted_packages(params)?;
        let state = params.get_string("state").unwrap_or_else(|| "present".to_string());
        PackageState::parse(&state)?;
        Ok(())
    }

    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult> {
        let manager = match params.get_string("use") {
            Some(name) => PackageManager::parse(&name)?,
            None => PackageManager::detect(ctx).await?,
        };
        let packages = wanted_packages(params)?;
        let state = PackageState::parse(&params.get_string("state").unwrap_or_else(|| "present".to_string()))?;
        let update_cache = params.get_bool_or("update_cache", false);

        if update_cache && !ctx.check_mode {
            ctx.exec_safe(manager.update_cmd()).await;
        }

        let mut to_install = Vec::new();
        let mut to_remove = Vec::new();
        let mut already_ok = Vec::new();

        for package in &packages {
            let installed = manager.is_installed(ctx, package).await;
            match state {
                PackageState::Present => {
                    if installed {
                        already_ok.push(package.clone());
                    } else {
                        to_install.push(package.clone());
                    }
                }
                PackageState::Absent => {
                    if installed {
                        to_remove.push(package.clone());
                    } else {
                        already_ok.push(package.clone());
                    }
                }
                PackageState::Latest => to_install.push(package.clone()),
            }
        }

        if to_install.is_empty() && to_remove.is_empty() {
            return Ok(ModuleResult::ok(format!(
                "all packages already in desired state: {}",
                already_ok.join(", ")
            )));
        }

        if ctx.check_mode {
            let mut msg = String::new();
            if !to_install.is_empty() {
                msg.push_str(&format!("would install: {}. ", to_install.join(", ")));
            }
            if !to_remove.is_empty() {
                msg.push_str(&format!("would remove: {}. ", to_remove.join(", ")));
            }
            return Ok(ModuleResult::changed(msg.trim().to_string()));
        }

        if !to_install.is_empty() {
            let result = ctx.exec(&manager.install_cmd(&to_install)).await?;
            if !result.is_success() {
                return Err(Error::ExecFailed {
                    code: result.code,
                    stderr: if result.stderr.is_empty() { result.stdout } else { result.stderr },
                });
            }
        }
        if !to_remove.is_empty() {
            let result = ctx.exec(&manager.remove_cmd(&to_remove)).await?;
            if !result.is_success() {
                return Err(Error::ExecFailed {
                    code: result.code,
                    stderr: if result.stderr.is_empty() { result.stdout } else { result.stderr },
                });
            }
        }

        let mut msg = String::new();
        if !to_install.is_empty() {
            msg.push_str(&format!("installed: {}. ", to_install.join(", ")));
        }
        if !to_remove.is_empty() {
            msg.push_str(&format!("removed: {}. ", to_remove.join(", ")));
        }
        Ok(ModuleResult::changed(msg.trim().to_string())
            .with_data("installed", serde_json::json!(to_install))
            .with_data("removed", serde_json::json!(to_remove)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_state_parses_aliases() {
        assert_eq!(PackageState::parse("installed").unwrap(), PackageState::Present);
        assert_eq!(PackageState::parse("removed").unwrap(), PackageState::Absent);
        assert!(PackageState::parse("bogus").is_err());
    }

    #[test]
    fn package_manager_parses_names() {
        assert_eq!(PackageManager::parse("apt-get").unwrap(), PackageManager::Apt);
        assert_eq!(PackageManager::parse("homebrew").unwrap(), PackageManager::Brew);
        assert!(PackageManager::parse("bogus").is_err());
    }

    #[test]
    fn install_cmd_joins_package_list() {
        let cmd = PackageManager::Apt.install_cmd(&["nginx".to_string(), "curl".to_string()]);
        assert!(cmd.contains("nginx curl"));
    }
}
