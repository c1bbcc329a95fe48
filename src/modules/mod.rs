//! Module framework: the `Module` trait, its registry, and the shared result
//! shape every concrete module (`command`, `copy`, `apt`, …) returns.

pub mod apt;
pub mod archive;
pub mod assert;
pub mod command;
pub mod constraints;
pub mod copy;
pub mod cron;
pub mod debug;
pub mod file;
pub mod gather_facts;
pub mod git;
pub mod hostname;
pub mod package;
pub mod set_fact;
pub mod shell;
pub mod systemd_unit;
pub mod template;
pub mod unarchive;
pub mod uri;

pub use constraints::Constraints;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::executor::TaskContext;

/// Parameters a task passes to a module, after control keys are stripped and
/// templates rendered.
pub type ModuleParams = HashMap<String, Value>;

/// Extension trait for pulling typed values out of [`ModuleParams`].
pub trait ParamExt {
    fn get_string(&self, key: &str) -> Option<String>;
    fn get_string_required(&self, key: &str) -> Result<String>;
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_bool_or(&self, key: &str, default: bool) -> bool;
    fn get_u32(&self, key: &str) -> Option<u32>;
    fn get_i64(&self, key: &str) -> Option<i64>;
    fn get_vec_string(&self, key: &str) -> Option<Vec<String>>;
}

impl ParamExt for ModuleParams {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }

    fn get_string_required(&self, key: &str) -> Result<String> {
        self.get_string(key)
            .ok_or_else(|| crate::error::Error::config(format!("missing required parameter '{key}'")))
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Some(true),
                "false" | "no" | "0" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    fn get_u32(&self, key: &str) -> Option<u32> {
        match self.get(key) {
            Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Some(Value::String(s)) => {
                let s = s.trim();
                if let Some(octal) = s.strip_prefix('0') {
                    if !octal.is_empty() && octal.chars().all(|c| c.is_ascii_digit()) {
                        return u32::from_str_radix(octal, 8).ok();
                    }
                }
                s.parse().ok()
            }
            _ => None,
        }
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    fn get_vec_string(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key) {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Some(Value::String(s)) => Some(s.split(',').map(|p| p.trim().to_string()).collect()),
            _ => None,
        }
    }
}

/// Normalized outcome of one module call. The engine fills in
/// `changed`/`failed`/`start`/`end`/`delta` after `execute` returns;
/// `attempts`/`retries` are filled by the `until` control.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleResult {
    pub changed: bool,
    pub failed: bool,
    pub skipped: bool,
    pub msg: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub delta: Option<String>,
    pub attempts: Option<u32>,
    pub retries: Option<u32>,
    #[serde(flatten)]
    pub data: HashMap<String, Value>,
}

impl ModuleResult {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    pub fn changed(msg: impl Into<String>) -> Self {
        Self {
            changed: true,
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            failed: true,
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    pub fn skipped(msg: impl Into<String>) -> Self {
        Self {
            skipped: true,
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// The trait every concrete module implements. The base lifecycle the
/// executor drives is `do_check = constraint-solve + check(); do_initialize
/// = initialize(); do_execute = execute(); do_cleanup = cleanup()`.
#[async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;

    /// Platform/arch/root/kernel/binary/package gate, run before `check`.
    fn constraints(&self) -> Constraints {
        Constraints::always()
    }

    /// Module-specific pre-flight validation, run after the constraint
    /// solver. Default: nothing to check.
    async fn check(&self, _ctx: &TaskContext, _params: &ModuleParams) -> Result<()> {
        Ok(())
    }

    /// Acquire any module-specific resources. Default: no-op.
    async fn initialize(&self, _ctx: &TaskContext, _params: &ModuleParams) -> Result<()> {
        Ok(())
    }

    /// Perform the module's work and report what happened.
    async fn execute(&self, ctx: &TaskContext, params: &ModuleParams) -> Result<ModuleResult>;

    /// Release any module-specific resources. Default: no-op.
    async fn cleanup(&self, _ctx: &TaskContext, _params: &ModuleParams) -> Result<()> {
        Ok(())
    }
}

/// Looks up modules by the task-file key that selects them (`command`,
/// `copy`, `apt`, …).
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(command::CommandModule));
        registry.register(Arc::new(shell::ShellModule));
        registry.register(Arc::new(copy::CopyModule));
        registry.register(Arc::new(template::TemplateModule));
        registry.register(Arc::new(file::FileModule));
        registry.register(Arc::new(package::PackageModule));
        registry.register(Arc::new(apt::AptModule));
        registry.register(Arc::new(systemd_unit::SystemdModule));
        registry.register(Arc::new(cron::CronModule));
        registry.register(Arc::new(git::GitModule));
        registry.register(Arc::new(archive::ArchiveModule));
        registry.register(Arc::new(unarchive::UnarchiveModule));
        registry.register(Arc::new(uri::UriModule));
        registry.register(Arc::new(set_fact::SetFactModule));
        registry.register(Arc::new(debug::DebugModule));
        registry.register(Arc::new(hostname::HostnameModule));
        registry.register(Arc::new(gather_facts::GatherFactsModule));
        registry.register(Arc::new(assert::AssertModule));
        registry
    }

    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Validates a package name before it is interpolated into a shell command:
/// alphanumeric plus `.`, `_`, `+`, `-` only.
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(crate::error::Error::config("package name cannot be empty"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || "._+-".contains(c)) {
        return Err(crate::error::Error::config(format!(
            "invalid package name '{name}': must contain only alphanumeric characters, dots, underscores, plus signs, and hyphens"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_every_builtin() {
        let registry = ModuleRegistry::with_builtins();
        for name in [
            "command", "shell", "copy", "template", "file", "package", "apt", "systemd", "cron",
            "git", "archive", "unarchive", "uri", "set_fact", "debug", "hostname", "gather_facts",
            "assert",
        ] {
            assert!(registry.contains(name), "missing module: {name}");
        }
    }

    #[test]
    fn validate_package_name_rejects_shell_metacharacters() {
        assert!(validate_package_name("nginx").is_ok());
        assert!(validate_package_name("g++").is_ok());
        assert!(validate_package_name("pkg; rm -rf /").is_err());
        assert!(validate_package_name("").is_err());
    }
}
