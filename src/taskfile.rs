//! Task-file shape: `{targets?, defaults?, tasks: [Task]}`, each `Task`
//! being `{name?, targets, variables?, <controls>, <module>: <options>}`
//! with exactly one module key after control keys are stripped.

use indexmap::IndexMap;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::controls::become_control::BecomeSpec;
use crate::controls::loop_control::LoopSpec;
use crate::controls::until::UntilSpec;
use crate::error::Result;
use crate::executor::TaskContext;
use crate::modules::ModuleParams;

/// A selection pattern: either a single string or a list of strings, joined
/// with `,` into the single-string form [`crate::inventory::resolve_pattern`]
/// accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Targets {
    One(String),
    Many(Vec<String>),
}

impl Targets {
    pub fn as_pattern(&self) -> String {
        match self {
            Targets::One(s) => s.clone(),
            Targets::Many(items) => items.join(","),
        }
    }
}

/// Either a literal environment map or a string expression evaluating to
/// one (per the `environment` control).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvSpec {
    Expression(String),
    Literal(IndexMap<String, Value>),
}

impl EnvSpec {
    pub fn resolve(&self, ctx: &TaskContext, scope: &Value) -> Result<IndexMap<String, Value>> {
        match self {
            EnvSpec::Literal(map) => Ok(map.clone()),
            EnvSpec::Expression(expr) => {
                let evaluated = ctx.templates.eval_expression(expr, scope)?;
                match evaluated {
                    Value::Object(map) => Ok(map.into_iter().collect()),
                    _ => Ok(IndexMap::new()),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub name: Option<String>,
    pub targets: Targets,
    pub variables: IndexMap<String, Value>,
    pub when: Option<String>,
    pub register: Option<String>,
    pub until: Option<UntilSpec>,
    pub loop_control: Option<LoopSpec>,
    pub environment: Option<EnvSpec>,
    pub become_spec: Option<BecomeSpec>,
    pub allow_failure: bool,
    module_name: String,
    pub params: ModuleParams,
}

impl Task {
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("<{}>", self.module_name))
    }
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut map: serde_json::Map<String, Value> = Deserialize::deserialize(deserializer)?;

        let name = map.remove("name").and_then(|v| v.as_str().map(str::to_string));
        let targets = match map.remove("targets") {
            Some(v) => serde_json::from_value(v).map_err(DeError::custom)?,
            None => Targets::One("all".to_string()),
        };
        let variables = match map.remove("variables").or_else(|| map.remove("vars")) {
            Some(Value::Object(obj)) => obj.into_iter().collect(),
            _ => IndexMap::new(),
        };
        let when = map.remove("when").and_then(|v| v.as_str().map(str::to_string));
        let register = map.remove("register").and_then(|v| v.as_str().map(str::to_string));
        let until = match map.remove("until") {
            Some(v) => Some(serde_json::from_value(v).map_err(DeError::custom)?),
            None => None,
        };
        let loop_control = match map.remove("loop").or_else(|| map.remove("with_items")) {
            Some(Value::Array(items)) => Some(LoopSpec {
                items: Value::Array(items),
                loop_var: "item".to_string(),
                index_var: None,
                pause_ms: None,
                break_when: None,
                label: None,
                extended: false,
            }),
            Some(v) => Some(serde_json::from_value(v).map_err(DeError::custom)?),
            None => None,
        };
        let environment = match map.remove("environment").or_else(|| map.remove("env")) {
            Some(v) => Some(serde_json::from_value(v).map_err(DeError::custom)?),
            None => None,
        };
        let become_spec = match map.remove("become") {
            Some(v) => Some(serde_json::from_value(v).map_err(DeError::custom)?),
            None => None,
        };
        let allow_failure = map
            .remove("allow_failure")
            .or_else(|| map.remove("ignore_errors"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if map.len() != 1 {
            return Err(DeError::custom(format!(
                "task must have exactly one module key, found {}: {:?}",
                map.len(),
                map.keys().collect::<Vec<_>>()
            )));
        }
        let (module_name, params_value) = map.into_iter().next().expect("checked len == 1");
        let params: ModuleParams = match params_value {
            Value::Object(obj) => obj.into_iter().collect(),
            Value::Null => ModuleParams::new(),
            other => {
                return Err(DeError::custom(format!(
                    "module '{module_name}' options must be a mapping, found {other}"
                )))
            }
        };

        Ok(Task {
            name,
            targets,
            variables,
            when,
            register,
            until,
            loop_control,
            environment,
            become_spec,
            allow_failure,
            module_name,
            params,
        })
    }
}

/// File-level defaults merged into every task that doesn't set the same
/// field itself. Unlike [`Task`] this carries no module key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskDefaults {
    pub targets: Option<Targets>,
    #[serde(default)]
    pub variables: IndexMap<String, Value>,
    pub environment: Option<EnvSpec>,
    pub when: Option<String>,
    pub until: Option<UntilSpec>,
    #[serde(rename = "become")]
    pub become_spec: Option<BecomeSpec>,
    pub allow_failure: Option<bool>,
}

/// `{targets?, defaults?, tasks: [Task]}` per the external task-file shape.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskFile {
    pub targets: Option<Targets>,
    #[serde(default)]
    pub defaults: Option<TaskDefaults>,
    pub tasks: Vec<Task>,
}

/// Fold file-level `defaults` into `task`, in place: a field the task left
/// unset takes the default; `variables` and `environment` merge instead of
/// replacing (task keys win).
pub fn apply_defaults(task: &mut Task, defaults: &TaskDefaults) {
    if matches!(&task.targets, Targets::One(s) if s == "all") {
        if let Some(targets) = &defaults.targets {
            task.targets = targets.clone();
        }
    }
    for (k, v) in &defaults.variables {
        task.variables.entry(k.clone()).or_insert_with(|| v.clone());
    }
    if task.environment.is_none() {
        task.environment = defaults.environment.clone();
    }
    if task.when.is_none() {
        task.when = defaults.when.clone();
    }
    if task.until.is_none() {
        task.until = defaults.until.clone();
    }
    if task.become_spec.is_none() {
        task.become_spec = defaults.become_spec.clone();
    }
    if !task.allow_failure {
        if let Some(allow_failure) = defaults.allow_failure {
            task.allow_failure = allow_failure;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_tasks_with_no_module_key() {
        let direct: serde_json::Value = serde_json::json!({
            "name": "noop",
            "targets": "all",
        });
        let result: std::result::Result<Task, _> = serde_json::from_value(direct);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_tasks_with_two_module_keys() {
        let direct: serde_json::Value = serde_json::json!({
            "command": "echo hi",
            "shell": "echo bye",
        });
        let result: std::result::Result<Task, _> = serde_json::from_value(direct);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_single_module_key_with_controls() {
        let direct: serde_json::Value = serde_json::json!({
            "name": "say hi",
            "targets": ["web", "!web3"],
            "when": "ok == true",
            "command": {"cmd": "echo hi"},
        });
        let task: Task = serde_json::from_value(direct).unwrap();
        assert_eq!(task.module_name(), "command");
        assert_eq!(task.display_name(), "say hi");
        assert_eq!(task.targets.as_pattern(), "web,!web3");
    }
}
