//! `become` control: a module-level pre-exec rewrite applied before the
//! module runs. Wraps the prepared command in `sudo -S -p '<marker>' [-u
//! user] <command>` and arms the prompt scanner so the escalation password
//! is written exactly once and never echoed back in output.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::executor::TaskContext;
use crate::provider::DEFAULT_SUDO_PROMPT_MARKER;
use crate::taskfile::Task;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BecomeSpec {
    Flag(bool),
    Options(BecomeOptions),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BecomeOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_method")]
    pub method: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_method() -> String {
    "sudo".to_string()
}

impl BecomeSpec {
    fn enabled(&self) -> bool {
        match self {
            BecomeSpec::Flag(b) => *b,
            BecomeSpec::Options(opts) => opts.enabled,
        }
    }

    fn user(&self) -> Option<&str> {
        match self {
            BecomeSpec::Flag(_) => None,
            BecomeSpec::Options(opts) => opts.user.as_deref(),
        }
    }

    fn password(&self) -> Option<&str> {
        match self {
            BecomeSpec::Flag(_) => None,
            BecomeSpec::Options(opts) => opts.password.as_deref(),
        }
    }
}

/// Rewrite `ctx.exec_options` so every command this task runs is escalated.
/// A no-op when `task.become_spec` is absent or disabled.
pub fn apply(task: &Task, ctx: &TaskContext) -> Result<()> {
    let Some(spec) = &task.become_spec else {
        return Ok(());
    };
    if !spec.enabled() {
        return Ok(());
    }

    let user = spec.user().map(str::to_string);
    let mut options = ctx.exec_options.lock().unwrap();
    options.rewrite_command = Some(std::sync::Arc::new(move |command: String| {
        let mut prefix = format!("sudo -S -p '{DEFAULT_SUDO_PROMPT_MARKER}'");
        if let Some(user) = &user {
            prefix.push_str(&format!(" -u {user}"));
        }
        format!("{prefix} {command}")
    }));
    options.interactive_password = spec.password().map(str::to_string);
    options.prompt_marker = Some(DEFAULT_SUDO_PROMPT_MARKER.to_string());
    options.hide_prompt_line = true;
    Ok(())
}
