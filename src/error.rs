//! Error taxonomy for Katmer.
//!
//! Every category from the design's error-handling section has a matching
//! variant here. Constructors stay flat (no nested source chains) so a
//! failure always carries the task/module/target context a log line needs.

use thiserror::Error;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// The engine's error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid inventory or task-file configuration, reserved keyword misuse,
    /// a reference to an undefined child group, or more than one module key
    /// on a task.
    #[error("configuration error: {0}")]
    Config(String),

    /// A target selection pattern resolved to zero hosts.
    #[error("no targets matched pattern '{0}'")]
    NoTargetsFound(String),

    /// A module's platform/arch/root/kernel/binary/package constraint was
    /// not satisfied.
    #[error("constraint not satisfied for module '{module}': {detail}")]
    Constraint {
        /// Module name the constraint was declared on.
        module: String,
        /// What was missing, plus the observed environment.
        detail: String,
    },

    /// A non-zero exit from `exec` (as opposed to `exec_safe`).
    #[error("command failed with exit code {code}: {stderr}")]
    ExecFailed {
        /// Process exit code, or -1 if unknown.
        code: i32,
        /// Captured stderr (or a synthesized message for transport errors).
        stderr: String,
    },

    /// A module returned `failed: true` and the task did not set
    /// `allow_failure`.
    #[error("task '{task}' failed on target '{target}': {message}")]
    TaskExecutionFailed {
        /// Task name, or "<unnamed>".
        task: String,
        /// Target the task failed on.
        target: String,
        /// Short cause.
        message: String,
    },

    /// `exec` exceeded its timeout.
    #[error("command timed out after {0}ms")]
    Timeout(u64),

    /// Transport-level failure (connect, probe, or channel I/O).
    #[error("connection to '{target}' failed: {message}")]
    Connection {
        /// Target name.
        target: String,
        /// Error message.
        message: String,
    },

    /// Template rendering or expression evaluation failed in a context that
    /// cannot fail open (e.g. a task-level `when` expression).
    #[error("template error in '{context}': {message}")]
    Template {
        /// Where the template came from (task field name, etc).
        context: String,
        /// Underlying message.
        message: String,
    },

    /// I/O error reading a task/inventory file or module payload (copy src,
    /// template src, archive path, …).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error for inventory/task files.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error surfaced while shaping a `ModuleResult`.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::Config`] variant from anything displayable.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Build a [`Error::Constraint`] variant.
    pub fn constraint(module: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Error::Constraint {
            module: module.into(),
            detail: detail.to_string(),
        }
    }

    /// True if this failure is recoverable by an `until` retry loop
    /// (anything that originates from running a command, as opposed to a
    /// structural configuration problem).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ExecFailed { .. } | Error::Timeout(_) | Error::Connection { .. }
        )
    }
}
