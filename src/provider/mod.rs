//! Provider layer: the uniform command-execution surface bound to a single
//! resolved target.
//!
//! A [`Provider`] wraps either a local child-process executor or an SSH
//! session. Modules never see the difference: they call
//! [`Provider::executor`] to get a bound `run(command, opts) -> ExecResult`
//! closure and otherwise only touch `get_os_info`/`decide_default_shell`.
//!
//! # Example
//!
//! ```rust,ignore
//! use katmer::provider::{build_provider, HostDescriptor};
//!
//! let mut provider = build_provider(&descriptor)?;
//! provider.ensure_ready().await?;
//! let exec = provider.executor(ExecOptions::default());
//! let result = exec.run("uname -a", None).await?;
//! println!("{}", result.stdout);
//! ```

mod exec;
mod local;
mod os_probe;
#[cfg(feature = "russh")]
mod ssh;

pub use exec::{PromptOutcome, PromptScanner};
pub use local::LocalProvider;
pub use os_probe::{decide_default_shell_script, parse_os_probe, posix_probe_script};
#[cfg(feature = "russh")]
pub use ssh::SshProvider;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Error, Result};

/// Marker string written before the escalation password prompt, matched as a
/// plain substring in the combined output stream.
pub const DEFAULT_SUDO_PROMPT_MARKER: &str = "KATMER_SUDO_PROMPT:";

/// Closed enumeration of normalized OS families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Darwin,
    Windows,
    Freebsd,
    Openbsd,
    Netbsd,
    Aix,
    Solaris,
    Unknown,
}

impl OsFamily {
    /// Normalize a kernel name as reported by `uname -s` (or `$OS` on Windows).
    pub fn from_kernel_name(name: &str) -> Self {
        match name.trim() {
            "Linux" => OsFamily::Linux,
            "Darwin" => OsFamily::Darwin,
            "Windows_NT" => OsFamily::Windows,
            "FreeBSD" => OsFamily::Freebsd,
            "OpenBSD" => OsFamily::Openbsd,
            "NetBSD" => OsFamily::Netbsd,
            "AIX" => OsFamily::Aix,
            "SunOS" => OsFamily::Solaris,
            _ => OsFamily::Unknown,
        }
    }

    /// The lowercase label used as a constraint-solver key (`linux`, `darwin`, …).
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Darwin => "darwin",
            OsFamily::Windows => "windows",
            OsFamily::Freebsd => "freebsd",
            OsFamily::Openbsd => "openbsd",
            OsFamily::Netbsd => "netbsd",
            OsFamily::Aix => "aix",
            OsFamily::Solaris => "solaris",
            OsFamily::Unknown => "unknown",
        }
    }
}

/// Closed enumeration of normalized CPU architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    Aarch64,
    Armv7,
    X86,
    Unknown,
}

impl Arch {
    /// Normalize an arch string as reported by `uname -m` (or `%PROCESSOR_ARCHITECTURE%`).
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Arch::X86_64,
            "arm64" | "aarch64" => Arch::Aarch64,
            "armv7" | "armv7l" | "armhf" => Arch::Armv7,
            "i386" | "i686" | "x86" => Arch::X86,
            _ => Arch::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Armv7 => "armv7",
            Arch::X86 => "x86",
            Arch::Unknown => "unknown",
        }
    }
}

/// Where an [`OsInfo`] was determined from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsSource {
    Posix,
    Powershell,
    Unknown,
}

/// Normalized description of the target's operating system, produced by
/// [`Provider::get_os_info`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsInfo {
    pub family: OsFamily,
    pub arch: Arch,
    pub kernel: Option<String>,
    pub distro_id: Option<String>,
    pub version_id: Option<String>,
    pub pretty_name: Option<String>,
    pub source: OsSource,
}

impl OsInfo {
    /// The fallback value used when both the POSIX and PowerShell probes fail.
    pub fn unknown() -> Self {
        Self {
            family: OsFamily::Unknown,
            arch: Arch::Unknown,
            kernel: None,
            distro_id: None,
            version_id: None,
            pretty_name: None,
            source: OsSource::Unknown,
        }
    }
}

/// How a target is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Ssh,
    Local,
}

/// The connection fields resolved for one target, as produced by inventory
/// normalization. This is the input to [`build_provider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDescriptor {
    pub name: String,
    pub connection: ConnectionKind,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub private_key_password: Option<String>,
    pub timeout: Option<u64>,
}

impl HostDescriptor {
    /// Validate the fields required by the chosen connection type. Called by
    /// `Provider::check`.
    pub fn validate(&self) -> Result<()> {
        if self.connection == ConnectionKind::Ssh {
            if self.hostname.is_none() {
                return Err(Error::config(format!(
                    "target '{}': ssh connection requires 'hostname'",
                    self.name
                )));
            }
            if self.username.is_none() {
                return Err(Error::config(format!(
                    "target '{}': ssh connection requires 'username'",
                    self.name
                )));
            }
            if self.password.is_none() && self.private_key.is_none() {
                return Err(Error::config(format!(
                    "target '{}': ssh connection requires 'password' or 'private_key'",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// A stable structural hash used as the provider-cache key. Two
    /// descriptors with identical normalized content always hash the same.
    pub fn cache_key(&self) -> String {
        format!(
            "{:?}|{}|{}|{}|{}",
            self.connection,
            self.hostname.as_deref().unwrap_or(""),
            self.port.unwrap_or(0),
            self.username.as_deref().unwrap_or(""),
            self.private_key.as_deref().unwrap_or(""),
        )
    }
}

/// The shell a command will be wrapped for, or `None` to run unwrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Sh,
    Dash,
    Ksh,
    Mksh,
    Fish,
    Powershell,
    Cmd,
    None,
}

impl Shell {
    pub fn from_name(name: &str) -> Self {
        match name {
            "bash" => Shell::Bash,
            "zsh" => Shell::Zsh,
            "sh" => Shell::Sh,
            "dash" => Shell::Dash,
            "ksh" => Shell::Ksh,
            "mksh" => Shell::Mksh,
            "fish" => Shell::Fish,
            "powershell" => Shell::Powershell,
            "cmd" => Shell::Cmd,
            _ => Shell::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Sh => "sh",
            Shell::Dash => "dash",
            Shell::Ksh => "ksh",
            Shell::Mksh => "mksh",
            Shell::Fish => "fish",
            Shell::Powershell => "powershell",
            Shell::Cmd => "cmd",
            Shell::None => "none",
        }
    }
}

/// Per-invocation options threaded through the executor's command
/// preparation and prompt pump.
#[derive(Clone, Default)]
pub struct ExecOptions {
    pub cwd: Option<String>,
    pub shell: Option<Shell>,
    pub timeout_ms: Option<u64>,
    pub env: HashMap<String, String>,
    /// Rewrites the fully-prepared command string; used by the `become`
    /// control to prepend `sudo -S -p '<marker>' …`.
    pub rewrite_command: Option<Arc<dyn Fn(String) -> String + Send + Sync>>,
    pub interactive_password: Option<String>,
    pub prompt_marker: Option<String>,
    pub hide_prompt_line: bool,
    pub on_stdout: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub on_stderr: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl std::fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecOptions")
            .field("cwd", &self.cwd)
            .field("shell", &self.shell)
            .field("timeout_ms", &self.timeout_ms)
            .field("env", &self.env)
            .field("has_rewrite", &self.rewrite_command.is_some())
            .field("has_interactive_password", &self.interactive_password.is_some())
            .field("prompt_marker", &self.prompt_marker)
            .field("hide_prompt_line", &self.hide_prompt_line)
            .finish()
    }
}

/// The outcome of one `exec` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub command: String,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// A bound callable returned by [`Provider::executor`]: `run(command, opts)`.
pub struct Executor {
    inner: Arc<dyn ExecutorImpl>,
    base_options: ExecOptions,
}

impl Executor {
    pub fn new(inner: Arc<dyn ExecutorImpl>, base_options: ExecOptions) -> Self {
        Self { inner, base_options }
    }

    /// Run `command`, merging `per_call` on top of the executor's base
    /// options (per-call wins). Errors with [`Error::ExecFailed`] or
    /// [`Error::Timeout`] on non-zero exit / timeout.
    pub async fn run(&self, command: &str, per_call: Option<ExecOptions>) -> Result<ExecResult> {
        let merged = merge_exec_options(self.base_options.clone(), per_call);
        let result = self.inner.exec(command, merged).await?;
        if result.code == 0 {
            Ok(result)
        } else {
            Err(Error::ExecFailed {
                code: result.code,
                stderr: result.stderr,
            })
        }
    }

    /// Like [`Self::run`] but never errors; failures are represented in the
    /// returned [`ExecResult`].
    pub async fn run_safe(&self, command: &str, per_call: Option<ExecOptions>) -> ExecResult {
        let merged = merge_exec_options(self.base_options.clone(), per_call);
        match self.inner.exec(command, merged).await {
            Ok(result) => result,
            Err(Error::ExecFailed { code, stderr }) => ExecResult {
                command: command.to_string(),
                code,
                stdout: String::new(),
                stderr,
            },
            Err(Error::Timeout(ms)) => ExecResult {
                command: command.to_string(),
                code: 1,
                stdout: String::new(),
                stderr: format!("Command timed out after {}ms", ms),
            },
            Err(e) => ExecResult {
                command: command.to_string(),
                code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        }
    }
}

fn merge_exec_options(base: ExecOptions, per_call: Option<ExecOptions>) -> ExecOptions {
    let Some(over) = per_call else { return base };
    let mut env = base.env;
    env.extend(over.env);
    ExecOptions {
        cwd: over.cwd.or(base.cwd),
        shell: over.shell.or(base.shell),
        timeout_ms: over.timeout_ms.or(base.timeout_ms),
        env,
        rewrite_command: over.rewrite_command.or(base.rewrite_command),
        interactive_password: over.interactive_password.or(base.interactive_password),
        prompt_marker: over.prompt_marker.or(base.prompt_marker),
        hide_prompt_line: over.hide_prompt_line || base.hide_prompt_line,
        on_stdout: over.on_stdout.or(base.on_stdout),
        on_stderr: over.on_stderr.or(base.on_stderr),
    }
}

/// Transport-specific exec implementation a [`Provider`] hands to its
/// [`Executor`]. Kept separate from `Provider` so `Executor` can be `Clone`
/// and handed to controls (`become`, `environment`) without cloning the
/// whole provider.
#[async_trait]
pub trait ExecutorImpl: Send + Sync {
    async fn exec(&self, command: &str, options: ExecOptions) -> Result<ExecResult>;
}

/// The provider contract implemented by [`LocalProvider`] and [`SshProvider`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// The resolved host name this provider is bound to.
    fn target_name(&self) -> &str;

    /// `"ssh"` or `"local"`.
    fn kind(&self) -> ConnectionKind;

    /// Validate the host descriptor (called once, before `initialize`).
    async fn check(&mut self) -> Result<()>;

    /// Acquire client resources (SSH client config, agent handle, …).
    async fn initialize(&mut self) -> Result<()>;

    /// Open the session.
    async fn connect(&mut self) -> Result<()>;

    /// Probe the target's OS via a single tagged script, falling back to
    /// PowerShell, then to [`OsInfo::unknown`].
    async fn get_os_info(&mut self) -> Result<OsInfo>;

    /// Pick the default shell to wrap commands in.
    async fn decide_default_shell(&mut self) -> Result<Shell>;

    /// Build a bound executor using this provider's transport and the
    /// decided default shell.
    fn executor(&self, options: ExecOptions) -> Executor;

    /// Tear down the connection; the provider remains reusable afterward.
    async fn destroy(&mut self) -> Result<()>;

    /// Release all resources; the provider is not reusable afterward.
    async fn cleanup(&mut self) -> Result<()>;

    /// `true` once `check`+`initialize` have completed.
    fn is_initialized(&self) -> bool;

    /// `true` once `connect`+OS probe+shell decision have completed.
    fn is_connected(&self) -> bool;

    /// Cached OS info, if the probe has already run.
    fn os_info(&self) -> Option<&OsInfo>;

    /// Cached default shell, if decided.
    fn default_shell(&self) -> Option<Shell>;

    /// Write `content` to `path` on the target, creating parent directories.
    /// Used by the `copy`/`template`/`archive` module family; not part of the
    /// executor-facing contract, but every provider needs a way to place
    /// file content on its target.
    async fn write_file(&self, path: &str, content: &[u8], mode: Option<u32>) -> Result<()>;

    /// Read the full content of `path` from the target.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}

/// `check → initialize` (once) then `connect → probe_os → decide_shell`
/// (once), idempotently.
#[instrument(skip(provider), fields(target = %provider.target_name()))]
pub async fn ensure_ready(provider: &mut dyn Provider) -> Result<()> {
    if !provider.is_initialized() {
        provider.check().await?;
        provider.initialize().await?;
    }
    if !provider.is_connected() {
        provider.connect().await?;
        let _ = provider.get_os_info().await?;
        let _ = provider.decide_default_shell().await?;
    }
    Ok(())
}

/// Runs `destroy` then `cleanup`, logging and swallowing any error from
/// either step.
#[instrument(skip(provider), fields(target = %provider.target_name()))]
pub async fn safe_shutdown(provider: &mut dyn Provider) {
    if let Err(e) = provider.destroy().await {
        tracing::warn!(error = %e, "provider destroy failed");
    }
    if let Err(e) = provider.cleanup().await {
        tracing::warn!(error = %e, "provider cleanup failed");
    }
}

/// Construct the right [`Provider`] implementation for a descriptor's
/// [`ConnectionKind`].
pub fn build_provider(descriptor: &HostDescriptor) -> Result<Box<dyn Provider>> {
    match descriptor.connection {
        ConnectionKind::Local => Ok(Box::new(LocalProvider::new(descriptor.clone()))),
        ConnectionKind::Ssh => {
            #[cfg(feature = "russh")]
            {
                Ok(Box::new(SshProvider::new(descriptor.clone())))
            }
            #[cfg(not(feature = "russh"))]
            {
                Err(Error::config(
                    "ssh connections require the 'russh' feature",
                ))
            }
        }
    }
}

/// `true` if `command` already begins with a recognized shell invocation
/// (`bash -lc '…'`, `powershell -Command '…'`, `cmd /d /s /c "…"`, …), so the
/// executor does not double-wrap it.
pub fn looks_shell_wrapped(command: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "bash -lc",
        "zsh -lc",
        "sh -c",
        "dash -c",
        "ksh -c",
        "mksh -c",
        "fish -lc",
        "powershell -Command",
        "powershell -NoProfile",
        "cmd /d /s /c",
    ];
    let trimmed = command.trim_start();
    PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

/// Wrap `command` for `shell`, escaping quotes the way each shell expects.
/// `Shell::None` returns the command unchanged.
pub fn wrap_for_shell(command: &str, shell: Shell) -> String {
    match shell {
        Shell::Bash | Shell::Zsh => format!("{} -lc '{}'", shell.as_str(), escape_single_quotes(command)),
        Shell::Sh | Shell::Dash | Shell::Ksh | Shell::Mksh | Shell::Fish => {
            format!("{} -c '{}'", shell.as_str(), escape_single_quotes(command))
        }
        Shell::Powershell => format!(
            "powershell -NoProfile -NonInteractive -ExecutionPolicy Bypass -Command '{}'",
            escape_single_quotes(command)
        ),
        Shell::Cmd => format!("cmd /d /s /c \"{}\"", command.replace('"', "\\\"")),
        Shell::None => command.to_string(),
    }
}

fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', "''")
}

/// Command preparation shared by every transport: `cd`, the `rewrite_command`
/// hook, then shell wrapping (skipped if already wrapped or `shell==None`).
pub fn prepare_command(command: &str, options: &ExecOptions) -> String {
    let mut prepared = command.to_string();
    if let Some(cwd) = &options.cwd {
        prepared = format!("cd \"{}\" && {}", cwd, prepared);
    }
    if let Some(rewrite) = &options.rewrite_command {
        prepared = rewrite(prepared);
    }
    let shell = options.shell.unwrap_or(Shell::Sh);
    if shell != Shell::None && !looks_shell_wrapped(&prepared) {
        prepared = wrap_for_shell(&prepared, shell);
    }
    prepared
}

/// A boxed future, used where transports need to share one signature for
/// "run this prepared command and give me back a result" without pulling in
/// `async_trait` object-safety overhead on a hot path.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_family_normalizes_kernel_names() {
        assert_eq!(OsFamily::from_kernel_name("Linux"), OsFamily::Linux);
        assert_eq!(OsFamily::from_kernel_name("Darwin"), OsFamily::Darwin);
        assert_eq!(OsFamily::from_kernel_name("Windows_NT"), OsFamily::Windows);
        assert_eq!(OsFamily::from_kernel_name("Plan9"), OsFamily::Unknown);
    }

    #[test]
    fn arch_normalizes_aliases() {
        assert_eq!(Arch::from_raw("amd64"), Arch::X86_64);
        assert_eq!(Arch::from_raw("arm64"), Arch::Aarch64);
        assert_eq!(Arch::from_raw("armv7l"), Arch::Armv7);
    }

    #[test]
    fn detects_already_wrapped_commands() {
        assert!(looks_shell_wrapped("bash -lc 'echo hi'"));
        assert!(looks_shell_wrapped("  powershell -Command 'Get-Date'"));
        assert!(!looks_shell_wrapped("echo hi"));
    }

    #[test]
    fn wraps_for_bash_doubling_quotes() {
        let wrapped = wrap_for_shell("echo 'hi'", Shell::Bash);
        assert_eq!(wrapped, "bash -lc 'echo ''hi'''");
    }

    #[test]
    fn prepare_command_prepends_cwd_and_wraps() {
        let opts = ExecOptions {
            cwd: Some("/opt/app".into()),
            shell: Some(Shell::Sh),
            ..Default::default()
        };
        let prepared = prepare_command("ls", &opts);
        assert_eq!(prepared, "sh -c 'cd \"/opt/app\" && ls'");
    }

    #[test]
    fn prepare_command_skips_wrap_when_already_wrapped() {
        let opts = ExecOptions {
            shell: Some(Shell::Bash),
            ..Default::default()
        };
        let prepared = prepare_command("bash -lc 'echo hi'", &opts);
        assert_eq!(prepared, "bash -lc 'echo hi'");
    }

    #[test]
    fn host_descriptor_cache_key_is_stable() {
        let a = HostDescriptor {
            name: "web01".into(),
            connection: ConnectionKind::Ssh,
            hostname: Some("10.0.0.1".into()),
            port: Some(22),
            username: Some("deploy".into()),
            password: None,
            private_key: Some("~/.ssh/id_ed25519".into()),
            private_key_password: None,
            timeout: None,
        };
        let b = a.clone();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn host_descriptor_validate_requires_auth() {
        let descriptor = HostDescriptor {
            name: "web01".into(),
            connection: ConnectionKind::Ssh,
            hostname: Some("10.0.0.1".into()),
            port: None,
            username: Some("deploy".into()),
            password: None,
            private_key: None,
            private_key_password: None,
            timeout: None,
        };
        assert!(descriptor.validate().is_err());
    }
}
