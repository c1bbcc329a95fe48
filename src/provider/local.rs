//! Local provider: executes commands as a child process of the controlling
//! process, no network transport involved.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, instrument, trace};

use super::exec::{LineBuffer, PromptScanner};
use super::{
    ConnectionKind, ExecOptions, ExecResult, Executor, ExecutorImpl, HostDescriptor, OsInfo,
    Provider, Shell, DEFAULT_SUDO_PROMPT_MARKER,
};
use crate::error::{Error, Result};

/// Executes prepared commands as a child of the current process.
pub struct LocalProvider {
    descriptor: HostDescriptor,
    initialized: bool,
    connected: bool,
    os: Option<OsInfo>,
    default_shell: Option<Shell>,
    exec: Arc<LocalExec>,
}

struct LocalExec;

impl LocalProvider {
    pub fn new(descriptor: HostDescriptor) -> Self {
        Self {
            descriptor,
            initialized: false,
            connected: false,
            os: None,
            default_shell: None,
            exec: Arc::new(LocalExec),
        }
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn target_name(&self) -> &str {
        &self.descriptor.name
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Local
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn check(&mut self) -> Result<()> {
        self.descriptor.validate()
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn initialize(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn get_os_info(&mut self) -> Result<OsInfo> {
        if let Some(info) = &self.os {
            return Ok(info.clone());
        }
        let result = self
            .exec
            .exec(
                super::os_probe::posix_probe_script(),
                ExecOptions {
                    shell: Some(Shell::Sh),
                    ..Default::default()
                },
            )
            .await?;
        let info = super::os_probe::parse_os_probe(&result.stdout);
        self.os = Some(info.clone());
        Ok(info)
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn decide_default_shell(&mut self) -> Result<Shell> {
        if let Some(shell) = self.default_shell {
            return Ok(shell);
        }
        let result = self
            .exec
            .exec(
                super::os_probe::decide_default_shell_script(),
                ExecOptions {
                    shell: Some(Shell::Sh),
                    ..Default::default()
                },
            )
            .await?;
        let shell = Shell::from_name(result.stdout.trim());
        self.default_shell = Some(shell);
        Ok(shell)
    }

    fn executor(&self, mut options: ExecOptions) -> Executor {
        if options.shell.is_none() {
            options.shell = self.default_shell;
        }
        Executor::new(self.exec.clone(), options)
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn destroy(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn cleanup(&mut self) -> Result<()> {
        self.initialized = false;
        self.connected = false;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn os_info(&self) -> Option<&OsInfo> {
        self.os.as_ref()
    }

    fn default_shell(&self) -> Option<Shell> {
        self.default_shell
    }

    async fn write_file(&self, path: &str, content: &[u8], mode: Option<u32>) -> Result<()> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Error::Io)?;
        }
        tokio::fs::write(path, content).await.map_err(Error::Io)?;
        if let Some(mode) = mode {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                    .await
                    .map_err(Error::Io)?;
            }
        }
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(Error::Io)
    }
}

#[async_trait]
impl ExecutorImpl for LocalExec {
    async fn exec(&self, command: &str, options: ExecOptions) -> Result<ExecResult> {
        let prepared = super::prepare_command(command, &options);
        trace!(command = %prepared, "spawning local command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&prepared);
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Connection {
                target: "local".into(),
                message: format!("failed to spawn: {e}"),
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let marker = options
            .prompt_marker
            .clone()
            .or_else(|| Some(DEFAULT_SUDO_PROMPT_MARKER.to_string()));
        let scanner = Arc::new(Mutex::new(PromptScanner::new(
            marker,
            options.interactive_password.clone(),
            options.hide_prompt_line,
        )));
        let stdin = Arc::new(tokio::sync::Mutex::new(stdin));

        let stdout_task = stream_pipe(
            stdout,
            scanner.clone(),
            stdin.clone(),
            options.on_stdout.clone(),
        );
        let stderr_task = stream_pipe(
            stderr,
            scanner.clone(),
            stdin.clone(),
            options.on_stderr.clone(),
        );

        let run = async {
            let (stdout_text, stderr_text) = tokio::join!(stdout_task, stderr_task);
            let status = child.wait().await.map_err(|e| Error::Connection {
                target: "local".into(),
                message: format!("failed to wait on child: {e}"),
            })?;
            Ok::<_, Error>((stdout_text, stderr_text, status.code()))
        };

        let (stdout_text, stderr_text, code) = match options.timeout_ms {
            Some(ms) if ms > 0 => {
                match tokio::time::timeout(std::time::Duration::from_millis(ms), run).await {
                    Ok(result) => result?,
                    Err(_) => {
                        let _ = child.start_kill();
                        return Err(Error::Timeout(ms));
                    }
                }
            }
            _ => run.await?,
        };

        let auth_denied = scanner.lock().unwrap().auth_denied();
        let code = code.unwrap_or(if auth_denied { 1 } else { -1 });

        debug!(code = %code, "local command completed");
        Ok(ExecResult {
            command: prepared,
            code,
            stdout: stdout_text,
            stderr: stderr_text,
        })
    }
}

async fn stream_pipe<R>(
    mut reader: R,
    scanner: Arc<Mutex<PromptScanner>>,
    stdin: Arc<tokio::sync::Mutex<Option<tokio::process::ChildStdin>>>,
    callback: Option<Arc<dyn Fn(&str) + Send + Sync>>,
) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut full = String::new();
    let mut line_buf = LineBuffer::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        let chunk = String::from_utf8_lossy(&buf[..n]).to_string();

        let (outcome, visible) = {
            let mut guard = scanner.lock().unwrap();
            guard.ingest(&chunk)
        };
        full.push_str(&visible);

        if let Some(password) = outcome.write_password {
            if let Some(stdin) = stdin.lock().await.as_mut() {
                let _ = stdin.write_all(password.as_bytes()).await;
                let _ = stdin.flush().await;
            }
        }

        if let Some(cb) = &callback {
            for line in line_buf.push(&visible) {
                cb(&line);
            }
        }
    }

    if let Some(cb) = &callback {
        if let Some(remainder) = line_buf.flush() {
            cb(&remainder);
        }
    }

    full
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> HostDescriptor {
        HostDescriptor {
            name: "localhost".into(),
            connection: ConnectionKind::Local,
            hostname: None,
            port: None,
            username: None,
            password: None,
            private_key: None,
            private_key_password: None,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn executes_simple_command() {
        let mut provider = LocalProvider::new(descriptor());
        super::super::ensure_ready(&mut provider).await.unwrap();
        let exec = provider.executor(ExecOptions::default());
        let result = exec.run("echo hello", None).await.unwrap();
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_as_exec_failed() {
        let mut provider = LocalProvider::new(descriptor());
        super::super::ensure_ready(&mut provider).await.unwrap();
        let exec = provider.executor(ExecOptions::default());
        let err = exec.run("exit 3", None).await.unwrap_err();
        assert!(matches!(err, Error::ExecFailed { code: 3, .. }));
    }

    #[tokio::test]
    async fn run_safe_never_errors() {
        let mut provider = LocalProvider::new(descriptor());
        super::super::ensure_ready(&mut provider).await.unwrap();
        let exec = provider.executor(ExecOptions::default());
        let result = exec.run_safe("exit 7", None).await;
        assert_eq!(result.code, 7);
    }

    #[tokio::test]
    async fn timeout_kills_long_running_command() {
        let mut provider = LocalProvider::new(descriptor());
        super::super::ensure_ready(&mut provider).await.unwrap();
        let exec = provider.executor(ExecOptions {
            timeout_ms: Some(50),
            ..Default::default()
        });
        let err = exec.run("sleep 5", None).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(50)));
    }
}
