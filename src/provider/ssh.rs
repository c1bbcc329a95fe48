//! SSH provider backed by `russh`, a pure-Rust async SSH client.
//!
//! Host key verification against `~/.ssh/known_hosts` and the agent/key/
//! password authentication ladder follow the same shape as any other
//! OpenSSH-compatible client; see [`ClientHandler`] and [`authenticate`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{Handle, Handler};
use russh::keys::key::PublicKey;
use russh::keys::load_secret_key;
use russh::ChannelMsg;
use russh_keys::agent::client::AgentClient;
use russh_sftp::client::SftpSession;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace, warn};

use super::exec::{LineBuffer, PromptScanner};
use super::{
    ConnectionKind, ExecOptions, ExecResult, Executor, ExecutorImpl, HostDescriptor, OsInfo,
    Provider, Shell, DEFAULT_SUDO_PROMPT_MARKER,
};
use crate::error::{Error, Result};

struct RusshErrAdapter(russh::Error);

impl std::fmt::Debug for RusshErrAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for RusshErrAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for RusshErrAdapter {}
impl From<russh::Error> for RusshErrAdapter {
    fn from(e: russh::Error) -> Self {
        RusshErrAdapter(e)
    }
}

/// A parsed entry from `~/.ssh/known_hosts`.
struct KnownHostEntry {
    patterns: Vec<String>,
    key: PublicKey,
}

enum HostKeyStatus {
    Verified,
    Unknown,
    Mismatch,
}

/// The russh `Handler` implementation: verifies the server's host key
/// against `known_hosts`, accepting first-time connections (TOFU) like
/// `StrictHostKeyChecking=accept-new`.
struct ClientHandler {
    host: String,
    port: u16,
    known_hosts: Vec<KnownHostEntry>,
}

impl ClientHandler {
    fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            known_hosts: Self::load_known_hosts(),
        }
    }

    fn load_known_hosts() -> Vec<KnownHostEntry> {
        let Some(path) = dirs::home_dir().map(|h| h.join(".ssh").join("known_hosts")) else {
            return Vec::new();
        };
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim().starts_with('#'))
            .filter_map(Self::parse_line)
            .collect()
    }

    fn parse_line(line: &str) -> Option<KnownHostEntry> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return None;
        }
        let patterns = parts[0].split(',').map(str::to_string).collect();
        let key_bytes =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, parts[2]).ok()?;
        let key = russh::keys::key::parse_public_key(&key_bytes, None).ok()?;
        Some(KnownHostEntry { patterns, key })
    }

    fn pattern_matches(pattern: &str, host: &str, port: u16) -> bool {
        if port == 22 && pattern == host {
            return true;
        }
        if pattern.contains('*') || pattern.contains('?') {
            return glob_match(pattern, host);
        }
        false
    }

    fn verify(&self, server_key: &PublicKey) -> HostKeyStatus {
        for entry in &self.known_hosts {
            for pattern in &entry.patterns {
                if Self::pattern_matches(pattern, &self.host, self.port) {
                    return if entry.key.fingerprint() == server_key.fingerprint() {
                        HostKeyStatus::Verified
                    } else {
                        HostKeyStatus::Mismatch
                    };
                }
            }
        }
        HostKeyStatus::Unknown
    }
}

/// Minimal `*`/`?` glob matcher for `known_hosts` hashed/wildcard patterns.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => {
                (0..=t.len()).any(|i| inner(&p[1..], &t[i..]))
            }
            Some(b'?') => !t.is_empty() && inner(&p[1..], &t[1..]),
            Some(&c) => t.first() == Some(&c) && inner(&p[1..], &t[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

#[async_trait]
impl Handler for ClientHandler {
    type Error = RusshErrAdapter;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match self.verify(server_public_key) {
            HostKeyStatus::Verified => Ok(true),
            HostKeyStatus::Unknown => {
                warn!(host = %self.host, "host not in known_hosts, accepting (TOFU)");
                Ok(true)
            }
            HostKeyStatus::Mismatch => {
                warn!(host = %self.host, "host key mismatch, refusing connection");
                Ok(false)
            }
        }
    }
}

/// SSH provider implemented on top of `russh`.
pub struct SshProvider {
    descriptor: HostDescriptor,
    handle: Arc<RwLock<Option<Handle<ClientHandler>>>>,
    initialized: bool,
    connected: AtomicBool,
    os: StdMutex<Option<OsInfo>>,
    default_shell: StdMutex<Option<Shell>>,
}

impl SshProvider {
    pub fn new(descriptor: HostDescriptor) -> Self {
        Self {
            descriptor,
            handle: Arc::new(RwLock::new(None)),
            initialized: false,
            connected: AtomicBool::new(false),
            os: StdMutex::new(None),
            default_shell: StdMutex::new(None),
        }
    }

    async fn authenticate(
        session: &mut Handle<ClientHandler>,
        user: &str,
        password: Option<&str>,
        private_key: Option<&str>,
        key_password: Option<&str>,
    ) -> Result<()> {
        if Self::try_agent_auth(session, user).await.is_ok() {
            return Ok(());
        }
        if let Some(key_path) = private_key {
            let path = expand_path(key_path);
            if let Ok(()) = Self::try_key_auth(session, user, &path, key_password).await {
                return Ok(());
            }
        }
        if let Some(password) = password {
            let ok = session
                .authenticate_password(user, password)
                .await
                .map_err(|e| Error::Connection {
                    target: user.into(),
                    message: format!("password auth error: {e}"),
                })?;
            if ok {
                return Ok(());
            }
        }
        Err(Error::Connection {
            target: user.into(),
            message: "all authentication methods failed".into(),
        })
    }

    async fn try_agent_auth(session: &mut Handle<ClientHandler>, user: &str) -> Result<()> {
        let mut agent = AgentClient::connect_env()
            .await
            .map_err(|e| connection_error(user, e))?;
        let identities = agent
            .request_identities()
            .await
            .map_err(|e| connection_error(user, e))?;
        if identities.is_empty() {
            return Err(Error::Connection {
                target: user.into(),
                message: "ssh agent has no identities".into(),
            });
        }
        for identity in identities {
            let (returned_agent, result) = session.authenticate_future(user, identity, agent).await;
            agent = returned_agent;
            if matches!(result, Ok(true)) {
                return Ok(());
            }
        }
        Err(Error::Connection {
            target: user.into(),
            message: "all ssh agent identities rejected".into(),
        })
    }

    async fn try_key_auth(
        session: &mut Handle<ClientHandler>,
        user: &str,
        key_path: &Path,
        passphrase: Option<&str>,
    ) -> Result<()> {
        if !key_path.exists() {
            return Err(Error::Connection {
                target: user.into(),
                message: format!("key file not found: {}", key_path.display()),
            });
        }
        let key_pair = load_secret_key(key_path, passphrase).map_err(|e| Error::Connection {
            target: user.into(),
            message: format!("failed to load key {}: {e}", key_path.display()),
        })?;
        let ok = session
            .authenticate_publickey(user, Arc::new(key_pair))
            .await
            .map_err(|e| Error::Connection {
                target: user.into(),
                message: format!("key auth failed: {e}"),
            })?;
        if ok {
            Ok(())
        } else {
            Err(Error::Connection {
                target: user.into(),
                message: "key rejected".into(),
            })
        }
    }

    async fn open_sftp(&self) -> Result<SftpSession> {
        let guard = self.handle.read().await;
        let handle = guard.as_ref().ok_or_else(|| Error::Connection {
            target: self.descriptor.name.clone(),
            message: "not connected".into(),
        })?;
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| connection_error(&self.descriptor.name, e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| connection_error(&self.descriptor.name, e))?;
        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::Connection {
                target: self.descriptor.name.clone(),
                message: format!("sftp session failed: {e}"),
            })
    }
}

fn connection_error(target: &str, e: impl std::fmt::Display) -> Error {
    Error::Connection {
        target: target.to_string(),
        message: e.to_string(),
    }
}

fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[async_trait]
impl Provider for SshProvider {
    fn target_name(&self) -> &str {
        &self.descriptor.name
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Ssh
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
        let host = self
            .descriptor
            .hostname
            .clone()
            .ok_or_else(|| Error::config("ssh target missing hostname"))?;
        let port = self.descriptor.port.unwrap_or(22);
        let user = self
            .descriptor
            .username
            .clone()
            .ok_or_else(|| Error::config("ssh target missing username"))?;
        let timeout = Duration::from_secs(self.descriptor.timeout.unwrap_or(30));

        let config = Arc::new(russh::client::Config {
            inactivity_timeout: Some(timeout),
            ..Default::default()
        });
        let addr = format!("{host}:{port}");
        let socket = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| connection_error(&self.descriptor.name, e))?;
        socket.set_nodelay(true).ok();

        let handler = ClientHandler::new(&host, port);
        let mut session = russh::client::connect_stream(config, socket, handler)
            .await
            .map_err(|e| connection_error(&self.descriptor.name, e))?;

        Self::authenticate(
            &mut session,
            &user,
            self.descriptor.password.as_deref(),
            self.descriptor.private_key.as_deref(),
            self.descriptor.private_key_password.as_deref(),
        )
        .await?;

        *self.handle.write().await = Some(session);
        self.connected.store(true, Ordering::SeqCst);
        debug!(target = %self.descriptor.name, "ssh connection established");
        Ok(())
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn get_os_info(&mut self) -> Result<OsInfo> {
        if let Some(info) = self.os.lock().unwrap().clone() {
            return Ok(info);
        }
        let exec = self.executor(ExecOptions {
            shell: Some(Shell::Sh),
            ..Default::default()
        });
        let info = match exec.run(super::os_probe::posix_probe_script(), None).await {
            Ok(result) => super::os_probe::parse_os_probe(&result.stdout),
            Err(_) => match exec
                .run(super::os_probe::powershell_probe_script(), None)
                .await
            {
                Ok(result) => super::os_probe::parse_os_probe_powershell(&result.stdout),
                Err(_) => OsInfo::unknown(),
            },
        };
        *self.os.lock().unwrap() = Some(info.clone());
        Ok(info)
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn decide_default_shell(&mut self) -> Result<Shell> {
        if let Some(shell) = *self.default_shell.lock().unwrap() {
            return Ok(shell);
        }
        let exec = self.executor(ExecOptions {
            shell: Some(Shell::Sh),
            ..Default::default()
        });
        let shell = match exec
            .run(super::os_probe::decide_default_shell_script(), None)
            .await
        {
            Ok(result) => Shell::from_name(result.stdout.trim()),
            Err(_) => Shell::Powershell,
        };
        *self.default_shell.lock().unwrap() = Some(shell);
        Ok(shell)
    }

    fn executor(&self, mut options: ExecOptions) -> Executor {
        if options.shell.is_none() {
            options.shell = *self.default_shell.lock().unwrap();
        }
        let exec_impl = SshExec {
            handle: self.handle.clone(),
            target: self.descriptor.name.clone(),
        };
        Executor::new(Arc::new(exec_impl), options)
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn destroy(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.write().await.take() {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await;
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    #[instrument(skip(self), fields(target = %self.descriptor.name))]
    async fn cleanup(&mut self) -> Result<()> {
        self.initialized = false;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn os_info(&self) -> Option<&OsInfo> {
        None
    }

    fn default_shell(&self) -> Option<Shell> {
        *self.default_shell.lock().unwrap()
    }

    async fn write_file(&self, path: &str, content: &[u8], mode: Option<u32>) -> Result<()> {
        let sftp = self.open_sftp().await?;
        if let Some(parent) = Path::new(path).parent() {
            let mut current = PathBuf::new();
            for component in parent.components() {
                current.push(component);
                if current.to_string_lossy() == "/" {
                    continue;
                }
                let _ = sftp.create_dir(current.to_string_lossy().to_string()).await;
            }
        }
        use tokio::io::AsyncWriteExt;
        let mut file = sftp
            .create(path)
            .await
            .map_err(|e| connection_error(&self.descriptor.name, e))?;
        file.write_all(content)
            .await
            .map_err(|e| connection_error(&self.descriptor.name, e))?;
        drop(file);
        if let Some(mode) = mode {
            let mut attrs = russh_sftp::protocol::FileAttributes::default();
            attrs.permissions = Some(mode);
            let _ = sftp.set_metadata(path, attrs).await;
        }
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;
        let sftp = self.open_sftp().await?;
        let mut file = sftp
            .open(path)
            .await
            .map_err(|e| connection_error(&self.descriptor.name, e))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .await
            .map_err(|e| connection_error(&self.descriptor.name, e))?;
        Ok(buf)
    }
}

struct SshExec {
    handle: Arc<RwLock<Option<Handle<ClientHandler>>>>,
    target: String,
}

#[async_trait]
impl ExecutorImpl for SshExec {
    async fn exec(&self, command: &str, options: ExecOptions) -> Result<ExecResult> {
        let prepared = super::prepare_command(command, &options);
        trace!(command = %prepared, "executing over ssh");

        let run = async {
            let guard = self.handle.read().await;
            let handle = guard.as_ref().ok_or_else(|| Error::Connection {
                target: self.target.clone(),
                message: "not connected".into(),
            })?;
            let mut channel = handle
                .channel_open_session()
                .await
                .map_err(|e| connection_error(&self.target, e))?;
            drop(guard);

            channel
                .exec(true, prepared.as_bytes())
                .await
                .map_err(|e| connection_error(&self.target, e))?;

            let marker = options
                .prompt_marker
                .clone()
                .or_else(|| Some(DEFAULT_SUDO_PROMPT_MARKER.to_string()));
            let mut scanner =
                PromptScanner::new(marker, options.interactive_password.clone(), options.hide_prompt_line);
            let mut stdout = String::new();
            let mut stderr = String::new();
            let mut exit_code: Option<u32> = None;
            let mut stdout_lines = LineBuffer::new();
            let mut stderr_lines = LineBuffer::new();

            while let Some(msg) = channel.wait().await {
                match msg {
                    ChannelMsg::Data { data } => {
                        let chunk = String::from_utf8_lossy(&data).to_string();
                        let (outcome, visible) = scanner.ingest(&chunk);
                        if let Some(password) = outcome.write_password {
                            let mut cursor = tokio::io::BufReader::new(password.as_bytes());
                            let _ = channel.data(&mut cursor).await;
                        }
                        stdout.push_str(&visible);
                        if let Some(cb) = &options.on_stdout {
                            for line in stdout_lines.push(&visible) {
                                cb(&line);
                            }
                        }
                    }
                    ChannelMsg::ExtendedData { data, ext } if ext == 1 => {
                        let chunk = String::from_utf8_lossy(&data).to_string();
                        let (outcome, visible) = scanner.ingest(&chunk);
                        if let Some(password) = outcome.write_password {
                            let mut cursor = tokio::io::BufReader::new(password.as_bytes());
                            let _ = channel.data(&mut cursor).await;
                        }
                        stderr.push_str(&visible);
                        if let Some(cb) = &options.on_stderr {
                            for line in stderr_lines.push(&visible) {
                                cb(&line);
                            }
                        }
                    }
                    ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                    ChannelMsg::Close => break,
                    _ => {}
                }
            }
            if let Some(cb) = &options.on_stdout {
                if let Some(rest) = stdout_lines.flush() {
                    cb(&rest);
                }
            }
            if let Some(cb) = &options.on_stderr {
                if let Some(rest) = stderr_lines.flush() {
                    cb(&rest);
                }
            }

            let auth_denied = scanner.auth_denied();
            let code = exit_code
                .map(|c| c as i32)
                .unwrap_or(if auth_denied { 1 } else { -1 });

            Ok::<_, Error>(ExecResult {
                command: prepared.clone(),
                code,
                stdout,
                stderr,
            })
        };

        match options.timeout_ms {
            Some(ms) if ms > 0 => {
                match tokio::time::timeout(Duration::from_millis(ms), run).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout(ms)),
                }
            }
            _ => run.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_path_resolves_home_prefix() {
        let expanded = expand_path("~/.ssh/id_ed25519");
        assert!(expanded.is_absolute() || expanded.starts_with("~"));
    }
}
