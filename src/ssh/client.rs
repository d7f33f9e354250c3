// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, host key policy, authentication, and command execution.

use super::error::{Error, Result};
use super::shell::RusshShell;
use super::transport::{CommandOutput, Connection, Connector, PtyRequest};
use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;

/// How unknown or unverified server host keys are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Only accept keys already present in known_hosts.
    #[default]
    Strict,
    /// Accept and record keys for hosts not yet in known_hosts.
    TrustOnFirstUse,
    /// Accept any key without checking. Offers no protection against interception.
    AcceptAny,
}

/// Credential used to authenticate.
#[derive(Debug, Clone)]
pub enum Credential {
    Password(SecretString),
    KeyFile(PathBuf),
    Agent,
}

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    pub credential: Credential,
    pub host_key_policy: HostKeyPolicy,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Bound on TCP connect, handshake and authentication (default: 30 seconds).
    pub connect_timeout: Duration,
    /// Timeout for command execution (default: 5 minutes).
    pub command_timeout: Duration,
    /// Bound on each write to an interactive shell (default: 2 minutes).
    pub channel_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            credential: Credential::Agent,
            host_key_policy: HostKeyPolicy::Strict,
            known_hosts_path: None,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(300),
            channel_timeout: Duration::from_secs(120),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: SecretString) -> Self {
        self.credential = Credential::Password(password);
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential = Credential::KeyFile(path.into());
        self
    }

    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn channel_timeout(mut self, timeout: Duration) -> Self {
        self.channel_timeout = timeout;
        self
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
    known_hosts_path: Option<PathBuf>,
}

impl SshHandler {
    fn new(host: String, port: u16, policy: HostKeyPolicy, known_hosts_path: Option<PathBuf>) -> Self {
        Self {
            host,
            port,
            policy,
            known_hosts_path,
        }
    }

    fn learn(&self, server_public_key: &ssh_key::PublicKey) {
        let learn_result = match &self.known_hosts_path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => learn_known_hosts(&self.host, self.port, server_public_key),
        };
        if let Err(e) = learn_result {
            tracing::warn!("Failed to save host key to known_hosts: {}", e);
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        if self.policy == HostKeyPolicy::AcceptAny {
            tracing::warn!(
                "accepting host key for {}:{} without verification",
                self.host,
                self.port
            );
            return Ok(true);
        }

        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        let tofu = self.policy == HostKeyPolicy::TrustOnFirstUse;
        match check_result {
            Ok(true) => Ok(true),
            Ok(false) if tofu => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                self.learn(server_public_key);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(russh::keys::Error::KeyChanged { line }) => {
                tracing::warn!(
                    "host key for {}:{} does not match known_hosts line {}",
                    self.host,
                    self.port,
                    line
                );
                Ok(false)
            }
            // Unreadable known_hosts: nothing to compare against.
            Err(_) => Ok(tofu),
        }
    }
}

/// Authentication method resolved from config.
enum AuthMethod {
    Password(SecretString),
    Agent(AgentClient<UnixStream>),
    KeyFile(Arc<ssh_key::PrivateKey>),
}

/// Opens [`RusshConnection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshConnector;

#[async_trait]
impl Connector for RusshConnector {
    type Connection = RusshConnection;

    async fn connect(&self, config: &SessionConfig) -> Result<RusshConnection> {
        RusshConnection::connect(config.clone()).await
    }
}

/// An established SSH session backed by russh.
pub struct RusshConnection {
    config: SessionConfig,
    pub(crate) handle: Handle<SshHandler>,
}

impl std::fmt::Debug for RusshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshConnection")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl RusshConnection {
    /// Connect to the remote host and authenticate.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let auth_method = Self::resolve_auth_method(&config).await?;

        let timeout = config.connect_timeout;
        let handle = tokio::time::timeout(timeout, Self::establish(&config, auth_method))
            .await
            .map_err(|_| Error::timeout("connect", timeout))??;

        Ok(Self { config, handle })
    }

    async fn establish(config: &SessionConfig, auth_method: AuthMethod) -> Result<Handle<SshHandler>> {
        let russh_config = Config {
            inactivity_timeout: Some(config.command_timeout),
            ..Default::default()
        };

        let handler = SshHandler::new(
            config.host.clone(),
            config.port,
            config.host_key_policy,
            config.known_hosts_path.clone(),
        );

        tracing::debug!(host = %config.host, port = config.port, "opening SSH connection");
        let mut session = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        )
        .await
        .map_err(|e| match e {
            russh::Error::UnknownKey => Error::ConnectionFailed(format!(
                "host key for {}:{} was rejected (policy: {:?})",
                config.host, config.port, config.host_key_policy
            )),
            e if e.to_string().contains("Connection refused") => Error::ConnectionFailed(
                format!("connection refused to {}:{}", config.host, config.port),
            ),
            e => Error::ConnectionFailed(e.to_string()),
        })?;

        if !Self::authenticate(&mut session, config, auth_method).await? {
            return Err(Error::AuthFailed);
        }
        tracing::debug!(user = %config.user, "authenticated");

        Ok(session)
    }

    /// Resolve which authentication method to use.
    async fn resolve_auth_method(config: &SessionConfig) -> Result<AuthMethod> {
        match &config.credential {
            Credential::Password(password) => Ok(AuthMethod::Password(password.clone())),
            Credential::KeyFile(key_path) => {
                let key = load_secret_key(key_path, None).map_err(|e| Error::KeyLoadFailed {
                    path: key_path.clone(),
                    reason: e.to_string(),
                })?;
                Ok(AuthMethod::KeyFile(Arc::new(key)))
            }
            Credential::Agent => AgentClient::connect_env()
                .await
                .map(AuthMethod::Agent)
                .map_err(|e| Error::AgentUnavailable(e.to_string())),
        }
    }

    /// Authenticate the session.
    async fn authenticate(
        session: &mut Handle<SshHandler>,
        config: &SessionConfig,
        auth_method: AuthMethod,
    ) -> Result<bool> {
        match auth_method {
            AuthMethod::Password(password) => {
                let result = session
                    .authenticate_password(&config.user, password.expose_secret().as_str())
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
            AuthMethod::Agent(mut agent) => {
                let keys = agent.request_identities().await.map_err(|e| {
                    Error::AgentUnavailable(format!("failed to list agent keys: {}", e))
                })?;

                if keys.is_empty() {
                    return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
                }

                for key in &keys {
                    match session
                        .authenticate_publickey_with(&config.user, key.clone(), None, &mut agent)
                        .await
                    {
                        Ok(result) if result.success() => return Ok(true),
                        _ => continue,
                    }
                }
                Ok(false)
            }
            AuthMethod::KeyFile(key) => {
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();

                let result = session
                    .authenticate_publickey(&config.user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
                    .map_err(Error::Protocol)?;

                Ok(result.success())
            }
        }
    }

    /// Execute a command with the configured timeout.
    pub async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("command", timeout)),
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = 0u32;

        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                    stderr.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        if !got_exit_status {
            return Err(Error::ChannelClosed);
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

#[async_trait]
impl Connection for RusshConnection {
    type Shell = RusshShell;

    async fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<u64> {
        self.download_sftp(remote_path, local_path).await
    }

    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.config.command_timeout)
            .await
    }

    async fn open_shell(&mut self, pty: &PtyRequest) -> Result<RusshShell> {
        RusshShell::open(&self.handle, pty, self.config.channel_timeout).await
    }

    async fn close(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_defaults_match_documented_timeouts() {
        let config = SessionConfig::new("example.com", "deploy");
        assert_eq!(config.port, 22);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.command_timeout, Duration::from_secs(300));
        assert_eq!(config.channel_timeout, Duration::from_secs(120));
        assert_eq!(config.host_key_policy, HostKeyPolicy::Strict);
        assert!(matches!(config.credential, Credential::Agent));
    }

    #[test]
    fn password_is_redacted_in_debug_output() {
        let config = SessionConfig::new("example.com", "deploy")
            .password(SecretString::new("hunter2".to_string()));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"), "debug output leaked password: {debug}");
    }

    #[test]
    fn host_key_policy_parses_kebab_case() {
        let policy: HostKeyPolicy = serde_yaml::from_str("trust-on-first-use").unwrap();
        assert_eq!(policy, HostKeyPolicy::TrustOnFirstUse);
        let policy: HostKeyPolicy = serde_yaml::from_str("accept-any").unwrap();
        assert_eq!(policy, HostKeyPolicy::AcceptAny);
    }
}
