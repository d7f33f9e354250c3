// ABOUTME: Transport seam between the command procedures and the SSH library.
// ABOUTME: Defines connector/connection/shell traits and scoped connection handling.

use super::client::SessionConfig;
use super::error::{Error, Result};
use crate::diagnostics::{Diagnostics, Warning};
use async_trait::async_trait;
use std::path::Path;

/// Output from a remote command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Pseudo-terminal parameters for an interactive shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub cols: u32,
    pub rows: u32,
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self {
            term: "xterm".to_string(),
            cols: 80,
            rows: 24,
        }
    }
}

/// Result of a single non-blocking read from a shell channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellRead {
    /// Bytes that were waiting on the channel.
    Data(Vec<u8>),
    /// Nothing buffered right now.
    Empty,
    /// The remote side closed the channel.
    Closed,
}

/// Opens connections to a remote host.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection;

    async fn connect(&self, config: &SessionConfig) -> Result<Self::Connection>;
}

/// An established, authenticated connection.
#[async_trait]
pub trait Connection: Send {
    type Shell: ShellChannel;

    /// Copy a remote file to a local path, returning the number of bytes written.
    async fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<u64>;

    /// Run one command on a fresh channel and wait for it to finish.
    async fn exec(&mut self, command: &str) -> Result<CommandOutput>;

    /// Allocate a PTY and start an interactive shell.
    async fn open_shell(&mut self, pty: &PtyRequest) -> Result<Self::Shell>;

    /// Tear the connection down. Consumes the connection so it closes at most once.
    async fn close(self) -> Result<()>;
}

/// An interactive shell channel.
#[async_trait]
pub trait ShellChannel: Send {
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Return whatever is buffered without waiting.
    fn try_recv(&mut self) -> Result<ShellRead>;
}

/// Connect, run `body` against the connection, then close it.
///
/// The connection is closed exactly once whatever `body` returns. A failed
/// close is recorded as a warning and never replaces the body's result.
pub async fn with_connection<C, T, E, F>(
    connector: &C,
    config: &SessionConfig,
    diag: &mut Diagnostics,
    body: F,
) -> std::result::Result<T, E>
where
    C: Connector,
    E: From<Error>,
    F: AsyncFnOnce(&mut C::Connection, &mut Diagnostics) -> std::result::Result<T, E>,
{
    let mut connection = connector.connect(config).await?;
    tracing::debug!(host = %config.host, port = config.port, "connection established");

    let result = body(&mut connection, diag).await;

    if let Err(e) = connection.close().await {
        diag.warn(Warning::ssh_disconnect(format!(
            "SSH disconnect failed for {}: {}",
            config.host, e
        )));
    }

    result
}
