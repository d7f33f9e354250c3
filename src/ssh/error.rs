// ABOUTME: SSH-specific error types.
// ABOUTME: Closed set covering connection, authentication, timeouts and transfers.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication failed: credentials rejected by server")]
    AuthFailed,

    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("file transfer failed: {0}")]
    TransferFailed(String),

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("channel closed unexpectedly")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn timeout(operation: &'static str, after: Duration) -> Self {
        Error::Timeout { operation, after }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
