// ABOUTME: SSH client module for remote server connections.
// ABOUTME: Password, key and agent auth with a configurable host key policy.

mod client;
mod error;
mod sftp;
mod shell;
mod transport;

pub use client::{
    Credential, HostKeyPolicy, RusshConnection, RusshConnector, SessionConfig,
};
pub use error::{Error, Result};
pub use shell::RusshShell;
pub use transport::{
    CommandOutput, Connection, Connector, PtyRequest, ShellChannel, ShellRead, with_connection,
};
