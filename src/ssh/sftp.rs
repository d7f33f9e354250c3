// ABOUTME: Single-file SFTP download over an established session.
// ABOUTME: Streams the remote file into a newly created local file.

use super::client::RusshConnection;
use super::error::{Error, Result};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use std::path::Path;
use tokio::io::AsyncWriteExt;

impl RusshConnection {
    /// Download `remote_path` to `local_path` over the sftp subsystem.
    ///
    /// The server must enable the subsystem, e.g. `Subsystem sftp internal-sftp`
    /// in sshd_config.
    pub async fn download_sftp(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::TransferFailed(format!("failed to open channel: {}", e)))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| Error::TransferFailed(format!("sftp subsystem unavailable: {}", e)))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::TransferFailed(format!("failed to start sftp session: {}", e)))?;

        let mut remote_file = sftp
            .open_with_flags(remote_path, OpenFlags::READ)
            .await
            .map_err(|e| Error::TransferFailed(format!("cannot open {}: {}", remote_path, e)))?;

        let mut local_file = tokio::fs::File::create(local_path).await.map_err(|e| {
            Error::TransferFailed(format!("cannot create {}: {}", local_path.display(), e))
        })?;

        let bytes = tokio::io::copy(&mut remote_file, &mut local_file)
            .await
            .map_err(|e| Error::TransferFailed(format!("copy interrupted: {}", e)))?;
        local_file
            .flush()
            .await
            .map_err(|e| Error::TransferFailed(format!("flush failed: {}", e)))?;

        tracing::debug!(remote = remote_path, local = %local_path.display(), bytes, "download finished");
        Ok(bytes)
    }
}
