// ABOUTME: Fetch command implementation.
// ABOUTME: Downloads a single remote file to a local path over SFTP.

use crate::diagnostics::Diagnostics;
use crate::output::Output;
use crate::ssh::{Connection, Connector, Result, SessionConfig, with_connection};
use std::path::Path;

/// Download `remote_path` to `local_path`, returning the bytes written.
pub async fn download_file<C: Connector>(
    connector: &C,
    config: &SessionConfig,
    remote_path: &str,
    local_path: &Path,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<u64> {
    output.progress(&format!("Connecting to {}...", config.host));

    with_connection(
        connector,
        config,
        diag,
        async |conn: &mut C::Connection, _diag: &mut Diagnostics| -> Result<u64> {
            output.progress("Connected!");
            output.progress(&format!(
                "Downloading {} to {}...",
                remote_path,
                local_path.display()
            ));
            let bytes = conn.download(remote_path, local_path).await?;
            output.success("Download complete!");
            Ok(bytes)
        },
    )
    .await
}
