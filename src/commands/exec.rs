// ABOUTME: Exec command implementation.
// ABOUTME: Runs one non-interactive command and reports its stdout and stderr.

use crate::diagnostics::Diagnostics;
use crate::output::Output;
use crate::ssh::{CommandOutput, Connection, Connector, Result, SessionConfig, with_connection};

/// Run `command` on the remote host and print whatever it wrote.
pub async fn run_command<C: Connector>(
    connector: &C,
    config: &SessionConfig,
    command: &str,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<CommandOutput> {
    output.progress(&format!("Connecting to {}...", config.host));

    let result = with_connection(
        connector,
        config,
        diag,
        async |conn: &mut C::Connection, _diag: &mut Diagnostics| {
            output.progress("Connected!");
            conn.exec(command).await
        },
    )
    .await?;

    if !result.stdout.is_empty() {
        output.section("STDOUT", &result.stdout);
    }
    if !result.stderr.is_empty() {
        output.section("STDERR", &result.stderr);
    }
    tracing::debug!(exit_code = result.exit_code, "remote command finished");

    Ok(result)
}
