// ABOUTME: Interactive shell driver.
// ABOUTME: Sends queued commands and collects output until a rolling inactivity window expires.

use crate::config::ShellConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::output::Output;
use crate::ssh::{
    self, Connection, Connector, SessionConfig, ShellChannel, ShellRead, with_connection,
};
use chrono::{DateTime, Utc};
use nonempty::NonEmpty;
use serde::Serialize;
use thiserror::Error;
use tokio::time::{Instant, sleep};

/// Everything received from the shell, one entry per command sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// All collected output in the order it arrived.
    pub fn output(&self) -> String {
        self.entries.iter().map(|e| e.output.as_str()).collect()
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.command.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub command: String,
    pub sent_at: DateTime<Utc>,
    pub output: String,
}

impl TranscriptEntry {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            sent_at: Utc::now(),
            output: String::new(),
        }
    }
}

/// The queue stopped early. Output gathered before the failure is kept.
#[derive(Debug, Error)]
#[error("interactive session aborted: {source}")]
pub struct SessionAborted {
    pub transcript: Transcript,
    #[source]
    pub source: ssh::Error,
}

impl From<ssh::Error> for SessionAborted {
    fn from(source: ssh::Error) -> Self {
        Self {
            transcript: Transcript::default(),
            source,
        }
    }
}

/// How output collection for one command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ended {
    Inactive,
    Sentinel,
    Closed,
}

/// Completion marker echoed after a command.
#[derive(Debug, Clone)]
struct Sentinel {
    marker: String,
    echo: String,
}

impl Sentinel {
    fn new(index: usize) -> Self {
        // The PTY echoes our input back; splitting the marker with '' keeps
        // the echoed command line from matching.
        Self {
            marker: format!("__sshrun_done_{index}__"),
            echo: format!("echo __sshrun_done_''{index}__"),
        }
    }

    /// Strip the marker line from `buf`, and the echoed `echo` line with it.
    /// Returns whether the marker was there.
    fn cut(&self, buf: &mut String) -> bool {
        if !remove_line(buf, &self.marker) {
            return false;
        }
        remove_line(buf, &self.echo);
        true
    }
}

/// Remove the first `needle` in `buf` along with the line ending after it.
fn remove_line(buf: &mut String, needle: &str) -> bool {
    let Some(pos) = buf.find(needle) else {
        return false;
    };
    let mut end = pos + needle.len();
    if buf[end..].starts_with("\r\n") {
        end += 2;
    } else if buf[end..].starts_with('\n') {
        end += 1;
    }
    buf.replace_range(pos..end, "");
    true
}

/// True when the shell sent back only the echo of `sent`, and at most a
/// prompt with no line ending after it.
fn only_echo(output: &str, sent: &str) -> bool {
    let mut rest = output;
    for input in sent.lines() {
        rest = rest.trim_start();
        rest = rest.strip_prefix(input).unwrap_or(rest);
    }
    !rest.trim_start().contains('\n')
}

/// Open an interactive shell and run `commands` through it in order.
pub async fn run_session<C: Connector>(
    connector: &C,
    config: &SessionConfig,
    shell: &ShellConfig,
    commands: &NonEmpty<String>,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<Transcript, SessionAborted> {
    output.progress(&format!("Connecting to {}...", config.host));

    with_connection(
        connector,
        config,
        diag,
        async |conn: &mut C::Connection,
               diag: &mut Diagnostics|
               -> Result<Transcript, SessionAborted> {
            output.progress("Connected!");
            let mut channel = conn.open_shell(&shell.pty()).await?;
            drive_shell(&mut channel, shell, commands, output, diag).await
        },
    )
    .await
}

/// Drive an already-open shell channel through the command queue.
pub async fn drive_shell<S: ShellChannel>(
    channel: &mut S,
    shell: &ShellConfig,
    commands: &NonEmpty<String>,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<Transcript, SessionAborted> {
    let mut transcript = Transcript::default();
    match drive(channel, shell, commands, output, diag, &mut transcript).await {
        Ok(()) => Ok(transcript),
        Err(source) => Err(SessionAborted { transcript, source }),
    }
}

async fn drive<S: ShellChannel>(
    channel: &mut S,
    shell: &ShellConfig,
    commands: &NonEmpty<String>,
    output: &Output,
    diag: &mut Diagnostics,
    transcript: &mut Transcript,
) -> ssh::Result<()> {
    sleep(shell.ready_delay).await;
    let discarded = drain_banner(channel)?;
    tracing::debug!(bytes = discarded, "discarded login banner");

    for (index, command) in commands.iter().enumerate() {
        output.progress(&format!("\n>>> Running: {command}"));

        let sentinel = shell.sentinel.then(|| Sentinel::new(index));
        let line = match &sentinel {
            Some(s) => format!("{command}\n{}\n", s.echo),
            None => format!("{command}\n"),
        };
        channel.send(line.as_bytes()).await?;

        let mut entry = TranscriptEntry::new(command);
        sleep(shell.settle_delay).await;
        let ended = collect_output(channel, shell, sentinel.as_ref(), &mut entry, output).await;

        if matches!(ended, Ok(Ended::Inactive)) && only_echo(&entry.output, &line) {
            diag.warn(Warning::silent_command(format!(
                "no output from `{}` within {:?}",
                command, shell.inactivity_window
            )));
        }
        transcript.entries.push(entry);

        match ended? {
            Ended::Closed if index + 1 < commands.len() => return Err(ssh::Error::ChannelClosed),
            ended => tracing::debug!(command = %command, ?ended, "output collection finished"),
        }
    }

    Ok(())
}

/// Discard whatever the shell printed on login.
fn drain_banner<S: ShellChannel>(channel: &mut S) -> ssh::Result<usize> {
    let mut discarded = 0;
    loop {
        match channel.try_recv()? {
            ShellRead::Data(bytes) => discarded += bytes.len(),
            ShellRead::Empty => return Ok(discarded),
            ShellRead::Closed => return Err(ssh::Error::ChannelClosed),
        }
    }
}

/// Append whatever is already buffered to `entry`. Returns true if the
/// channel closed.
fn drain_into<S: ShellChannel>(
    channel: &mut S,
    entry: &mut TranscriptEntry,
    output: &Output,
) -> ssh::Result<bool> {
    loop {
        match channel.try_recv()? {
            ShellRead::Data(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                output.stream(&text);
                entry.output.push_str(&text);
            }
            ShellRead::Empty => return Ok(false),
            ShellRead::Closed => return Ok(true),
        }
    }
}

async fn collect_output<S: ShellChannel>(
    channel: &mut S,
    shell: &ShellConfig,
    sentinel: Option<&Sentinel>,
    entry: &mut TranscriptEntry,
    output: &Output,
) -> ssh::Result<Ended> {
    let mut last_data = Instant::now();
    loop {
        match channel.try_recv()? {
            ShellRead::Data(bytes) => {
                let mut text = String::from_utf8_lossy(&bytes).into_owned();
                entry.output.push_str(&text);
                last_data = Instant::now();

                let Some(sentinel) = sentinel.filter(|s| s.cut(&mut entry.output)) else {
                    output.stream(&text);
                    continue;
                };
                remove_line(&mut text, &sentinel.marker);
                output.stream(&text);

                // The prompt usually trails the marker; keep it with this command.
                let closed = drain_into(channel, entry, output)?;
                return Ok(if closed { Ended::Closed } else { Ended::Sentinel });
            }
            ShellRead::Empty if last_data.elapsed() >= shell.inactivity_window => {
                return Ok(Ended::Inactive);
            }
            ShellRead::Empty => sleep(shell.poll_interval).await,
            ShellRead::Closed => return Ok(Ended::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_echo_line_does_not_contain_marker() {
        let sentinel = Sentinel::new(3);
        assert_eq!(sentinel.marker, "__sshrun_done_3__");
        assert!(!sentinel.echo.contains(&sentinel.marker));
    }

    #[test]
    fn sentinel_cut_removes_marker_and_echo_lines() {
        let sentinel = Sentinel::new(0);
        let mut buf =
            "whoami\r\necho __sshrun_done_''0__\r\nci\r\n__sshrun_done_0__\r\n$ ".to_string();

        assert!(sentinel.cut(&mut buf));
        assert_eq!(buf, "whoami\r\nci\r\n$ ");
        assert!(!sentinel.cut(&mut buf));
    }

    #[test]
    fn echo_and_prompt_alone_are_silent() {
        assert!(only_echo("", "true\n"));
        assert!(only_echo("true\r\n", "true\n"));
        assert!(only_echo("true\r\nuser@mac ~ % ", "true\n"));
        assert!(!only_echo("echo hi\r\nhi\r\n$ ", "echo hi\n"));
        assert!(!only_echo("ls: nope: No such file\r\n", "ls nope\n"));
    }

    #[test]
    fn transcript_concatenates_output_in_order() {
        let mut transcript = Transcript::default();
        for (cmd, out) in [("a", "one\n"), ("b", ""), ("c", "three\n")] {
            let mut entry = TranscriptEntry::new(cmd);
            entry.output.push_str(out);
            transcript.entries.push(entry);
        }
        assert_eq!(transcript.output(), "one\nthree\n");
        assert_eq!(transcript.commands().collect::<Vec<_>>(), ["a", "b", "c"]);
    }

    #[test]
    fn aborted_session_from_transport_error_has_empty_transcript() {
        let aborted = SessionAborted::from(ssh::Error::AuthFailed);
        assert!(aborted.transcript.entries.is_empty());
        assert!(aborted.to_string().contains("authentication failed"));
    }
}
