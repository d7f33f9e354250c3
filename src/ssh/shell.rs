// ABOUTME: Interactive PTY shell channel over russh.
// ABOUTME: Provides timed writes and non-blocking reads for the session driver.

use super::client::SshHandler;
use super::error::{Error, Result};
use super::transport::{PtyRequest, ShellChannel, ShellRead};
use async_trait::async_trait;
use futures::FutureExt;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg};
use std::time::Duration;

/// A shell running on a PTY channel.
pub struct RusshShell {
    channel: Channel<Msg>,
    send_timeout: Duration,
}

impl RusshShell {
    pub(crate) async fn open(
        handle: &Handle<SshHandler>,
        pty: &PtyRequest,
        send_timeout: Duration,
    ) -> Result<Self> {
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .request_pty(true, &pty.term, pty.cols, pty.rows, 0, 0, &[])
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to allocate PTY: {}", e)))?;
        await_reply(&mut channel, "PTY allocation", send_timeout).await?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to start shell: {}", e)))?;
        await_reply(&mut channel, "shell start", send_timeout).await?;

        tracing::debug!(term = %pty.term, cols = pty.cols, rows = pty.rows, "shell ready");
        Ok(Self {
            channel,
            send_timeout,
        })
    }
}

/// Wait for the server to accept or refuse a request sent with `want_reply`.
async fn await_reply(
    channel: &mut Channel<Msg>,
    request: &'static str,
    limit: Duration,
) -> Result<()> {
    let reply = async {
        loop {
            if let Some(outcome) = reply_outcome(request, channel.wait().await) {
                return outcome;
            }
        }
    };
    tokio::time::timeout(limit, reply)
        .await
        .map_err(|_| Error::timeout(request, limit))?
}

fn reply_outcome(request: &str, msg: Option<ChannelMsg>) -> Option<Result<()>> {
    match msg {
        Some(ChannelMsg::Success) => Some(Ok(())),
        Some(ChannelMsg::Failure) => Some(Err(Error::CommandFailed(format!(
            "server refused {request}"
        )))),
        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => Some(Err(Error::ChannelClosed)),
        Some(other) => {
            tracing::trace!(?other, request, "message before request reply");
            None
        }
    }
}

#[async_trait]
impl ShellChannel for RusshShell {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        match tokio::time::timeout(self.send_timeout, self.channel.data(data)).await {
            Ok(result) => result.map_err(Error::Protocol),
            Err(_) => Err(Error::timeout("shell write", self.send_timeout)),
        }
    }

    fn try_recv(&mut self) -> Result<ShellRead> {
        loop {
            // Channel::wait is a plain queue receive, so dropping the pending future loses nothing.
            let Some(msg) = self.channel.wait().now_or_never() else {
                return Ok(ShellRead::Empty);
            };
            match msg {
                Some(ChannelMsg::Data { data }) => return Ok(ShellRead::Data(data.to_vec())),
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return Ok(ShellRead::Data(data.to_vec()));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Ok(ShellRead::Closed);
                }
                Some(other) => tracing::trace!(?other, "ignoring shell channel message"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_request_is_a_command_failure() {
        let err = reply_outcome("PTY allocation", Some(ChannelMsg::Failure))
            .unwrap()
            .unwrap_err();
        assert!(
            matches!(err, Error::CommandFailed(ref msg) if msg == "server refused PTY allocation"),
            "got: {err:?}"
        );
    }

    #[test]
    fn accepted_request_completes() {
        assert!(matches!(
            reply_outcome("shell start", Some(ChannelMsg::Success)),
            Some(Ok(()))
        ));
    }

    #[test]
    fn closed_channel_ends_the_wait() {
        for msg in [Some(ChannelMsg::Close), Some(ChannelMsg::Eof), None] {
            assert!(matches!(
                reply_outcome("shell start", msg),
                Some(Err(Error::ChannelClosed))
            ));
        }
    }

    #[test]
    fn unrelated_messages_keep_waiting() {
        let msg = ChannelMsg::WindowAdjusted { new_size: 65536 };
        assert!(reply_outcome("shell start", Some(msg)).is_none());
    }
}
