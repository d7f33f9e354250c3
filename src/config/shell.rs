// ABOUTME: Interactive shell timing and terminal configuration.
// ABOUTME: Settle delay, rolling inactivity window, poll interval and PTY shape.

use crate::ssh::PtyRequest;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellConfig {
    /// Pause after the shell starts, before the banner is drained.
    #[serde(default = "default_ready_delay", with = "humantime_serde")]
    pub ready_delay: Duration,

    /// Pause after each command is written, before polling starts.
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,

    /// Silence that ends collection for a command. Restarts on every chunk.
    #[serde(default = "default_inactivity_window", with = "humantime_serde")]
    pub inactivity_window: Duration,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Bound on each write to the shell channel.
    #[serde(default = "default_channel_timeout", with = "humantime_serde")]
    pub channel_timeout: Duration,

    #[serde(default = "default_term")]
    pub term: String,

    #[serde(default = "default_cols")]
    pub cols: u32,

    #[serde(default = "default_rows")]
    pub rows: u32,

    /// Echo a marker after each command and stop collecting once it is seen.
    #[serde(default)]
    pub sentinel: bool,
}

fn default_ready_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_inactivity_window() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_channel_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_term() -> String {
    "xterm".to_string()
}

fn default_cols() -> u32 {
    80
}

fn default_rows() -> u32 {
    24
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            ready_delay: default_ready_delay(),
            settle_delay: default_settle_delay(),
            inactivity_window: default_inactivity_window(),
            poll_interval: default_poll_interval(),
            channel_timeout: default_channel_timeout(),
            term: default_term(),
            cols: default_cols(),
            rows: default_rows(),
            sentinel: false,
        }
    }
}

impl ShellConfig {
    pub fn pty(&self) -> PtyRequest {
        PtyRequest {
            term: self.term.clone(),
            cols: self.cols,
            rows: self.rows,
        }
    }
}
