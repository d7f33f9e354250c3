// ABOUTME: In-memory transport standing in for a real SSH server.
// ABOUTME: Records connects, closes and shell writes so tests can assert on them.

use async_trait::async_trait;
use parking_lot::Mutex;
use sshrun::ssh::{
    CommandOutput, Connection, Connector, Error, PtyRequest, Result, SessionConfig, ShellChannel,
    ShellRead,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// How the fake shell responds after each command is written.
#[derive(Debug, Clone)]
pub enum ShellBehaviour {
    /// Never produces output.
    Silent,
    /// Echoes each line back like a PTY, and prints the argument of any
    /// `echo` line like a shell would.
    Echo,
    /// Emits a chunk every `every` until `for_` has passed since the last send.
    Chatty { every: Duration, for_: Duration },
    /// Echoes the first command, then reports the channel closed.
    CloseAfterFirst,
    /// Fails every read after the first send.
    FailRead,
}

/// What the fake connection does for each operation.
#[derive(Debug, Clone)]
pub struct Script {
    pub fail_connect: bool,
    pub download: std::result::Result<Vec<u8>, String>,
    pub exec: std::result::Result<CommandOutput, String>,
    pub fail_open_shell: bool,
    pub fail_close: bool,
    /// Printed after the echo of every line written to the shell.
    pub prompt: Option<String>,
    pub banner: Vec<Vec<u8>>,
    pub shell: ShellBehaviour,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_connect: false,
            download: Ok(b"remote-bytes".to_vec()),
            exec: Ok(CommandOutput::default()),
            fail_open_shell: false,
            fail_close: false,
            prompt: None,
            banner: vec![b"Last login: Mon Oct 19 09:00:00\r\n".to_vec(), b"$ ".to_vec()],
            shell: ShellBehaviour::Echo,
        }
    }
}

/// Shared record of everything the fake saw.
#[derive(Debug, Default)]
pub struct Record {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub executed: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(Instant, String)>>,
}

impl Record {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, line)| line.clone()).collect()
    }

    pub fn send_times(&self) -> Vec<Instant> {
        self.sent.lock().iter().map(|(at, _)| *at).collect()
    }
}

pub struct FakeConnector {
    script: Script,
    pub record: Arc<Record>,
}

impl FakeConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            record: Arc::new(Record::default()),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self, config: &SessionConfig) -> Result<FakeConnection> {
        if self.script.fail_connect {
            return Err(Error::ConnectionFailed(format!(
                "connection refused to {}:{}",
                config.host, config.port
            )));
        }
        self.record.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            script: self.script.clone(),
            record: Arc::clone(&self.record),
        })
    }
}

pub struct FakeConnection {
    script: Script,
    record: Arc<Record>,
}

#[async_trait]
impl Connection for FakeConnection {
    type Shell = FakeShell;

    async fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<u64> {
        match &self.script.download {
            Ok(bytes) => {
                std::fs::write(local_path, bytes).map_err(|e| {
                    Error::TransferFailed(format!("cannot create {}: {}", local_path.display(), e))
                })?;
                Ok(bytes.len() as u64)
            }
            Err(reason) => Err(Error::TransferFailed(format!(
                "cannot open {}: {}",
                remote_path, reason
            ))),
        }
    }

    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        self.record.executed.lock().push(command.to_string());
        self.script.exec.clone().map_err(Error::CommandFailed)
    }

    async fn open_shell(&mut self, _pty: &PtyRequest) -> Result<FakeShell> {
        if self.script.fail_open_shell {
            return Err(Error::CommandFailed("failed to allocate PTY".to_string()));
        }
        Ok(FakeShell {
            pending: self.script.banner.iter().cloned().collect(),
            behaviour: self.script.shell.clone(),
            prompt: self.script.prompt.clone(),
            record: Arc::clone(&self.record),
            last_send: None,
            last_emit: None,
            sends: 0,
        })
    }

    async fn close(self) -> Result<()> {
        self.record.closes.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_close {
            return Err(Error::ConnectionFailed("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

pub struct FakeShell {
    pending: VecDeque<Vec<u8>>,
    behaviour: ShellBehaviour,
    prompt: Option<String>,
    record: Arc<Record>,
    last_send: Option<Instant>,
    last_emit: Option<Instant>,
    sends: usize,
}

#[async_trait]
impl ShellChannel for FakeShell {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let line = String::from_utf8_lossy(data).into_owned();
        let now = Instant::now();
        self.record.sent.lock().push((now, line.clone()));
        self.last_send = Some(now);
        self.last_emit = None;
        self.sends += 1;

        if matches!(
            self.behaviour,
            ShellBehaviour::Echo | ShellBehaviour::CloseAfterFirst
        ) {
            for input in line.lines() {
                self.pending.push_back(format!("{input}\r\n").into_bytes());
                if let Some(arg) = input.strip_prefix("echo ") {
                    self.pending
                        .push_back(format!("{}\r\n", arg.replace("''", "")).into_bytes());
                }
                if let Some(prompt) = &self.prompt {
                    self.pending.push_back(prompt.clone().into_bytes());
                }
            }
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Result<ShellRead> {
        if let Some(chunk) = self.pending.pop_front() {
            return Ok(ShellRead::Data(chunk));
        }

        match self.behaviour {
            ShellBehaviour::Chatty { every, for_ } => {
                let now = Instant::now();
                let Some(sent) = self.last_send else {
                    return Ok(ShellRead::Empty);
                };
                let due = self.last_emit.is_none_or(|at| now - at >= every);
                if now - sent < for_ && due {
                    self.last_emit = Some(now);
                    return Ok(ShellRead::Data(b"tick\r\n".to_vec()));
                }
                Ok(ShellRead::Empty)
            }
            ShellBehaviour::CloseAfterFirst if self.sends >= 1 => Ok(ShellRead::Closed),
            ShellBehaviour::FailRead if self.sends >= 1 => {
                Err(Error::CommandFailed("read failed".to_string()))
            }
            _ => Ok(ShellRead::Empty),
        }
    }
}
