// ABOUTME: The three remote procedures behind the sshrun subcommands.
// ABOUTME: Re-exports fetch, exec, and interactive shell handlers.

mod exec;
mod fetch;
mod shell;

pub use exec::run_command;
pub use fetch::download_file;
pub use shell::{SessionAborted, Transcript, TranscriptEntry, drive_shell, run_session};
