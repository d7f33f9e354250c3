// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines global connection options and the fetch/exec/shell/init subcommands.

use clap::{Parser, Subcommand};
use sshrun::config::{Overrides, Target};
use sshrun::output::OutputMode;
use sshrun::ssh::HostKeyPolicy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sshrun")]
#[command(about = "Fetch files, run commands and drive interactive shells over SSH")]
#[command(version)]
pub struct Cli {
    /// Config file (default: sshrun.yml in the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Remote target as [user@]host[:port]
    #[arg(short, long, global = true)]
    pub target: Option<Target>,

    /// Environment variable holding the SSH password
    #[arg(long, global = true, value_name = "VAR")]
    pub password_env: Option<String>,

    /// Private key file to authenticate with
    #[arg(long, global = true)]
    pub key: Option<PathBuf>,

    /// How to treat unknown server host keys
    #[arg(long, global = true, value_enum)]
    pub host_key_policy: Option<HostKeyPolicy>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print remote output and the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            target: self.target.clone(),
            password_env: self.password_env.clone(),
            key_path: self.key.clone(),
            host_key_policy: self.host_key_policy,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download one remote file over SFTP
    Fetch {
        /// Remote file path
        #[arg(requires = "local_path")]
        remote_path: Option<String>,

        /// Local destination path
        local_path: Option<PathBuf>,
    },

    /// Run one command remotely and print its output
    Exec {
        /// Command words, joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Send commands to an interactive shell, one per argument
    Shell {
        commands: Vec<String>,
    },

    /// Write a template sshrun.yml in the current directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
