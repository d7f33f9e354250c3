// ABOUTME: Entry point for the sshrun CLI application.
// ABOUTME: Parses arguments, resolves settings, and dispatches to command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use sshrun::commands::{download_file, run_command, run_session};
use sshrun::config::{self, Config, Overrides, Settings};
use sshrun::diagnostics::Diagnostics;
use sshrun::error::Result;
use sshrun::output::Output;
use sshrun::ssh::RusshConnector;
use std::env;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(cli.output_mode());
    output.start_timer();

    match run(cli, &output).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<ExitCode> {
    let cwd = env::current_dir()?;
    let overrides = cli.overrides();
    let config_path = cli.config;
    let load = || load_settings(config_path.as_deref(), &overrides, &cwd);

    let connector = RusshConnector;
    let mut diag = Diagnostics::default();

    let result: Result<ExitCode> = match cli.command {
        Commands::Init { force } => {
            config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Fetch {
            remote_path,
            local_path,
        } => {
            let settings = load()?;
            let (remote, local) = settings.defaults.fetch_paths(remote_path, local_path);
            download_file(
                &connector,
                &settings.session,
                &remote,
                &local,
                output,
                &mut diag,
            )
            .await
            .map(|_| ExitCode::SUCCESS)
            .map_err(Into::into)
        }
        Commands::Exec { command } => {
            let settings = load()?;
            let command = settings.defaults.exec_command(&command);
            run_command(&connector, &settings.session, &command, output, &mut diag)
                .await
                .map(|out| {
                    if out.success() {
                        ExitCode::SUCCESS
                    } else {
                        remote_exit_code(out.exit_code)
                    }
                })
                .map_err(Into::into)
        }
        Commands::Shell { commands } => {
            let settings = load()?;
            let commands = settings.defaults.shell_commands(commands);
            run_session(
                &connector,
                &settings.session,
                &settings.shell,
                &commands,
                output,
                &mut diag,
            )
            .await
            .map(|transcript| {
                tracing::debug!(commands = transcript.entries.len(), "session finished");
                ExitCode::SUCCESS
            })
            .map_err(Into::into)
        }
    };

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    result
}

/// Read the config file (explicit, discovered, or none) and apply CLI overrides.
fn load_settings(config_path: Option<&Path>, overrides: &Overrides, cwd: &Path) -> Result<Settings> {
    let config = match config_path {
        Some(path) => Some(Config::load(path)?),
        None => Config::find(cwd).map(|path| Config::load(&path)).transpose()?,
    };
    Settings::resolve(config, overrides)
}

/// Mirror the remote exit status, clamped to what a process can return.
fn remote_exit_code(code: u32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}
