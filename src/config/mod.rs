// ABOUTME: Configuration types and parsing for sshrun.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and CLI overrides.

mod defaults;
mod deserialize;
mod env_value;
mod init;
mod shell;
mod target;

pub use defaults::{
    DEFAULT_EXEC_COMMAND, DEFAULT_FETCH_LOCAL, DEFAULT_FETCH_REMOTE, DEFAULT_SHELL_COMMANDS,
    Defaults,
};
pub use env_value::{EnvValue, secret_from_env};
pub use init::init_config;
pub use shell::ShellConfig;
pub use target::Target;

use crate::error::{Error, Result};
use crate::ssh::{Credential, HostKeyPolicy, SessionConfig};
use deserialize::deserialize_target_option;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "sshrun.yml";
pub const CONFIG_FILENAME_ALT: &str = "sshrun.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".sshrun/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `user@host:port` string or a `{ host, port, user }` map.
    #[serde(default, deserialize_with = "deserialize_target_option")]
    pub server: Option<Target>,

    #[serde(default)]
    pub password: Option<EnvValue>,

    #[serde(default)]
    pub key_path: Option<PathBuf>,

    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,

    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    #[serde(default)]
    pub shell: ShellConfig,

    #[serde(default)]
    pub defaults: Defaults,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: None,
            password: None,
            key_path: None,
            host_key_policy: HostKeyPolicy::default(),
            known_hosts_path: None,
            connect_timeout: default_connect_timeout(),
            command_timeout: default_command_timeout(),
            shell: ShellConfig::default(),
            defaults: Defaults::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// First config file present in `dir`, if any.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ]
        .into_iter()
        .find(|path| path.exists())
    }
}

/// Command-line settings that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub target: Option<Target>,
    /// Name of an environment variable holding the password.
    pub password_env: Option<String>,
    pub key_path: Option<PathBuf>,
    pub host_key_policy: Option<HostKeyPolicy>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub session: SessionConfig,
    pub shell: ShellConfig,
    pub defaults: Defaults,
}

impl Settings {
    /// Merge the config file (if any) with command-line overrides.
    ///
    /// Credentials resolve in order: `--password-env`, `--key`, the file's
    /// `password`, the file's `key_path`, then the SSH agent.
    pub fn resolve(config: Option<Config>, overrides: &Overrides) -> Result<Self> {
        let config = config.unwrap_or_default();

        let file_target = config.server.clone();
        let cli_target = overrides.target.clone();
        let host = cli_target
            .as_ref()
            .map(|t| t.host.clone())
            .or_else(|| file_target.as_ref().map(|t| t.host.clone()))
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "no server configured; set `server` in {} or pass --target",
                    CONFIG_FILENAME
                ))
            })?;
        let port = cli_target
            .as_ref()
            .and_then(|t| t.port)
            .or_else(|| file_target.as_ref().and_then(|t| t.port))
            .unwrap_or(22);
        let user = cli_target
            .and_then(|t| t.user)
            .or_else(|| file_target.and_then(|t| t.user))
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "no user configured for {host}; use user@host in `server` or --target"
                ))
            })?;

        let credential = if let Some(var) = &overrides.password_env {
            Credential::Password(secret_from_env(var)?)
        } else if let Some(path) = &overrides.key_path {
            Credential::KeyFile(path.clone())
        } else if let Some(password) = &config.password {
            Credential::Password(password.resolve_secret()?)
        } else if let Some(path) = &config.key_path {
            Credential::KeyFile(path.clone())
        } else {
            Credential::Agent
        };

        let mut session = SessionConfig::new(host, user)
            .port(port)
            .host_key_policy(overrides.host_key_policy.unwrap_or(config.host_key_policy))
            .connect_timeout(config.connect_timeout)
            .command_timeout(config.command_timeout)
            .channel_timeout(config.shell.channel_timeout);
        session.credential = credential;
        if let Some(path) = config.known_hosts_path {
            session = session.known_hosts_path(path);
        }

        Ok(Self {
            session,
            shell: config.shell,
            defaults: config.defaults,
        })
    }
}
