// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates sshrun.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, DEFAULT_EXEC_COMMAND, DEFAULT_FETCH_LOCAL, DEFAULT_FETCH_REMOTE};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, template_yaml())?;
    tracing::debug!(path = %config_path.display(), "wrote config template");

    Ok(())
}

fn template_yaml() -> String {
    format!(
        r#"# Remote host as user@host:port, or a map with host/port/user.
server: deploy@server.example.com:22

# Password is read from the environment; never commit it here.
password:
  env: SSHRUN_PASSWORD
# key_path: ~/.ssh/id_ed25519

# Host key verification: strict (default), trust-on-first-use, or accept-any.
# accept-any disables protection against interception.
host_key_policy: strict

connect_timeout: 30s
command_timeout: 5m

shell:
  settle_delay: 2s
  inactivity_window: 30s
  poll_interval: 100ms
  # Stop collecting as soon as an echoed marker appears.
  sentinel: false

defaults:
  fetch_remote: {remote}
  fetch_local: {local}
  exec_command: "{exec}"
"#,
        remote = DEFAULT_FETCH_REMOTE,
        local = DEFAULT_FETCH_LOCAL,
        exec = DEFAULT_EXEC_COMMAND,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn template_parses_back_into_config() {
        let config = Config::from_yaml(&template_yaml()).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.host, "server.example.com");
        assert_eq!(server.user.as_deref(), Some("deploy"));
        assert_eq!(config.defaults.exec_command, DEFAULT_EXEC_COMMAND);
        assert!(!config.shell.sentinel);
    }
}
