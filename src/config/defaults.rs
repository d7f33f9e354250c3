// ABOUTME: Built-in fallbacks used when a subcommand gets no arguments.
// ABOUTME: Fetch paths, the exec command, and the shell bootstrap queue.

use super::deserialize::deserialize_commands;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_FETCH_REMOTE: &str = "/tmp/sim_screenshot3.png";
pub const DEFAULT_FETCH_LOCAL: &str = "sim_screenshot3.png";
pub const DEFAULT_EXEC_COMMAND: &str = "pwd && ls -la";

/// Loads nvm, then starts the Expo dev server and checks that Metro answers.
pub const DEFAULT_SHELL_COMMANDS: [&str; 4] = [
    r#"export NVM_DIR="$HOME/.nvm" && [ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh""#,
    "cd ~/love-ledger && npx expo start --ios --no-dev --minify 2>&1 &",
    r#"sleep 10 && echo "Metro started, checking status...""#,
    r#"curl -s http://localhost:8081/status || echo "Metro not responding yet""#,
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(default = "default_fetch_remote")]
    pub fetch_remote: String,

    #[serde(default = "default_fetch_local")]
    pub fetch_local: PathBuf,

    #[serde(default = "default_exec_command")]
    pub exec_command: String,

    #[serde(
        default = "default_shell_commands",
        deserialize_with = "deserialize_commands"
    )]
    pub shell_commands: NonEmpty<String>,
}

fn default_fetch_remote() -> String {
    DEFAULT_FETCH_REMOTE.to_string()
}

fn default_fetch_local() -> PathBuf {
    PathBuf::from(DEFAULT_FETCH_LOCAL)
}

fn default_exec_command() -> String {
    DEFAULT_EXEC_COMMAND.to_string()
}

fn default_shell_commands() -> NonEmpty<String> {
    let [head, tail @ ..] = DEFAULT_SHELL_COMMANDS;
    NonEmpty::from((
        head.to_string(),
        tail.iter().map(|c| c.to_string()).collect(),
    ))
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            fetch_remote: default_fetch_remote(),
            fetch_local: default_fetch_local(),
            exec_command: default_exec_command(),
            shell_commands: default_shell_commands(),
        }
    }
}

impl Defaults {
    /// Paths for `fetch`: both given, or both taken from the defaults.
    pub fn fetch_paths(&self, remote: Option<String>, local: Option<PathBuf>) -> (String, PathBuf) {
        match (remote, local) {
            (Some(remote), Some(local)) => (remote, local),
            _ => (self.fetch_remote.clone(), self.fetch_local.clone()),
        }
    }

    /// Command for `exec`: arguments joined with spaces, or the default.
    pub fn exec_command(&self, args: &[String]) -> String {
        if args.is_empty() {
            self.exec_command.clone()
        } else {
            args.join(" ")
        }
    }

    /// Queue for `shell`: one command per argument, or the default sequence.
    pub fn shell_commands(&self, args: Vec<String>) -> NonEmpty<String> {
        NonEmpty::from_vec(args).unwrap_or_else(|| self.shell_commands.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_fall_back_to_builtins() {
        let defaults = Defaults::default();

        let (remote, local) = defaults.fetch_paths(None, None);
        assert_eq!(remote, "/tmp/sim_screenshot3.png");
        assert_eq!(local, PathBuf::from("sim_screenshot3.png"));

        assert_eq!(defaults.exec_command(&[]), "pwd && ls -la");

        let queue: Vec<String> = defaults.shell_commands(vec![]).into_iter().collect();
        assert_eq!(queue, DEFAULT_SHELL_COMMANDS);
    }

    #[test]
    fn exec_arguments_are_joined_into_one_command() {
        let defaults = Defaults::default();
        let args = vec!["ls".to_string(), "-la".to_string(), "/tmp".to_string()];
        assert_eq!(defaults.exec_command(&args), "ls -la /tmp");
    }

    #[test]
    fn shell_arguments_replace_the_whole_queue() {
        let defaults = Defaults::default();
        let queue = defaults.shell_commands(vec!["uptime".to_string(), "whoami".to_string()]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.head, "uptime");
        assert_eq!(queue.last(), "whoami");
    }

    #[test]
    fn partial_fetch_arguments_use_defaults() {
        let defaults = Defaults::default();
        let (remote, _) = defaults.fetch_paths(Some("/etc/hosts".to_string()), None);
        assert_eq!(remote, DEFAULT_FETCH_REMOTE);
    }
}
