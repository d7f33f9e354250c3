// ABOUTME: Remote target address for SSH connections.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@[::1]:port".

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Target {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
}

impl Target {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("target address cannot be empty".to_string());
        }

        // Parse format: [user@]host[:port], with IPv6 hosts as [addr]:port or a bare addr
        let (user_part, rest) = match s.rsplit_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        if user_part.is_some_and(str::is_empty) {
            return Err("username cannot be empty".to_string());
        }

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| "missing ']' after IPv6 address".to_string())?;
            match after {
                "" => (host, None),
                _ => match after.strip_prefix(':') {
                    Some(port_str) => (host, Some(parse_port(port_str)?)),
                    None => return Err(format!("unexpected text after ']': {after}")),
                },
            }
        } else if rest.matches(':').count() > 1 {
            (rest, None)
        } else {
            match rest.rsplit_once(':') {
                Some((host, port_str)) => (host, Some(parse_port(port_str)?)),
                None => (rest, None),
            }
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(Target {
            host: host.to_string(),
            port,
            user: user_part.map(str::to_string),
        })
    }
}

fn parse_port(s: &str) -> Result<u16, String> {
    s.parse::<u16>().map_err(|_| format!("invalid port: {}", s))
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            write!(f, "{}", self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}
