// ABOUTME: Target host configuration for the rollout.
// ABOUTME: Parses "local", "host", "user@host", "host:port" and "user@host:port", or a detailed table.

use crate::ssh::SessionConfig;
use serde::Deserialize;
use serde::de::{self, Deserializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// SSH connection details for a remote target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    /// Private key to use instead of the SSH agent.
    #[serde(default)]
    pub key: Option<PathBuf>,
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
    #[serde(default = "default_trust_first_connection")]
    pub trust_first_connection: bool,
}

fn default_port() -> u16 {
    22
}

fn default_trust_first_connection() -> bool {
    true
}

impl ServerConfig {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("host address cannot be empty".to_string());
        }

        // [user@]host[:port]
        let (user_part, rest) = match s.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user), rest),
            Some(_) => return Err("user before '@' cannot be empty".to_string()),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port_str))?;
                (host, port)
            }
            None => (rest, default_port()),
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(ServerConfig {
            host: host.to_string(),
            port,
            user: user_part.map(str::to_string),
            key: None,
            known_hosts: None,
            trust_first_connection: default_trust_first_connection(),
        })
    }

    /// Resolve the login user, falling back to `$USER` and then `pi`.
    pub fn login_user(&self) -> String {
        self.user
            .clone()
            .unwrap_or_else(|| std::env::var("USER").unwrap_or_else(|_| "pi".to_string()))
    }

    /// Build the SSH session configuration for this server.
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(&self.host, self.login_user())
            .port(self.port)
            .trust_on_first_use(self.trust_first_connection);
        if let Some(ref key) = self.key {
            config = config.key_path(key.clone());
        }
        if let Some(ref known_hosts) = self.known_hosts {
            config = config.known_hosts_path(known_hosts.clone());
        }
        config
    }
}

/// Where the stack is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Host {
    /// Run commands through the local shell.
    #[default]
    Local,
    Remote(ServerConfig),
}

impl Host {
    /// Address health probes connect to.
    pub fn probe_address(&self) -> &str {
        match self {
            Host::Local => "127.0.0.1",
            Host::Remote(server) => &server.host,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Host::Local)
    }
}

impl FromStr for Host {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "local" | "localhost" => Ok(Host::Local),
            other => ServerConfig::parse(other).map(Host::Remote),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Local => write!(f, "local"),
            Host::Remote(server) => match &server.user {
                Some(user) => write!(f, "{}@{}:{}", user, server.host, server.port),
                None => write!(f, "{}:{}", server.host, server.port),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HostEntry {
    Simple(String),
    Detailed(ServerConfig),
}

impl<'de> Deserialize<'de> for Host {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match HostEntry::deserialize(deserializer)? {
            HostEntry::Simple(s) => s.parse().map_err(de::Error::custom),
            HostEntry::Detailed(server) => Ok(Host::Remote(server)),
        }
    }
}
