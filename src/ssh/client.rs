// ABOUTME: SSH session to the Pi using russh.
// ABOUTME: Verifies the host key, authenticates, and runs one command per channel with a timeout.

use super::error::{Error, Result};
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;

/// Identity files tried, in order, when neither a key nor an agent is available.
const DEFAULT_IDENTITIES: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

/// How to reach and log into the host.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key file. Without one the agent is asked first, then `~/.ssh/id_*`.
    pub key_path: Option<PathBuf>,
    /// Accept and record host keys missing from known_hosts.
    pub trust_on_first_use: bool,
    /// Defaults to `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            key_path: None,
            trust_on_first_use: false,
            known_hosts_path: None,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn trust_on_first_use(mut self, trust: bool) -> Self {
        self.trust_on_first_use = trust;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Captured result of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// known_hosts lookup for one host.
#[derive(Debug, Clone)]
struct HostKeys {
    host: String,
    port: u16,
    file: Option<PathBuf>,
    trust_new: bool,
}

impl HostKeys {
    fn verify(&self, key: &ssh_key::PublicKey) -> bool {
        let known = match &self.file {
            Some(file) => check_known_hosts_path(&self.host, self.port, key, file),
            None => check_known_hosts(&self.host, self.port, key),
        };

        match known {
            Ok(true) => true,
            Ok(false) if self.trust_new => {
                tracing::warn!(host = %self.host, port = self.port, "recording unknown host key");
                self.remember(key);
                true
            }
            Ok(false) => false,
            Err(russh::keys::Error::KeyChanged { line }) => {
                tracing::error!(host = %self.host, line, "host key does not match known_hosts");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "known_hosts unreadable");
                self.trust_new
            }
        }
    }

    fn remember(&self, key: &ssh_key::PublicKey) {
        let saved = match &self.file {
            Some(file) => learn_known_hosts_path(&self.host, self.port, key, file),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = saved {
            tracing::warn!(error = %e, "could not write known_hosts");
        }
    }
}

pub(crate) struct SshHandler {
    keys: HostKeys,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(self.keys.verify(server_public_key))
    }
}

enum Credentials {
    Agent(AgentClient<UnixStream>),
    Key(Arc<ssh_key::PrivateKey>),
}

impl Credentials {
    async fn discover(config: &SessionConfig) -> Result<Self> {
        if let Some(path) = &config.key_path {
            return load_key(path).map(Self::Key);
        }

        if let Ok(agent) = AgentClient::connect_env().await {
            return Ok(Self::Agent(agent));
        }

        let ssh_dir = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".ssh"))
            .ok_or_else(|| Error::AgentUnavailable("no agent and HOME is not set".to_string()))?;
        DEFAULT_IDENTITIES
            .iter()
            .find_map(|name| load_key(&ssh_dir.join(name)).ok())
            .map(Self::Key)
            .ok_or_else(|| {
                Error::AgentUnavailable(format!("no agent and no identity in {}", ssh_dir.display()))
            })
    }

    /// `Ok(false)` when the server turned down every key offered.
    async fn authenticate(self, handle: &mut Handle<SshHandler>, user: &str) -> Result<bool> {
        match self {
            Self::Key(key) => {
                let hash = handle.best_supported_rsa_hash().await?.flatten();
                let auth = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash))
                    .await?;
                Ok(auth.success())
            }
            Self::Agent(mut agent) => {
                let identities = agent
                    .request_identities()
                    .await
                    .map_err(|e| Error::AgentUnavailable(e.to_string()))?;
                if identities.is_empty() {
                    return Err(Error::AgentUnavailable("agent holds no keys".to_string()));
                }
                for identity in identities {
                    let accepted = handle
                        .authenticate_publickey_with(user, identity, None, &mut agent)
                        .await
                        .is_ok_and(|auth| auth.success());
                    if accepted {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

fn load_key(path: &Path) -> Result<Arc<ssh_key::PrivateKey>> {
    load_secret_key(path, None)
        .map(Arc::new)
        .map_err(|e| Error::KeyLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Connected and authenticated session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.config.address())
            .field("user", &self.config.user)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let credentials = Credentials::discover(&config).await?;

        let handler = SshHandler {
            keys: HostKeys {
                host: config.host.clone(),
                port: config.port,
                file: config.known_hosts_path.clone(),
                trust_new: config.trust_on_first_use,
            },
        };
        let russh_config = Arc::new(Config {
            inactivity_timeout: Some(config.idle_timeout),
            ..Default::default()
        });

        let connecting = client::connect(russh_config, (config.host.as_str(), config.port), handler);
        let mut handle = tokio::time::timeout(config.connect_timeout, connecting)
            .await
            .map_err(|_| Error::ConnectTimeout {
                host: config.host.clone(),
                port: config.port,
                after: config.connect_timeout,
            })?
            .map_err(|e| connect_error(&config, e))?;

        if !credentials.authenticate(&mut handle, &config.user).await? {
            return Err(Error::AuthenticationFailed);
        }

        tracing::debug!(address = %config.address(), user = %config.user, "SSH session established");
        Ok(Self { config, handle })
    }

    /// Run `command` on a fresh channel. A non-zero exit status is data, not an error.
    pub async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        tokio::time::timeout(timeout, self.run_on_channel(command))
            .await
            .map_err(|_| Error::CommandTimeout(timeout))?
    }

    async fn run_on_channel(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Connection(format!("opening channel: {}", e)))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(e.to_string()))?;

        let mut collected = Collected::default();
        while let Some(msg) = channel.wait().await {
            if collected.push(msg) {
                break;
            }
        }
        collected.finish()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

fn connect_error(config: &SessionConfig, err: russh::Error) -> Error {
    match err {
        russh::Error::UnknownKey => Error::HostKeyRejected(config.address()),
        russh::Error::IO(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            Error::ConnectionRefused {
                host: config.host.clone(),
                port: config.port,
            }
        }
        other => Error::Connection(other.to_string()),
    }
}

/// Channel output gathered until both EOF and the exit status have arrived.
#[derive(Default)]
struct Collected {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_status: Option<u32>,
    eof: bool,
}

impl Collected {
    /// Returns true once nothing more is expected.
    fn push(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext: 1 } => self.stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => self.exit_status = Some(exit_status),
            ChannelMsg::Eof => self.eof = true,
            ChannelMsg::Close => return true,
            _ => {}
        }
        self.eof && self.exit_status.is_some()
    }

    fn finish(self) -> Result<CommandOutput> {
        let status = self.exit_status.ok_or(Error::ChannelClosed)?;
        Ok(CommandOutput {
            exit_code: i32::try_from(status).unwrap_or(i32::MAX),
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        })
    }
}
