// ABOUTME: SSH-specific error types.
// ABOUTME: Separates transient connectivity failures from authentication and host key failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection refused by {host}:{port}")]
    ConnectionRefused { host: String, port: u16 },

    #[error("connection to {host}:{port} timed out after {after:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        after: std::time::Duration,
    },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: no valid credentials")]
    AuthenticationFailed,

    #[error("host key for {0} was rejected")]
    HostKeyRejected(String),

    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure may clear up on its own (refused, timed out, reset).
    ///
    /// Credentials and host keys do not fix themselves, so those are never transient.
    pub fn is_transient(&self) -> bool {
        use std::io::ErrorKind;

        match self {
            Error::ConnectionRefused { .. }
            | Error::ConnectTimeout { .. }
            | Error::Connection(_)
            | Error::ChannelClosed => true,
            Error::Io(e) => matches!(
                e.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::TimedOut
                    | ErrorKind::BrokenPipe
            ),
            Error::Protocol(russh::Error::Disconnect)
            | Error::Protocol(russh::Error::ConnectionTimeout)
            | Error::Protocol(russh::Error::InactivityTimeout) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
