// ABOUTME: Executor error types with SNAFU context selectors.
// ABOUTME: Separates transport failures from the connectivity error raised after the retry.

use snafu::Snafu;
use std::time::Duration;

/// Failure of a single attempt to run a command.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Ssh(#[from] crate::ssh::Error),

    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("host unreachable: {0}")]
    Unreachable(String),
}

impl TransportError {
    /// Connection refused, connect timeout, reset and similar failures worth one retry.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Ssh(e) => e.is_transient(),
            TransportError::Unreachable(_) => true,
            TransportError::Spawn(_) | TransportError::Timeout(_) => false,
        }
    }

    /// The command started but did not finish in time.
    pub fn timed_out(&self) -> Option<Duration> {
        match self {
            TransportError::Timeout(after)
            | TransportError::Ssh(crate::ssh::Error::CommandTimeout(after)) => Some(*after),
            _ => None,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExecError {
    /// The host stayed unreachable through the retry.
    #[snafu(display("{host} unreachable after {attempts} attempts: {source}"))]
    Connectivity {
        host: String,
        attempts: u32,
        source: TransportError,
    },

    #[snafu(display("command on {host} timed out after {after:?}"))]
    Timeout { host: String, after: Duration },

    #[snafu(display("command on {host} failed: {source}"))]
    Transport {
        host: String,
        source: TransportError,
    },

    #[snafu(display("command cancelled"))]
    Cancelled,
}

impl ExecError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ExecError::Connectivity { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_is_transient() {
        assert!(TransportError::Unreachable("refused".into()).is_transient());
    }

    #[test]
    fn timeouts_are_not_retried() {
        let err = TransportError::Timeout(Duration::from_secs(3));
        assert!(!err.is_transient());
        assert_eq!(err.timed_out(), Some(Duration::from_secs(3)));

        let ssh = TransportError::Ssh(crate::ssh::Error::CommandTimeout(Duration::from_secs(7)));
        assert_eq!(ssh.timed_out(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn connectivity_display_names_host_and_attempts() {
        let err = ExecError::Connectivity {
            host: "pi@lucid:22".into(),
            attempts: 2,
            source: TransportError::Unreachable("connection refused".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("pi@lucid:22"));
        assert!(msg.contains("2 attempts"));
        assert!(err.is_connectivity());
    }
}
