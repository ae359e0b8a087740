// ABOUTME: Runs shell commands on the rollout target with a single connectivity retry.
// ABOUTME: Transports (SSH, local shell) are pluggable; non-zero exits come back as data.

mod command;
mod error;
mod local;
mod ssh;

pub use command::{ComposeCommands, shell_quote};
pub use error::{ExecError, TransportError};
use error::{CancelledSnafu, ConnectivitySnafu, TimeoutSnafu, TransportSnafu};
pub use local::LocalTransport;
pub use ssh::SshTransport;

use crate::config::{Defaults, Host};
pub use crate::ssh::CommandOutput;
use async_trait::async_trait;
use snafu::ResultExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempts per command: the first try plus one retry on a transient failure.
pub const MAX_ATTEMPTS: u32 = 2;

/// One way of reaching the target host.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run `command` once, bounded by `timeout`.
    async fn run(&self, command: &str, timeout: Duration)
    -> Result<CommandOutput, TransportError>;

    /// Drop any open connection. The next `run` reconnects.
    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Label used in logs and errors.
    fn target(&self) -> String;
}

/// Command executor shared by the controller, health probes and the isolation validator.
#[derive(Clone)]
pub struct RemoteExecutor {
    transport: Arc<dyn Transport>,
    backoff: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RemoteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteExecutor")
            .field("target", &self.transport.target())
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl RemoteExecutor {
    pub fn new(transport: Arc<dyn Transport>, backoff: Duration, cancel: CancellationToken) -> Self {
        Self {
            transport,
            backoff,
            cancel,
        }
    }

    /// Executor for the configured host: the local shell or an SSH session.
    pub fn for_host(host: &Host, defaults: &Defaults, cancel: CancellationToken) -> Self {
        let transport: Arc<dyn Transport> = match host {
            Host::Local => Arc::new(LocalTransport::new()),
            Host::Remote(server) => Arc::new(SshTransport::new(
                server.session_config().idle_timeout(defaults.idle_timeout),
            )),
        };
        Self::new(transport, defaults.retry_backoff, cancel)
    }

    pub fn target(&self) -> String {
        self.transport.target()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Same transport, with a token of its own that the run's cancellation never reaches.
    pub fn detached(&self) -> Self {
        Self::new(Arc::clone(&self.transport), self.backoff, CancellationToken::new())
    }

    /// Execute `command` on the target.
    ///
    /// A transient failure is retried once after the backoff; a second one
    /// is a [`ExecError::Connectivity`]. A non-zero exit is returned as data.
    pub async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandOutput, ExecError> {
        let mut attempt = 1;
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return CancelledSnafu.fail(),
                result = self.transport.run(command, timeout) => result,
            };

            match result {
                Ok(output) => {
                    tracing::trace!(exit_code = output.exit_code, command, "command finished");
                    return Ok(output);
                }
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        target_host = %self.transport.target(),
                        attempt,
                        error = %e,
                        "transient failure, retrying in {:?}",
                        self.backoff
                    );
                    attempt += 1;
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return CancelledSnafu.fail(),
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    return Err(e).context(ConnectivitySnafu {
                        host: self.transport.target(),
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    if let Some(after) = e.timed_out() {
                        return TimeoutSnafu {
                            host: self.transport.target(),
                            after,
                        }
                        .fail();
                    }
                    return Err(e).context(TransportSnafu {
                        host: self.transport.target(),
                    });
                }
            }
        }
    }

    /// Close the underlying connection, if any.
    pub async fn close(&self) -> Result<(), ExecError> {
        self.transport.close().await.context(TransportSnafu {
            host: self.transport.target(),
        })
    }
}
