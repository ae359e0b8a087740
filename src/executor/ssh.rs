// ABOUTME: SSH transport holding one lazily opened session per phase.
// ABOUTME: A transient failure drops the session so the retry reconnects.

use super::{CommandOutput, Transport, TransportError};
use crate::ssh::{Session, SessionConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct SshTransport {
    config: SessionConfig,
    session: Mutex<Option<Arc<Session>>>,
}

impl SshTransport {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    async fn session(&self) -> Result<Arc<Session>, TransportError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref()
            && !session.is_closed()
        {
            return Ok(Arc::clone(session));
        }

        tracing::debug!(host = %self.config.host, port = self.config.port, "opening SSH session");
        let session = Arc::new(Session::connect(self.config.clone()).await?);
        *guard = Some(Arc::clone(&session));
        Ok(session)
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, TransportError> {
        let session = self.session().await?;
        match session.exec(command, timeout).await {
            Ok(output) => Ok(output),
            Err(e) => {
                if e.is_transient() {
                    self.session.lock().await.take();
                }
                Err(e.into())
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        if session.is_closed() {
            return Ok(());
        }
        tracing::debug!(host = %self.config.host, "closing SSH session");
        session.disconnect().await?;
        Ok(())
    }

    fn target(&self) -> String {
        format!("{}@{}:{}", self.config.user, self.config.host, self.config.port)
    }
}
