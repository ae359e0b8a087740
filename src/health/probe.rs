// ABOUTME: Health probes: container state through the executor, HTTP through hyper.
// ABOUTME: Every attempt is bounded by its own timeout so a hung endpoint cannot stall a round.

use super::status::{ContainerStatus, HealthStatus};
use crate::executor::{ComposeCommands, ExecError, RemoteExecutor};
use crate::phase::Service;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("inspect failed: {0}")]
    Inspect(String),
}

/// Result of a single HTTP probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    /// The endpoint returned 2xx.
    Healthy,
    /// The endpoint answered with a non-2xx status.
    Unhealthy(u16),
    /// No answer: connect error, protocol error or timeout.
    Failed(String),
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn container_status(&self, service: &Service) -> Result<ContainerStatus, ProbeError>;

    async fn http_health(&self, service: &Service, path: &str) -> HttpOutcome;
}

/// One probe round for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub container: ContainerStatus,
    pub health: HealthStatus,
    pub detail: Option<String>,
}

impl Observation {
    pub fn is_healthy(&self) -> bool {
        self.container == ContainerStatus::Running && self.health.counts_as_healthy()
    }
}

/// Check container state, then the HTTP endpoint if one is declared.
pub async fn observe(probe: &dyn HealthProbe, service: &Service) -> Observation {
    let container = match probe.container_status(service).await {
        Ok(status) => status,
        Err(e) => {
            return Observation {
                container: ContainerStatus::Unknown,
                health: HealthStatus::Unhealthy,
                detail: Some(e.to_string()),
            };
        }
    };

    if container != ContainerStatus::Running {
        return Observation {
            container,
            health: HealthStatus::Unhealthy,
            detail: Some("container not running".to_string()),
        };
    }

    let Some(path) = service.health_path.as_deref() else {
        return Observation {
            container,
            health: HealthStatus::NoCheck,
            detail: None,
        };
    };

    match probe.http_health(service, path).await {
        HttpOutcome::Healthy => Observation {
            container,
            health: HealthStatus::Healthy,
            detail: None,
        },
        HttpOutcome::Unhealthy(code) => Observation {
            container,
            health: HealthStatus::Unhealthy,
            detail: Some(format!("GET {} returned {}", path, code)),
        },
        HttpOutcome::Failed(reason) => Observation {
            container,
            health: HealthStatus::Unhealthy,
            detail: Some(format!("GET {} failed: {}", path, reason)),
        },
    }
}

/// Probes the real host: `docker inspect` over the executor and HTTP on `address:port`.
#[derive(Debug, Clone)]
pub struct RuntimeProbe {
    executor: RemoteExecutor,
    commands: ComposeCommands,
    address: String,
    probe_timeout: Duration,
}

impl RuntimeProbe {
    pub fn new(
        executor: RemoteExecutor,
        commands: ComposeCommands,
        address: impl Into<String>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            commands,
            address: address.into(),
            probe_timeout,
        }
    }
}

#[async_trait]
impl HealthProbe for RuntimeProbe {
    async fn container_status(&self, service: &Service) -> Result<ContainerStatus, ProbeError> {
        let output = self
            .executor
            .execute(&self.commands.container_state(&service.name), self.probe_timeout)
            .await?;

        if !output.success() {
            return Err(ProbeError::Inspect(output.stderr.trim().to_string()));
        }

        Ok(parse_container_state(&output.stdout))
    }

    async fn http_health(&self, service: &Service, path: &str) -> HttpOutcome {
        let address = format!("{}:{}", self.address, service.port);
        http_probe(&address, path, self.probe_timeout).await
    }
}

/// `running` is the only state that counts; created, restarting, exited and the rest are stopped.
pub fn parse_container_state(stdout: &str) -> ContainerStatus {
    match stdout.trim() {
        "running" => ContainerStatus::Running,
        "" => ContainerStatus::Unknown,
        _ => ContainerStatus::Stopped,
    }
}

/// GET `path` on `address` over HTTP/1.1.
pub async fn http_probe(address: &str, path: &str, timeout: Duration) -> HttpOutcome {
    let uri = format!("http://{address}{path}");

    let attempt = async {
        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|e| format!("connect: {e}"))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("handshake: {e}"))?;

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = hyper::Request::builder()
            .method(hyper::Method::GET)
            .uri(&uri)
            .header(hyper::header::HOST, address)
            .header(hyper::header::USER_AGENT, concat!("pirollout/", env!("CARGO_PKG_VERSION")))
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| format!("request: {e}"))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| format!("request: {e}"))?;
        Ok::<u16, String>(resp.status().as_u16())
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(code)) if (200..300).contains(&code) => HttpOutcome::Healthy,
        Ok(Ok(code)) => {
            debug!(status = code, %uri, "health probe non-2xx");
            HttpOutcome::Unhealthy(code)
        }
        Ok(Err(reason)) => {
            debug!(error = %reason, %uri, "health probe failed");
            HttpOutcome::Failed(reason)
        }
        Err(_) => {
            debug!(%uri, "health probe timed out");
            HttpOutcome::Failed(format!("timed out after {timeout:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let reply = format!("{status_line}\r\ncontent-length: 0\r\n\r\n");
            let _ = socket.write_all(reply.as_bytes()).await;
        });
        addr
    }

    #[test]
    fn container_state_parsing() {
        assert_eq!(parse_container_state("running\n"), ContainerStatus::Running);
        assert_eq!(parse_container_state("exited"), ContainerStatus::Stopped);
        assert_eq!(parse_container_state("restarting"), ContainerStatus::Stopped);
        assert_eq!(parse_container_state("  "), ContainerStatus::Unknown);
    }

    #[tokio::test]
    async fn http_probe_2xx_is_healthy() {
        let addr = serve_once("HTTP/1.1 200 OK").await;
        assert_eq!(
            http_probe(&addr, "/health", Duration::from_secs(2)).await,
            HttpOutcome::Healthy
        );
    }

    #[tokio::test]
    async fn http_probe_5xx_is_unhealthy() {
        let addr = serve_once("HTTP/1.1 503 Service Unavailable").await;
        assert_eq!(
            http_probe(&addr, "/health", Duration::from_secs(2)).await,
            HttpOutcome::Unhealthy(503)
        );
    }

    #[tokio::test]
    async fn http_probe_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let outcome = http_probe(&addr, "/health", Duration::from_millis(200)).await;
        assert!(matches!(outcome, HttpOutcome::Failed(reason) if reason.contains("timed out")));
    }
}
