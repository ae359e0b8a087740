// ABOUTME: Reads network attachments and network flags from the container runtime.
// ABOUTME: Behind a trait so the validator can be tested without a host.

use crate::executor::{ComposeCommands, ExecError, RemoteExecutor};
use crate::types::{NetworkName, ServiceName};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("{0}")]
    Failed(String),

    #[error("unexpected inspect output: {0}")]
    Parse(String),
}

#[async_trait]
pub trait NetworkInspector: Send + Sync {
    /// Names of the networks the service's container is attached to, sorted.
    async fn attached_networks(&self, service: &ServiceName) -> Result<Vec<String>, InspectError>;

    /// `Some(internal)` for an existing network, `None` if it does not exist.
    async fn network_internal(&self, network: &NetworkName) -> Result<Option<bool>, InspectError>;
}

#[derive(Debug, Clone)]
pub struct RuntimeInspector {
    executor: RemoteExecutor,
    commands: ComposeCommands,
    timeout: Duration,
}

impl RuntimeInspector {
    pub fn new(executor: RemoteExecutor, commands: ComposeCommands, timeout: Duration) -> Self {
        Self {
            executor,
            commands,
            timeout,
        }
    }
}

#[async_trait]
impl NetworkInspector for RuntimeInspector {
    async fn attached_networks(&self, service: &ServiceName) -> Result<Vec<String>, InspectError> {
        let output = self
            .executor
            .execute(&self.commands.container_networks(service), self.timeout)
            .await?;
        if !output.success() {
            return Err(InspectError::Failed(output.stderr.trim().to_string()));
        }
        parse_networks(&output.stdout)
    }

    async fn network_internal(&self, network: &NetworkName) -> Result<Option<bool>, InspectError> {
        let output = self
            .executor
            .execute(&self.commands.network_internal(network), self.timeout)
            .await?;
        if !output.success() {
            return Ok(None);
        }
        match output.stdout.trim() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(InspectError::Parse(other.to_string())),
        }
    }
}

/// Parse `{{json .NetworkSettings.Networks}}`: an object keyed by network name, or `null`.
pub fn parse_networks(stdout: &str) -> Result<Vec<String>, InspectError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let networks: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(trimmed).map_err(|e| InspectError::Parse(e.to_string()))?;
    Ok(networks.into_keys().collect())
}
