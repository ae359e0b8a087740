// ABOUTME: Local shell transport for rolling out onto the machine pirollout runs on.
// ABOUTME: Commands run under `sh -c` and are killed when their timeout expires.

use super::{CommandOutput, Transport, TransportError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, TransportError> {
        let mut child = Command::new("sh");
        child
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, child.output()).await {
            Err(_) => return Err(TransportError::Timeout(timeout)),
            Ok(result) => result.map_err(TransportError::Spawn)?,
        };

        Ok(CommandOutput {
            // Killed by a signal: no exit code.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn target(&self) -> String {
        "local".to_string()
    }
}
