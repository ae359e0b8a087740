// ABOUTME: Test support utilities.
// ABOUTME: Scripted transport, health probe and network inspector for rollout tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use pirollout::executor::{
    CommandOutput, ComposeCommands, RemoteExecutor, Transport, TransportError,
};
use pirollout::config::Runtime;
use pirollout::health::{ContainerStatus, HealthGate, HealthProbe, HttpOutcome, ProbeError};
use pirollout::isolation::{InspectError, IsolationValidator, NetworkInspector};
use pirollout::phase::{Phase, Service};
use pirollout::registry::PhaseRegistry;
use pirollout::rollout::RolloutController;
use pirollout::types::{NetworkName, ServiceName};
use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("pirollout=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Build a validated registry from YAML.
#[allow(dead_code)]
pub fn registry(yaml: &str) -> PhaseRegistry {
    let phases: Vec<Phase> = serde_yaml::from_str(yaml).expect("test phases should parse");
    PhaseRegistry::new(phases).expect("test phases should validate")
}

/// Records every command and answers with exit 0, unless a rule matches.
#[derive(Default)]
pub struct RecordingTransport {
    commands: Mutex<Vec<String>>,
    rules: Mutex<Vec<(String, Reply)>>,
}

#[derive(Clone)]
#[allow(dead_code)]
pub enum Reply {
    Exit(i32, &'static str),
    Unreachable,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Commands containing `needle` get `reply`.
    pub fn on(&self, needle: &str, reply: Reply) {
        self.rules.lock().push((needle.to_string(), reply));
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    /// Compose applies that mention `compose_file`.
    pub fn applies_of(&self, compose_file: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.contains(" up -d") && c.contains(compose_file))
            .count()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn run(&self, command: &str, _timeout: Duration) -> Result<CommandOutput, TransportError> {
        self.commands.lock().push(command.to_string());
        let reply = self
            .rules
            .lock()
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone());
        match reply {
            Some(Reply::Unreachable) => Err(TransportError::Unreachable("connection refused".into())),
            Some(Reply::Exit(code, stderr)) => Ok(CommandOutput {
                exit_code: code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
            None => Ok(CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }

    fn target(&self) -> String {
        "pi@test-host:22".to_string()
    }
}

/// How a scripted service behaves under probing.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Behavior {
    Healthy,
    /// Healthy from the given probe round on (1-based).
    HealthyFromRound(u32),
    /// Running but the health endpoint never answers 2xx.
    NeverHealthy,
    /// Container never starts.
    Stopped,
    /// Every probe hangs forever.
    Hang,
}

/// Probe answering from a per-service script. Unlisted services are healthy.
#[derive(Default)]
pub struct ScriptedProbe {
    behaviors: HashMap<String, Behavior>,
    rounds: Mutex<HashMap<String, u32>>,
}

#[allow(dead_code)]
impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(service.to_string(), behavior);
        self
    }

    pub fn rounds(&self, service: &str) -> u32 {
        self.rounds.lock().get(service).copied().unwrap_or(0)
    }

    fn behavior(&self, service: &Service) -> Behavior {
        self.behaviors
            .get(service.name.as_str())
            .copied()
            .unwrap_or(Behavior::Healthy)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn container_status(&self, service: &Service) -> Result<ContainerStatus, ProbeError> {
        let round = {
            let mut rounds = self.rounds.lock();
            let round = rounds.entry(service.name.to_string()).or_insert(0);
            *round += 1;
            *round
        };
        match self.behavior(service) {
            Behavior::Hang => std::future::pending().await,
            Behavior::Stopped => Ok(ContainerStatus::Stopped),
            Behavior::HealthyFromRound(from) if round < from => Ok(ContainerStatus::Stopped),
            _ => Ok(ContainerStatus::Running),
        }
    }

    async fn http_health(&self, service: &Service, _path: &str) -> HttpOutcome {
        match self.behavior(service) {
            Behavior::NeverHealthy => HttpOutcome::Unhealthy(503),
            Behavior::Hang => std::future::pending().await,
            _ => HttpOutcome::Healthy,
        }
    }
}

/// Inspector with scripted attachments; unlisted services sit on their declared network.
#[derive(Default)]
pub struct ScriptedInspector {
    attachments: HashMap<String, Vec<String>>,
    missing_networks: Vec<String>,
    unreadable_networks: Vec<String>,
    declared: Mutex<HashMap<String, String>>,
}

#[allow(dead_code)]
impl ScriptedInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(mut self, service: &str, networks: &[&str]) -> Self {
        self.attachments.insert(
            service.to_string(),
            networks.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn without_network(mut self, network: &str) -> Self {
        self.missing_networks.push(network.to_string());
        self
    }

    pub fn unreadable_network(mut self, network: &str) -> Self {
        self.unreadable_networks.push(network.to_string());
        self
    }

    /// Register the declared networks of every service in `registry`.
    pub fn declare(self, registry: &PhaseRegistry) -> Self {
        {
            let mut declared = self.declared.lock();
            for phase in registry.ordered_phases() {
                for service in phase.services.iter() {
                    declared.insert(service.name.to_string(), service.network.to_string());
                }
            }
        }
        self
    }
}

#[async_trait]
impl NetworkInspector for ScriptedInspector {
    async fn attached_networks(&self, service: &ServiceName) -> Result<Vec<String>, InspectError> {
        if let Some(networks) = self.attachments.get(service.as_str()) {
            return Ok(networks.clone());
        }
        match self.declared.lock().get(service.as_str()) {
            Some(network) => Ok(vec![network.clone()]),
            None => Err(InspectError::Failed(format!("No such object: {}", service))),
        }
    }

    async fn network_internal(&self, network: &NetworkName) -> Result<Option<bool>, InspectError> {
        if self.missing_networks.iter().any(|n| network == n.as_str()) {
            return Ok(None);
        }
        if self.unreadable_networks.iter().any(|n| network == n.as_str()) {
            return Err(InspectError::Failed("connection reset by peer".to_string()));
        }
        Ok(Some(network.as_str().contains("isolated")))
    }
}

/// Everything a controller test needs, with handles kept for assertions.
#[allow(dead_code)]
pub struct Harness {
    pub registry: PhaseRegistry,
    pub transport: Arc<RecordingTransport>,
    pub probe: Arc<ScriptedProbe>,
    pub cancel: CancellationToken,
    inspector: Arc<ScriptedInspector>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(registry: PhaseRegistry, probe: ScriptedProbe) -> Self {
        Self::with_inspector(registry, probe, ScriptedInspector::new())
    }

    pub fn with_inspector(
        registry: PhaseRegistry,
        probe: ScriptedProbe,
        inspector: ScriptedInspector,
    ) -> Self {
        let inspector = inspector.declare(&registry);
        Self {
            registry,
            transport: RecordingTransport::new(),
            probe: Arc::new(probe),
            cancel: CancellationToken::new(),
            inspector: Arc::new(inspector),
        }
    }

    pub fn executor(&self) -> RemoteExecutor {
        RemoteExecutor::new(
            self.transport.clone(),
            Duration::from_secs(2),
            self.cancel.clone(),
        )
    }

    pub fn controller(&self) -> RolloutController<'_> {
        RolloutController::new(
            &self.registry,
            self.executor(),
            ComposeCommands::new(Runtime::Docker, "~/lucid", vec![], vec![]),
            HealthGate::new(self.probe.clone(), Duration::from_secs(5)),
            IsolationValidator::new(self.inspector.clone()),
        )
    }
}
