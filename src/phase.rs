// ABOUTME: Phase and service records loaded from the registry.
// ABOUTME: Immutable once loaded; the controller only ever borrows them.

use crate::types::{NetworkName, PhaseName, ServiceName};
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How much a service matters to its phase.
///
/// A `Critical` service that does not become healthy fails the phase;
/// any other priority only degrades it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn is_critical(self) -> bool {
        matches!(self, Priority::Critical)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

/// A compose service that belongs to a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: ServiceName,

    /// Port the health probe connects to on the target host.
    pub port: u16,

    /// HTTP path probed once the container is running. Without one,
    /// running is enough.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_path: Option<String>,

    pub priority: Priority,

    /// Network segment the container must be attached to.
    pub network: NetworkName,

    /// Isolated services must not be attached to any other network.
    #[serde(default)]
    pub isolated: bool,
}

/// A network that has to exist on the host before a phase counts as isolated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConstraint {
    pub name: NetworkName,

    /// Expect the network to be created with `--internal`.
    #[serde(default)]
    pub internal: bool,
}

/// One ordered unit of deployment work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: PhaseName,
    pub order: u32,

    /// Compose descriptor path, passed through verbatim.
    pub compose: String,

    #[serde(default)]
    pub env_files: Vec<String>,

    pub services: NonEmpty<Service>,

    #[serde(default)]
    pub depends_on: Vec<PhaseName>,

    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub health_timeout: Duration,

    #[serde(default)]
    pub networks: Vec<NetworkConstraint>,
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(90)
}

impl Phase {
    pub fn service(&self, name: &ServiceName) -> Option<&Service> {
        self.services.iter().find(|s| &s.name == name)
    }

    pub fn service_names(&self) -> Vec<&ServiceName> {
        self.services.iter().map(|s| &s.name).collect()
    }

    pub fn critical_services(&self) -> impl Iterator<Item = &Service> {
        self.services.iter().filter(|s| s.priority.is_critical())
    }
}
