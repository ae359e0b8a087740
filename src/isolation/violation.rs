// ABOUTME: Isolation violations recorded on a phase result.
// ABOUTME: Serialized with a `kind` tag so reports stay readable.

use crate::types::{NetworkName, ServiceName};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum IsolationViolation {
    /// The container is not attached to its declared network.
    WrongNetwork {
        service: ServiceName,
        expected: NetworkName,
        actual: Vec<String>,
    },
    /// An isolated service is attached to networks besides its own.
    ExtraNetwork {
        service: ServiceName,
        expected: NetworkName,
        extra: Vec<String>,
    },
    /// The container's networks could not be read.
    InspectionFailed { service: ServiceName, reason: String },
    /// A required network could not be inspected, so whether it exists is unknown.
    NetworkInspectionFailed { network: NetworkName, reason: String },
    /// A network the phase requires does not exist on the host.
    MissingNetwork { network: NetworkName },
    /// A network declared internal was created without `--internal`.
    NotInternal { network: NetworkName },
}

impl fmt::Display for IsolationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationViolation::WrongNetwork {
                service,
                expected,
                actual,
            } => write!(
                f,
                "{} is not on {} (attached: {})",
                service,
                expected,
                list(actual)
            ),
            IsolationViolation::ExtraNetwork {
                service,
                expected,
                extra,
            } => write!(
                f,
                "{} should only be on {} but is also on {}",
                service,
                expected,
                list(extra)
            ),
            IsolationViolation::InspectionFailed { service, reason } => {
                write!(f, "could not inspect networks of {}: {}", service, reason)
            }
            IsolationViolation::NetworkInspectionFailed { network, reason } => {
                write!(f, "could not inspect network {}: {}", network, reason)
            }
            IsolationViolation::MissingNetwork { network } => {
                write!(f, "required network {} does not exist", network)
            }
            IsolationViolation::NotInternal { network } => {
                write!(f, "network {} is not internal", network)
            }
        }
    }
}

fn list(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
