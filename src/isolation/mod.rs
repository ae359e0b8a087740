// ABOUTME: Network isolation validator: compares actual attachments to declared segments.
// ABOUTME: Violations are collected, never raised; the controller decides what they cost.

mod inspector;
mod violation;

pub use inspector::{InspectError, NetworkInspector, RuntimeInspector, parse_networks};
pub use violation::IsolationViolation;

use crate::phase::{NetworkConstraint, Phase, Service};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct IsolationValidator {
    inspector: Arc<dyn NetworkInspector>,
}

impl std::fmt::Debug for IsolationValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationValidator").finish_non_exhaustive()
    }
}

impl IsolationValidator {
    pub fn new(inspector: Arc<dyn NetworkInspector>) -> Self {
        Self { inspector }
    }

    /// Required networks first, then every service's attachments.
    pub async fn validate_phase(&self, phase: &Phase) -> Vec<IsolationViolation> {
        let mut violations = self.check_networks(&phase.networks).await;
        let services: Vec<Service> = phase.services.iter().cloned().collect();
        violations.extend(self.validate(&services).await);
        violations
    }

    pub async fn validate(&self, services: &[Service]) -> Vec<IsolationViolation> {
        let mut violations = Vec::new();
        for service in services {
            match self.inspector.attached_networks(&service.name).await {
                Ok(attached) => violations.extend(check_attachment(service, &attached)),
                Err(e) => violations.push(IsolationViolation::InspectionFailed {
                    service: service.name.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        violations
    }

    pub async fn check_networks(&self, required: &[NetworkConstraint]) -> Vec<IsolationViolation> {
        let mut violations = Vec::new();
        for constraint in required {
            match self.inspector.network_internal(&constraint.name).await {
                Ok(Some(internal)) => {
                    debug!(network = %constraint.name, internal, "required network present");
                    if constraint.internal && !internal {
                        violations.push(IsolationViolation::NotInternal {
                            network: constraint.name.clone(),
                        });
                    }
                }
                Ok(None) => violations.push(IsolationViolation::MissingNetwork {
                    network: constraint.name.clone(),
                }),
                Err(e) => {
                    debug!(network = %constraint.name, error = %e, "network inspect failed");
                    violations.push(IsolationViolation::NetworkInspectionFailed {
                        network: constraint.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        violations
    }
}

/// Compare one service's attachments against its declaration.
pub fn check_attachment(service: &Service, attached: &[String]) -> Option<IsolationViolation> {
    if !attached.iter().any(|n| service.network == *n.as_str()) {
        return Some(IsolationViolation::WrongNetwork {
            service: service.name.clone(),
            expected: service.network.clone(),
            actual: attached.to_vec(),
        });
    }

    if service.isolated {
        let extra: Vec<String> = attached
            .iter()
            .filter(|n| service.network != *n.as_str())
            .cloned()
            .collect();
        if !extra.is_empty() {
            return Some(IsolationViolation::ExtraNetwork {
                service: service.name.clone(),
                expected: service.network.clone(),
                extra,
            });
        }
    }

    None
}
