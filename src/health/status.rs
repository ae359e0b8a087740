// ABOUTME: Per-service health outcome and its derived overall status.
// ABOUTME: Overall status folds container state, health state and priority into one verdict.

use crate::phase::{Priority, Service};
use crate::types::ServiceName;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerStatus {
    Running,
    Stopped,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// Still unresolved when the phase deadline fired.
    Timeout,
    /// Running with no health endpoint declared.
    NoCheck,
}

impl HealthStatus {
    pub fn counts_as_healthy(self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::NoCheck)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Down,
}

impl OverallStatus {
    pub fn derive(container: ContainerStatus, health: HealthStatus, priority: Priority) -> Self {
        match container {
            ContainerStatus::Running if health.counts_as_healthy() => OverallStatus::Healthy,
            ContainerStatus::Running if priority.is_critical() => OverallStatus::Unhealthy,
            ContainerStatus::Running => OverallStatus::Degraded,
            ContainerStatus::Stopped | ContainerStatus::Unknown => OverallStatus::Down,
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
            OverallStatus::Down => "down",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResult {
    pub service: ServiceName,
    pub priority: Priority,
    pub container_status: ContainerStatus,
    pub health_status: HealthStatus,
    pub overall_status: OverallStatus,
    /// Last probe failure, for the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ServiceResult {
    pub fn new(
        service: &Service,
        container_status: ContainerStatus,
        health_status: HealthStatus,
        detail: Option<String>,
    ) -> Self {
        Self {
            service: service.name.clone(),
            priority: service.priority,
            container_status,
            health_status,
            overall_status: OverallStatus::derive(container_status, health_status, service.priority),
            detail,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == OverallStatus::Healthy
    }

    /// A critical service that is unhealthy or down fails its phase.
    pub fn fails_phase(&self) -> bool {
        self.priority.is_critical()
            && matches!(
                self.overall_status,
                OverallStatus::Unhealthy | OverallStatus::Down
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ContainerStatus::*;
    use HealthStatus::*;

    #[test]
    fn running_and_healthy_is_healthy_at_any_priority() {
        for priority in [Priority::Critical, Priority::Low] {
            assert_eq!(OverallStatus::derive(Running, Healthy, priority), OverallStatus::Healthy);
            assert_eq!(OverallStatus::derive(Running, NoCheck, priority), OverallStatus::Healthy);
        }
    }

    #[test]
    fn running_but_unhealthy_depends_on_priority() {
        assert_eq!(
            OverallStatus::derive(Running, Timeout, Priority::Medium),
            OverallStatus::Degraded
        );
        assert_eq!(
            OverallStatus::derive(Running, Unhealthy, Priority::Critical),
            OverallStatus::Unhealthy
        );
    }

    #[test]
    fn not_running_is_down() {
        assert_eq!(OverallStatus::derive(Stopped, Timeout, Priority::Low), OverallStatus::Down);
        assert_eq!(
            OverallStatus::derive(Unknown, Unhealthy, Priority::High),
            OverallStatus::Down
        );
    }

    #[test]
    fn statuses_serialize_kebab_case() {
        assert_eq!(serde_json::to_string(&NoCheck).unwrap(), "\"no-check\"");
        assert_eq!(serde_json::to_string(&OverallStatus::Down).unwrap(), "\"down\"");
    }
}
