// ABOUTME: One phase's walk through apply, health check and isolation validation.
// ABOUTME: Each transition consumes self, so steps cannot be reordered or repeated.

use super::policy::RolloutPolicy;
use super::result::{PhaseFailure, PhaseResult, PhaseStatus};
use super::state::{Applied, HealthChecked, Pending, Validated};
use crate::executor::{ComposeCommands, ExecError, RemoteExecutor};
use crate::health::{HealthGate, ServiceResult};
use crate::isolation::IsolationValidator;
use crate::phase::{Phase, Service};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest stderr excerpt kept in a report.
const STDERR_EXCERPT: usize = 2000;

/// A phase being rolled out, parameterized by how far it got.
#[derive(Debug)]
pub struct PhaseRollout<'a, S> {
    phase: &'a Phase,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
    state: S,
}

impl<'a> PhaseRollout<'a, Pending> {
    pub fn new(phase: &'a Phase, cancel: CancellationToken) -> Self {
        Self {
            phase,
            cancel,
            started_at: Utc::now(),
            state: Pending,
        }
    }

    /// Bring the phase's services up with compose.
    ///
    /// # Errors
    ///
    /// Returns the finished `failed` result when the command cannot run or exits non-zero.
    #[must_use = "rollout state must be used"]
    pub async fn apply(
        self,
        executor: &RemoteExecutor,
        commands: &ComposeCommands,
        timeout: Duration,
    ) -> Result<PhaseRollout<'a, Applied>, PhaseResult> {
        let command = commands.apply(self.phase);
        debug!(phase = %self.phase.name, %command, "applying phase");

        let failure = match executor.execute(&command, timeout).await {
            Ok(output) if output.success() => {
                info!(phase = %self.phase.name, "compose applied");
                return Ok(self.transition(Applied));
            }
            Ok(output) => PhaseFailure::ApplyExit {
                exit_code: output.exit_code,
                stderr: excerpt(output.stderr.trim()),
            },
            Err(e) => classify(e),
        };

        warn!(phase = %self.phase.name, %failure, "apply failed");
        Err(self.fail(failure))
    }

    /// Treat the phase as already applied. Used by verify-only.
    #[must_use = "rollout state must be used"]
    pub fn skip_apply(self) -> PhaseRollout<'a, Applied> {
        self.transition(Applied)
    }
}

impl<'a> PhaseRollout<'a, Applied> {
    #[must_use = "rollout state must be used"]
    pub async fn health_check(self, gate: &HealthGate) -> PhaseRollout<'a, HealthChecked> {
        let services: Vec<Service> = self.phase.services.iter().cloned().collect();
        let results = gate
            .wait_for_healthy(&services, self.phase.health_timeout, &self.cancel)
            .await;
        self.transition(HealthChecked { services: results })
    }

    /// A single probe round, reporting what is observed right now.
    #[must_use = "rollout state must be used"]
    pub async fn verify_once(self, gate: &HealthGate) -> PhaseRollout<'a, HealthChecked> {
        let services: Vec<Service> = self.phase.services.iter().cloned().collect();
        let results = gate.verify_once(&services, &self.cancel).await;
        self.transition(HealthChecked { services: results })
    }
}

impl<'a> PhaseRollout<'a, HealthChecked> {
    pub fn services(&self) -> &[ServiceResult] {
        &self.state.services
    }

    #[must_use = "rollout state must be used"]
    pub async fn validate_isolation(
        self,
        validator: &IsolationValidator,
    ) -> PhaseRollout<'a, Validated> {
        let violations = if self.cancel.is_cancelled() {
            Vec::new()
        } else {
            validator.validate_phase(self.phase).await
        };
        for violation in &violations {
            warn!(phase = %self.phase.name, %violation, "isolation violation");
        }
        let services = self.state.services.clone();
        self.transition(Validated {
            services,
            violations,
        })
    }
}

impl PhaseRollout<'_, Validated> {
    /// Decide the phase status.
    ///
    /// Cancellation and unhealthy critical services fail the phase; violations
    /// fail it only under strict isolation; any other unhealthy service degrades it.
    pub fn finish(self, policy: &RolloutPolicy) -> PhaseResult {
        let Validated {
            services,
            violations,
        } = &self.state;

        let critical: Vec<_> = services
            .iter()
            .filter(|s| s.fails_phase())
            .map(|s| s.service.clone())
            .collect();

        let (status, failure) = if self.cancel.is_cancelled() {
            (PhaseStatus::Failed, Some(PhaseFailure::Cancelled))
        } else if !critical.is_empty() {
            (
                PhaseStatus::Failed,
                Some(PhaseFailure::CriticalService { services: critical }),
            )
        } else if policy.strict_isolation && !violations.is_empty() {
            (
                PhaseStatus::Failed,
                Some(PhaseFailure::StrictIsolation {
                    violations: violations.len(),
                }),
            )
        } else if services.iter().any(|s| !s.is_healthy()) {
            (PhaseStatus::Degraded, None)
        } else {
            (PhaseStatus::Succeeded, None)
        };

        info!(phase = %self.phase.name, %status, "phase finished");

        PhaseResult {
            phase: self.phase.name.clone(),
            status,
            skip_reason: None,
            failure,
            services: services.clone(),
            isolation_violations: violations.clone(),
            started_at: Some(self.started_at),
            finished_at: Some(Utc::now()),
        }
    }
}

impl<'a, S> PhaseRollout<'a, S> {
    pub fn phase(&self) -> &'a Phase {
        self.phase
    }

    fn transition<T>(self, state: T) -> PhaseRollout<'a, T> {
        PhaseRollout {
            phase: self.phase,
            cancel: self.cancel,
            started_at: self.started_at,
            state,
        }
    }

    fn fail(self, failure: PhaseFailure) -> PhaseResult {
        PhaseResult {
            phase: self.phase.name.clone(),
            status: PhaseStatus::Failed,
            skip_reason: None,
            failure: Some(failure),
            services: Vec::new(),
            isolation_violations: Vec::new(),
            started_at: Some(self.started_at),
            finished_at: Some(Utc::now()),
        }
    }
}

fn classify(err: ExecError) -> PhaseFailure {
    match err {
        ExecError::Connectivity { .. } => PhaseFailure::Connectivity {
            message: err.to_string(),
        },
        ExecError::Timeout { after, .. } => PhaseFailure::ApplyTimeout { after },
        ExecError::Cancelled => PhaseFailure::Cancelled,
        ExecError::Transport { .. } => PhaseFailure::Transport {
            message: err.to_string(),
        },
    }
}

fn excerpt(stderr: &str) -> String {
    if stderr.len() <= STDERR_EXCERPT {
        return stderr.to_string();
    }
    let mut start = stderr.len() - STDERR_EXCERPT;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &stderr[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_the_tail() {
        let long = format!("{}tail", "x".repeat(STDERR_EXCERPT + 10));
        let cut = excerpt(&long);
        assert!(cut.starts_with("..."));
        assert!(cut.ends_with("tail"));
        assert_eq!(cut.len(), STDERR_EXCERPT + 3);
    }

    #[test]
    fn connectivity_errors_classify_as_connectivity() {
        let err = ExecError::Connectivity {
            host: "pi@lucid:22".into(),
            attempts: 2,
            source: crate::executor::TransportError::Unreachable("refused".into()),
        };
        assert!(matches!(classify(err), PhaseFailure::Connectivity { .. }));
        assert_eq!(classify(ExecError::Cancelled), PhaseFailure::Cancelled);
    }
}
