// ABOUTME: Outcome records for phases and whole runs.
// ABOUTME: A DeploymentRun is finalized once and then only read.

use crate::health::ServiceResult;
use crate::isolation::IsolationViolation;
use crate::types::{PhaseName, RunId, ServiceName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Succeeded,
    Degraded,
    Failed,
    Skipped,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Running => "running",
            PhaseStatus::Succeeded => "succeeded",
            PhaseStatus::Degraded => "degraded",
            PhaseStatus::Failed => "failed",
            PhaseStatus::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum SkipReason {
    /// A dependency failed or was itself skipped.
    UpstreamFailed { phase: PhaseName },
    /// A dependency degraded and the policy blocks on degraded phases.
    UpstreamDegraded { phase: PhaseName },
    /// A critical service of a dependency outside the selection is down.
    DependencyDown {
        phase: PhaseName,
        service: ServiceName,
    },
    /// Succeeded in the run being resumed.
    AlreadySucceeded { run_id: RunId },
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpstreamFailed { phase } => write!(f, "dependency {} did not succeed", phase),
            SkipReason::UpstreamDegraded { phase } => write!(f, "dependency {} is degraded", phase),
            SkipReason::DependencyDown { phase, service } => {
                write!(f, "critical service {} of {} is down", service, phase)
            }
            SkipReason::AlreadySucceeded { run_id } => write!(f, "already succeeded in run {}", run_id),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PhaseFailure {
    /// Host unreachable through the retry.
    Connectivity { message: String },
    /// Authentication, host key or spawn failure.
    Transport { message: String },
    /// The compose command exited non-zero.
    ApplyExit { exit_code: i32, stderr: String },
    ApplyTimeout {
        #[serde(with = "humantime_serde")]
        after: Duration,
    },
    /// Critical services not healthy.
    CriticalService { services: Vec<ServiceName> },
    /// Violations under strict isolation.
    StrictIsolation { violations: usize },
    Cancelled,
}

impl fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseFailure::Connectivity { message } => write!(f, "connectivity: {}", message),
            PhaseFailure::Transport { message } => write!(f, "transport: {}", message),
            PhaseFailure::ApplyExit { exit_code, stderr } if stderr.is_empty() => {
                write!(f, "compose exited with {}", exit_code)
            }
            PhaseFailure::ApplyExit { exit_code, stderr } => {
                write!(f, "compose exited with {}: {}", exit_code, stderr)
            }
            PhaseFailure::ApplyTimeout { after } => {
                write!(f, "compose did not finish within {:?}", after)
            }
            PhaseFailure::CriticalService { services } => {
                let names: Vec<&str> = services.iter().map(ServiceName::as_str).collect();
                write!(f, "critical services not healthy: {}", names.join(", "))
            }
            PhaseFailure::StrictIsolation { violations } => {
                write!(f, "{} isolation violation(s) under strict isolation", violations)
            }
            PhaseFailure::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: PhaseName,
    pub status: PhaseStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<PhaseFailure>,

    #[serde(default)]
    pub services: Vec<ServiceResult>,

    #[serde(default)]
    pub isolation_violations: Vec<IsolationViolation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PhaseResult {
    pub fn skipped(phase: &PhaseName, reason: SkipReason) -> Self {
        Self {
            phase: phase.clone(),
            status: PhaseStatus::Skipped,
            skip_reason: Some(reason),
            failure: None,
            services: Vec::new(),
            isolation_violations: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Dependents may proceed: succeeded, degraded, or carried over from a resumed run.
    pub fn satisfies_dependents(&self, block_on_degraded: bool) -> bool {
        match self.status {
            PhaseStatus::Succeeded => true,
            PhaseStatus::Degraded => !block_on_degraded,
            PhaseStatus::Skipped => matches!(self.skip_reason, Some(SkipReason::AlreadySucceeded { .. })),
            _ => false,
        }
    }

    /// Why a dependent of this phase cannot run, if it cannot.
    pub fn blocks_dependent(&self, block_on_degraded: bool) -> Option<SkipReason> {
        if self.satisfies_dependents(block_on_degraded) {
            return None;
        }
        Some(match self.status {
            PhaseStatus::Degraded => SkipReason::UpstreamDegraded {
                phase: self.phase.clone(),
            },
            _ => SkipReason::UpstreamFailed {
                phase: self.phase.clone(),
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    RunAll,
    RunPhase,
    VerifyOnly,
    Resume,
}

impl RunMode {
    /// Whether runs of this mode bring services up. Only those can be resumed from.
    pub fn applies(self) -> bool {
        !matches!(self, RunMode::VerifyOnly)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::RunAll => "run-all",
            RunMode::RunPhase => "run-phase",
            RunMode::VerifyOnly => "verify-only",
            RunMode::Resume => "resume",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Running,
    /// Every phase succeeded.
    Completed,
    /// Every phase succeeded or degraded, at least one degraded.
    Degraded,
    /// A phase failed, was skipped, or the run was cancelled.
    Aborted,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Degraded => 1,
            RunStatus::Running | RunStatus::Aborted => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Degraded => "degraded",
            RunStatus::Aborted => "aborted",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRun {
    pub id: RunId,
    pub mode: RunMode,
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<RunId>,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub phases: Vec<PhaseResult>,
    pub status: RunStatus,
    pub exit_code: i32,
}

impl DeploymentRun {
    pub fn start(mode: RunMode, host: impl Into<String>, environment: Option<String>) -> Self {
        Self {
            id: RunId::generate(),
            mode,
            host: host.into(),
            environment,
            resumed_from: None,
            started_at: Utc::now(),
            finished_at: None,
            phases: Vec::new(),
            status: RunStatus::Running,
            exit_code: RunStatus::Running.exit_code(),
        }
    }

    pub fn phase(&self, name: &PhaseName) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| &p.phase == name)
    }

    pub fn record(&mut self, result: PhaseResult) {
        self.phases.push(result);
    }

    /// Compute the overall status and exit code. Consumes the run so it cannot be extended after.
    pub fn finish(mut self) -> Self {
        self.status = overall_status(&self.phases);
        self.exit_code = self.status.exit_code();
        self.finished_at = Some(Utc::now());
        self
    }

    /// Phases that succeeded in this run, directly or carried over from the one it resumed.
    pub fn succeeded_phases(&self) -> impl Iterator<Item = &PhaseName> {
        self.phases
            .iter()
            .filter(|p| {
                p.status == PhaseStatus::Succeeded
                    || matches!(p.skip_reason, Some(SkipReason::AlreadySucceeded { .. }))
            })
            .map(|p| &p.phase)
    }
}

pub fn overall_status(phases: &[PhaseResult]) -> RunStatus {
    let mut degraded = false;
    for phase in phases {
        match phase.status {
            PhaseStatus::Succeeded => {}
            PhaseStatus::Degraded => degraded = true,
            PhaseStatus::Skipped
                if matches!(phase.skip_reason, Some(SkipReason::AlreadySucceeded { .. })) => {}
            PhaseStatus::Failed | PhaseStatus::Skipped => return RunStatus::Aborted,
            PhaseStatus::Pending | PhaseStatus::Running => return RunStatus::Aborted,
        }
    }
    if degraded {
        RunStatus::Degraded
    } else {
        RunStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PhaseName {
        PhaseName::new(s).unwrap()
    }

    fn with_status(phase: &str, status: PhaseStatus) -> PhaseResult {
        PhaseResult {
            status,
            ..PhaseResult::skipped(&name(phase), SkipReason::Cancelled)
        }
    }

    #[test]
    fn all_succeeded_is_completed() {
        let phases = vec![
            with_status("foundation", PhaseStatus::Succeeded),
            with_status("core", PhaseStatus::Succeeded),
        ];
        assert_eq!(overall_status(&phases), RunStatus::Completed);
    }

    #[test]
    fn degraded_phase_degrades_run() {
        let phases = vec![
            with_status("foundation", PhaseStatus::Succeeded),
            with_status("core", PhaseStatus::Degraded),
        ];
        assert_eq!(overall_status(&phases), RunStatus::Degraded);
        assert_eq!(RunStatus::Degraded.exit_code(), 1);
    }

    #[test]
    fn failure_aborts_run() {
        let phases = vec![
            with_status("foundation", PhaseStatus::Failed),
            PhaseResult::skipped(
                &name("core"),
                SkipReason::UpstreamFailed {
                    phase: name("foundation"),
                },
            ),
        ];
        assert_eq!(overall_status(&phases), RunStatus::Aborted);
        assert_eq!(RunStatus::Aborted.exit_code(), 2);
    }

    #[test]
    fn carried_over_phase_counts_as_satisfied() {
        let carried = PhaseResult::skipped(
            &name("foundation"),
            SkipReason::AlreadySucceeded {
                run_id: RunId::parse("0123456789ab").unwrap(),
            },
        );
        assert!(carried.satisfies_dependents(true));
        assert_eq!(overall_status(&[carried]), RunStatus::Completed);
    }

    #[test]
    fn degraded_blocks_only_under_policy() {
        let core = with_status("core", PhaseStatus::Degraded);
        assert_eq!(core.blocks_dependent(false), None);
        assert_eq!(
            core.blocks_dependent(true),
            Some(SkipReason::UpstreamDegraded { phase: name("core") })
        );
    }

    #[test]
    fn skip_reason_serializes_with_tag() {
        let json = serde_json::to_value(SkipReason::UpstreamFailed {
            phase: name("foundation"),
        })
        .unwrap();
        assert_eq!(json["reason"], "upstream-failed");
        assert_eq!(json["phase"], "foundation");
    }
}
