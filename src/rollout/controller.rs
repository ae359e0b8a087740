// ABOUTME: Drives phases in dependency order and decides continue, degrade or abort.
// ABOUTME: Component failures become PhaseResult data; nothing escapes as an error mid-run.

use super::phase_rollout::PhaseRollout;
use super::policy::RolloutPolicy;
use super::result::{DeploymentRun, PhaseResult, PhaseStatus, RunMode, SkipReason};
use crate::diagnostics::{Diagnostics, Warning};
use crate::executor::{ComposeCommands, RemoteExecutor};
use crate::health::HealthGate;
use crate::isolation::IsolationValidator;
use crate::phase::{Phase, Service};
use crate::registry::{ConfigError, PhaseRegistry};
use crate::types::PhaseName;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

/// Receives progress as phases start and finish.
pub trait RolloutObserver: Send + Sync {
    fn phase_started(&self, _phase: &Phase) {}
    fn phase_finished(&self, _result: &PhaseResult) {}
}

struct Silent;

impl RolloutObserver for Silent {}

/// One entry of a dry-run plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPhase {
    pub phase: PhaseName,
    pub order: u32,
    pub depends_on: Vec<PhaseName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub commands: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub health_timeout: Duration,
}

pub struct RolloutController<'r> {
    registry: &'r PhaseRegistry,
    executor: RemoteExecutor,
    commands: ComposeCommands,
    gate: HealthGate,
    validator: IsolationValidator,
    policy: RolloutPolicy,
    apply_timeout: Duration,
    environment: Option<String>,
    observer: Arc<dyn RolloutObserver>,
}

impl std::fmt::Debug for RolloutController<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolloutController")
            .field("target", &self.executor.target())
            .field("policy", &self.policy)
            .field("phases", &self.registry.len())
            .finish()
    }
}

impl<'r> RolloutController<'r> {
    pub fn new(
        registry: &'r PhaseRegistry,
        executor: RemoteExecutor,
        commands: ComposeCommands,
        gate: HealthGate,
        validator: IsolationValidator,
    ) -> Self {
        Self {
            registry,
            executor,
            commands,
            gate,
            validator,
            policy: RolloutPolicy::default(),
            apply_timeout: Duration::from_secs(600),
            environment: None,
            observer: Arc::new(Silent),
        }
    }

    pub fn policy(mut self, policy: RolloutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout = timeout;
        self
    }

    pub fn environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RolloutObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn cancel(&self) -> &CancellationToken {
        self.executor.cancel_token()
    }

    /// Roll out every phase in order.
    pub async fn run_all(&self, diagnostics: &mut Diagnostics) -> DeploymentRun {
        self.run_sequence(RunMode::RunAll, None, diagnostics).await
    }

    /// Like `run_all`, skipping phases that succeeded in `prior`.
    pub async fn resume(&self, prior: &DeploymentRun, diagnostics: &mut Diagnostics) -> DeploymentRun {
        self.run_sequence(RunMode::Resume, Some(prior), diagnostics).await
    }

    /// Roll out a single phase.
    ///
    /// Its dependencies are probed once instead of being rolled out; a down
    /// critical service among them skips the phase unless `force` is set.
    pub async fn run_phase(
        &self,
        name: &str,
        force: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<DeploymentRun, ConfigError> {
        let phase = self.registry.get(name)?;
        let mut run = self.start_run(RunMode::RunPhase);

        let blocked = self.check_dependencies(phase).await;
        self.close_connection(diagnostics).await;

        let result = match blocked {
            Some(reason) if !force => {
                warn!(phase = %phase.name, %reason, "skipping phase");
                PhaseResult::skipped(&phase.name, reason)
            }
            other => {
                if let Some(reason) = other {
                    diagnostics.warn(
                        Warning::forced(format!("running although {}", reason))
                            .in_phase(&phase.name),
                    );
                }
                self.roll_out(phase, false, diagnostics).await
            }
        };

        self.observer.phase_finished(&result);
        run.record(result);
        Ok(run.finish())
    }

    /// Health and isolation checks for every phase, without applying anything.
    pub async fn verify_only(&self, diagnostics: &mut Diagnostics) -> DeploymentRun {
        let mut run = self.start_run(RunMode::VerifyOnly);
        for phase in self.registry.ordered_phases() {
            let result = if self.cancel().is_cancelled() {
                PhaseResult::skipped(&phase.name, SkipReason::Cancelled)
            } else {
                self.roll_out(phase, true, diagnostics).await
            };
            self.observer.phase_finished(&result);
            run.record(result);
        }
        run.finish()
    }

    /// The ordered plan with the commands each phase would run.
    pub fn plan(&self, prior: Option<&DeploymentRun>) -> Vec<PlannedPhase> {
        self.registry
            .ordered_phases()
            .iter()
            .map(|phase| {
                let skip_reason = prior.and_then(|p| carried_over(p, &phase.name));
                let commands = if skip_reason.is_some() {
                    Vec::new()
                } else {
                    vec![self.commands.apply(phase)]
                };
                PlannedPhase {
                    phase: phase.name.clone(),
                    order: phase.order,
                    depends_on: phase.depends_on.clone(),
                    skip_reason,
                    commands,
                    health_timeout: phase.health_timeout,
                }
            })
            .collect()
    }

    async fn run_sequence(
        &self,
        mode: RunMode,
        prior: Option<&DeploymentRun>,
        diagnostics: &mut Diagnostics,
    ) -> DeploymentRun {
        let mut run = self.start_run(mode);
        run.resumed_from = prior.map(|p| p.id.clone());

        let mut outcomes: HashMap<&PhaseName, PhaseResult> = HashMap::new();

        for phase in self.registry.ordered_phases() {
            let result = if self.cancel().is_cancelled() {
                PhaseResult::skipped(&phase.name, SkipReason::Cancelled)
            } else if let Some(reason) = self.blocked_by(phase, &outcomes) {
                info!(phase = %phase.name, %reason, "skipping phase");
                PhaseResult::skipped(&phase.name, reason)
            } else if let Some(reason) = prior.and_then(|p| carried_over(p, &phase.name)) {
                info!(phase = %phase.name, %reason, "skipping phase");
                PhaseResult::skipped(&phase.name, reason)
            } else {
                self.roll_out(phase, false, diagnostics).await
            };

            self.observer.phase_finished(&result);
            outcomes.insert(&phase.name, result.clone());
            run.record(result);
        }

        run.finish()
    }

    fn start_run(&self, mode: RunMode) -> DeploymentRun {
        let run = DeploymentRun::start(mode, self.executor.target(), self.environment.clone());
        info!(run_id = %run.id, %mode, target_host = %run.host, "rollout started");
        run
    }

    /// First dependency that keeps `phase` from running.
    fn blocked_by(
        &self,
        phase: &Phase,
        outcomes: &HashMap<&PhaseName, PhaseResult>,
    ) -> Option<SkipReason> {
        phase.depends_on.iter().find_map(|dep| {
            outcomes
                .get(dep)
                .and_then(|result| result.blocks_dependent(self.policy.block_on_degraded))
        })
    }

    /// One probe round over each dependency's services.
    async fn check_dependencies(&self, phase: &Phase) -> Option<SkipReason> {
        for dep in &phase.depends_on {
            let Some(dep_phase) = self.registry.phase(dep.as_str()) else {
                continue;
            };
            let services: Vec<Service> = dep_phase.services.iter().cloned().collect();
            let results = self.gate.verify_once(&services, self.cancel()).await;
            if let Some(down) = results.iter().find(|r| r.fails_phase()) {
                return Some(SkipReason::DependencyDown {
                    phase: dep.clone(),
                    service: down.service.clone(),
                });
            }
        }
        None
    }

    async fn roll_out(&self, phase: &Phase, verify: bool, diagnostics: &mut Diagnostics) -> PhaseResult {
        self.observer.phase_started(phase);
        let span = info_span!("phase", phase = %phase.name, order = phase.order);

        let result = async {
            let rollout = PhaseRollout::new(phase, self.cancel().clone());
            let checked = if verify {
                rollout.skip_apply().verify_once(&self.gate).await
            } else {
                match rollout
                    .apply(&self.executor, &self.commands, self.apply_timeout)
                    .await
                {
                    Ok(applied) => applied.health_check(&self.gate).await,
                    Err(failed) => return failed,
                }
            };
            checked
                .validate_isolation(&self.validator)
                .await
                .finish(&self.policy)
        }
        .instrument(span)
        .await;

        for violation in &result.isolation_violations {
            diagnostics.warn(Warning::isolation(violation.to_string()).in_phase(&phase.name));
        }
        self.close_connection(diagnostics).await;
        result
    }

    async fn close_connection(&self, diagnostics: &mut Diagnostics) {
        if let Err(e) = self.executor.close().await {
            diagnostics.warn(Warning::ssh_disconnect(format!(
                "failed to close connection to {}: {}",
                self.executor.target(),
                e
            )));
        }
    }
}

/// Verify-only runs never applied anything, so nothing carries over from them.
fn carried_over(prior: &DeploymentRun, phase: &PhaseName) -> Option<SkipReason> {
    if !prior.mode.applies() {
        return None;
    }
    let succeeded = prior.succeeded_phases().any(|p| p == phase);
    succeeded.then(|| SkipReason::AlreadySucceeded {
        run_id: carried_from(prior, phase),
    })
}

/// The run a success originally came from, following resume chains back.
fn carried_from(prior: &DeploymentRun, phase: &PhaseName) -> crate::types::RunId {
    match prior.phase(phase).map(|p| (&p.status, &p.skip_reason)) {
        Some((PhaseStatus::Skipped, Some(SkipReason::AlreadySucceeded { run_id }))) => {
            run_id.clone()
        }
        _ => prior.id.clone(),
    }
}
