// ABOUTME: Rollout subcommands: run-all, run-phase, verify-only and resume.
// ABOUTME: Takes the host lock, drives the controller and persists the report.

use super::context::build_controller;
use pirollout::config::Config;
use pirollout::diagnostics::{Diagnostics, Warning};
use pirollout::error::{Error, Result};
use pirollout::executor::RemoteExecutor;
use pirollout::output::Output;
use pirollout::report::ReportEmitter;
use pirollout::rollout::{DeploymentRun, RolloutLock, RunMode};
use pirollout::types::RunId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which rollout to perform.
#[derive(Debug, Clone)]
pub enum Request {
    RunAll,
    RunPhase(String),
    VerifyOnly,
    /// `None` resumes from the latest report of a run that applied phases.
    Resume(Option<RunId>),
}

impl Request {
    fn mode(&self) -> RunMode {
        match self {
            Request::RunAll => RunMode::RunAll,
            Request::RunPhase(_) => RunMode::RunPhase,
            Request::VerifyOnly => RunMode::VerifyOnly,
            Request::Resume(_) => RunMode::Resume,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub dry_run: bool,
    pub force: bool,
}

/// Run the request and return the process exit code.
pub async fn rollout(
    config: Config,
    request: Request,
    options: Options,
    output: Arc<Output>,
    cancel: CancellationToken,
) -> Result<i32> {
    let registry = config.registry()?;
    if let Request::RunPhase(name) = &request {
        registry.get(name)?;
    }

    let emitter = ReportEmitter::new(&config.report_dir);
    let prior = match &request {
        Request::Resume(Some(id)) => Some(emitter.load(id)?),
        Request::Resume(None) => Some(emitter.latest_applied()?.ok_or_else(|| {
            Error::InvalidConfig(format!(
                "no previous rollout to resume in {}",
                emitter.dir().display()
            ))
        })?),
        _ => None,
    };

    let executor = RemoteExecutor::for_host(&config.host, &config.defaults, cancel);
    let controller = build_controller(&config, &registry, &executor, Arc::clone(&output))?;

    if options.dry_run {
        let mut plan = controller.plan(prior.as_ref());
        if let Request::RunPhase(name) = &request {
            plan.retain(|p| p.phase.as_str() == name);
        }
        if matches!(request, Request::VerifyOnly) {
            plan.iter_mut().for_each(|p| p.commands.clear());
        }
        output.plan(&plan);
        return Ok(0);
    }

    let mode = request.mode();
    output.progress(&format!("Starting {} on {}", mode, executor.target()));

    let mut diagnostics = Diagnostics::default();
    let lock = match mode {
        RunMode::VerifyOnly => None,
        _ => Some(RolloutLock::acquire(&executor, &mode.to_string(), options.force).await?),
    };

    let run = match &request {
        Request::RunAll => controller.run_all(&mut diagnostics).await,
        Request::RunPhase(name) => {
            controller
                .run_phase(name, options.force, &mut diagnostics)
                .await?
        }
        Request::VerifyOnly => controller.verify_only(&mut diagnostics).await,
        Request::Resume(_) => {
            let prior: &DeploymentRun = prior
                .as_ref()
                .ok_or_else(|| Error::InvalidConfig("no previous run to resume".to_string()))?;
            output.progress(&format!("Resuming from run {}", prior.id));
            controller.resume(prior, &mut diagnostics).await
        }
    };

    if let Some(lock) = lock
        && let Err(e) = lock.release().await
    {
        diagnostics.warn(Warning::lock_release(e.to_string()));
    }
    if let Err(e) = executor.close().await {
        diagnostics.warn(Warning::ssh_disconnect(e.to_string()));
    }

    let report = emitter.emit(&run)?;
    output.warnings(&diagnostics);
    output.run_summary(&run, Some(&report.path));
    Ok(report.exit_code)
}
