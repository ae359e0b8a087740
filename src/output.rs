// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON-lines output modes.

use crate::diagnostics::Diagnostics;
use crate::health::OverallStatus;
use crate::phase::Phase;
use crate::rollout::{DeploymentRun, PhaseResult, PhaseStatus, PlannedPhase, RolloutObserver};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
#[derive(Debug)]
pub struct Output {
    mode: OutputMode,
    start_time: Instant,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: Instant::now(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => emit_stderr(&JsonEvent::message("error", message)),
        }
    }

    /// Print collected warnings once the run is over.
    pub fn warnings(&self, diagnostics: &Diagnostics) {
        for warning in diagnostics.warnings() {
            match self.mode {
                OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning {warning}"),
                OutputMode::Json => emit_stderr(&WarningEvent {
                    event: "warning",
                    kind: warning.kind.to_string(),
                    phase: warning.phase.as_ref().map(|p| p.as_str()),
                    message: &warning.message,
                }),
            }
        }
    }

    /// Final line for a run, pointing at its report.
    pub fn run_summary(&self, run: &DeploymentRun, report: Option<&Path>) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                println!(
                    "Run {} {} ({}) in {:.1}s",
                    run.id,
                    run.status,
                    summarize(run),
                    self.elapsed_secs()
                );
                if let Some(path) = report
                    && self.mode == OutputMode::Normal
                {
                    println!("Report: {}", path.display());
                }
            }
            OutputMode::Json => {
                let event = RunEvent {
                    event: "run",
                    run_id: run.id.as_str(),
                    status: run.status.to_string(),
                    exit_code: run.exit_code,
                    report: report.map(|p| p.display().to_string()),
                    duration_secs: self.elapsed_secs(),
                };
                emit_stdout(&event);
            }
        }
    }

    /// Print a dry-run plan.
    pub fn plan(&self, plan: &[PlannedPhase]) {
        match self.mode {
            OutputMode::Json => {
                for entry in plan {
                    emit_stdout(&PlanEvent {
                        event: "plan",
                        entry,
                    });
                }
            }
            OutputMode::Normal | OutputMode::Quiet => {
                for entry in plan {
                    match &entry.skip_reason {
                        Some(reason) => println!("{}. {} (skip: {})", entry.order, entry.phase, reason),
                        None => println!(
                            "{}. {} (health timeout {:?})",
                            entry.order, entry.phase, entry.health_timeout
                        ),
                    }
                    for command in &entry.commands {
                        println!("   $ {command}");
                    }
                }
            }
        }
    }
}

impl RolloutObserver for Output {
    fn phase_started(&self, phase: &Phase) {
        match self.mode {
            OutputMode::Normal => println!(
                "==> {} ({} services, timeout {:?})",
                phase.name,
                phase.services.len(),
                phase.health_timeout
            ),
            OutputMode::Quiet => {}
            OutputMode::Json => emit_stdout(&PhaseEvent {
                event: "phase_started",
                phase: phase.name.as_str(),
                status: None,
                detail: None,
            }),
        }
    }

    fn phase_finished(&self, result: &PhaseResult) {
        let detail = result
            .failure
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| result.skip_reason.as_ref().map(ToString::to_string));

        match self.mode {
            OutputMode::Normal => {
                for service in &result.services {
                    if service.overall_status != OverallStatus::Healthy {
                        println!(
                            "    {} {} ({})",
                            service.service,
                            service.overall_status,
                            service.detail.as_deref().unwrap_or("no detail")
                        );
                    }
                }
                match &detail {
                    Some(detail) => println!("    {} {}: {}", marker(result.status), result.phase, detail),
                    None => println!("    {} {}", marker(result.status), result.phase),
                }
            }
            OutputMode::Quiet => {
                if matches!(result.status, PhaseStatus::Failed | PhaseStatus::Degraded) {
                    println!("{} {}", result.phase, result.status);
                }
            }
            OutputMode::Json => emit_stdout(&PhaseEvent {
                event: "phase_finished",
                phase: result.phase.as_str(),
                status: Some(result.status.to_string()),
                detail,
            }),
        }
    }
}

fn marker(status: PhaseStatus) -> &'static str {
    match status {
        PhaseStatus::Succeeded => "ok",
        PhaseStatus::Degraded => "degraded",
        PhaseStatus::Failed => "FAILED",
        PhaseStatus::Skipped => "skipped",
        PhaseStatus::Pending | PhaseStatus::Running => "..",
    }
}

fn summarize(run: &DeploymentRun) -> String {
    let count = |status: PhaseStatus| run.phases.iter().filter(|p| p.status == status).count();
    format!(
        "{} succeeded, {} degraded, {} failed, {} skipped",
        count(PhaseStatus::Succeeded),
        count(PhaseStatus::Degraded),
        count(PhaseStatus::Failed),
        count(PhaseStatus::Skipped)
    )
}

fn emit_stdout<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

fn emit_stderr<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        eprintln!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
}

impl<'a> JsonEvent<'a> {
    fn message(event: &'a str, message: &'a str) -> Self {
        Self { event, message }
    }
}

#[derive(Serialize)]
struct WarningEvent<'a> {
    event: &'a str,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<&'a str>,
    message: &'a str,
}

#[derive(Serialize)]
struct PhaseEvent<'a> {
    event: &'a str,
    phase: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Serialize)]
struct RunEvent<'a> {
    event: &'a str,
    run_id: &'a str,
    status: String,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,
    duration_secs: f64,
}

#[derive(Serialize)]
struct PlanEvent<'a> {
    event: &'a str,
    #[serde(flatten)]
    entry: &'a PlannedPhase,
}
