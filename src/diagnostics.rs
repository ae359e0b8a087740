// ABOUTME: Non-fatal warnings gathered while a rollout runs.
// ABOUTME: Printed once at the end; none of them changes the run's status.

use crate::types::PhaseName;
use std::fmt;

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning. It is logged immediately and kept for the summary.
    pub fn warn(&mut self, warning: Warning) {
        match &warning.phase {
            Some(phase) => tracing::warn!(kind = %warning.kind, %phase, "{}", warning.message),
            None => tracing::warn!(kind = %warning.kind, "{}", warning.message),
        }
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    /// Phase the warning arose in, when there is one.
    pub phase: Option<PhaseName>,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            phase: None,
            message: message.into(),
        }
    }

    pub fn isolation(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Isolation, message)
    }

    pub fn lock_release(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LockRelease, message)
    }

    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self::new(WarningKind::SshDisconnect, message)
    }

    /// `--force` overrode a dependency check.
    pub fn forced(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Forced, message)
    }

    pub fn in_phase(mut self, phase: &PhaseName) -> Self {
        self.phase = Some(phase.clone());
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.phase {
            Some(phase) => write!(f, "[{}] {}: {}", self.kind, phase, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Wrong or extra network attachment, or a missing required network.
    Isolation,
    /// The lock file may be left behind on the host.
    LockRelease,
    SshDisconnect,
    Forced,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WarningKind::Isolation => "isolation",
            WarningKind::LockRelease => "lock",
            WarningKind::SshDisconnect => "ssh",
            WarningKind::Forced => "forced",
        })
    }
}
