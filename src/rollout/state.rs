// ABOUTME: Phase rollout state markers for the type state pattern.
// ABOUTME: Later states carry the data gathered so far.

use crate::health::ServiceResult;
use crate::isolation::IsolationViolation;

/// Selected for rollout, nothing done yet.
/// Available actions: `apply()`, `skip_apply()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending;

/// Compose applied (or deliberately not, in verify-only).
/// Available actions: `health_check()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Applied;

/// Health gate returned.
/// Available actions: `validate_isolation()`
#[derive(Debug, Clone)]
pub struct HealthChecked {
    pub(crate) services: Vec<ServiceResult>,
}

/// Isolation checked.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Validated {
    pub(crate) services: Vec<ServiceResult>,
    pub(crate) violations: Vec<IsolationViolation>,
}
