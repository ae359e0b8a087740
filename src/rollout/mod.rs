// ABOUTME: Phased rollout: type-state per phase, controller across phases.
// ABOUTME: Exports the controller, result records, policy and the rollout lock.

mod controller;
mod lock;
mod phase_rollout;
mod policy;
mod result;
mod state;

pub use controller::{PlannedPhase, RolloutController, RolloutObserver};
pub use lock::{LockError, LockInfo, RolloutLock};
pub use phase_rollout::PhaseRollout;
pub use policy::RolloutPolicy;
pub use result::{
    DeploymentRun, PhaseFailure, PhaseResult, PhaseStatus, RunMode, RunStatus, SkipReason,
    overall_status,
};
pub use state::{Applied, HealthChecked, Pending, Validated};
