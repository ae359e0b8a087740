// ABOUTME: Health gate: waits for a phase's services to report healthy within a deadline.
// ABOUTME: Probing sits behind the HealthProbe trait so tests can script service behavior.

mod gate;
mod probe;
mod status;

pub use gate::HealthGate;
pub use probe::{
    HealthProbe, HttpOutcome, Observation, ProbeError, RuntimeProbe, http_probe, observe,
    parse_container_state,
};
pub use status::{ContainerStatus, HealthStatus, OverallStatus, ServiceResult};
