// ABOUTME: Validated identifiers for phases, services, networks and runs.
// ABOUTME: Names are checked at load time so typos fail before any phase starts.

mod id;
mod network_name;
mod service_name;

pub use id::{RunId, RunIdError};
pub use network_name::{NetworkName, NetworkNameError};
pub use service_name::{NameError, PhaseName, ServiceName};
