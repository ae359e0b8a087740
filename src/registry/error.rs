// ABOUTME: Phase graph configuration errors.
// ABOUTME: Any of these is fatal before the first phase starts (exit code 3).

use crate::types::{PhaseName, ServiceName};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("phase graph contains a cycle through: {}", join(.phases))]
    Cycle { phases: Vec<PhaseName> },

    #[error("phase '{phase}' depends on undefined phase '{missing}'")]
    UndefinedDependency { phase: PhaseName, missing: PhaseName },

    #[error("phase '{0}' is defined more than once")]
    DuplicatePhase(PhaseName),

    #[error("phases '{first}' and '{second}' share order index {order}")]
    DuplicateOrder {
        order: u32,
        first: PhaseName,
        second: PhaseName,
    },

    #[error(
        "phase '{phase}' (order {order}) depends on '{dependency}' (order {dependency_order}); dependencies must have a lower order"
    )]
    OrderConflict {
        phase: PhaseName,
        order: u32,
        dependency: PhaseName,
        dependency_order: u32,
    },

    #[error("service '{service}' appears in both '{first}' and '{second}'")]
    DuplicateService {
        service: ServiceName,
        first: PhaseName,
        second: PhaseName,
    },

    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("invalid phase catalog: {0}")]
    Catalog(String),
}

fn join(names: &[PhaseName]) -> String {
    names
        .iter()
        .map(PhaseName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
