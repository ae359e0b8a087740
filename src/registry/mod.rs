// ABOUTME: Static catalog of rollout phases and their dependency graph.
// ABOUTME: Validates the graph once and exposes a deterministic topological order.

mod error;

pub use error::ConfigError;

use crate::phase::Phase;
use crate::types::{PhaseName, ServiceName};
use std::collections::{BTreeSet, HashMap, HashSet};

const BUILTIN_CATALOG: &str = include_str!("builtin.yml");

/// Read-only, validated set of phases in execution order.
#[derive(Debug, Clone)]
pub struct PhaseRegistry {
    ordered: Vec<Phase>,
}

impl PhaseRegistry {
    /// Validate `phases` and compute their execution order.
    ///
    /// Among phases whose dependencies are all satisfied, the one with the
    /// lowest order index goes first (ties broken by name), so the result
    /// depends only on the definitions.
    pub fn new(phases: Vec<Phase>) -> Result<Self, ConfigError> {
        check_unique(&phases)?;
        let ordered = topological_order(phases)?;
        check_order_indices(&ordered)?;
        Ok(Self { ordered })
    }

    /// The catalog embedded in the binary.
    pub fn builtin() -> Result<Self, ConfigError> {
        let phases: Vec<Phase> = serde_yaml::from_str(BUILTIN_CATALOG)
            .map_err(|e| ConfigError::Catalog(e.to_string()))?;
        Self::new(phases)
    }

    /// Phases in the order they must execute.
    pub fn ordered_phases(&self) -> &[Phase] {
        &self.ordered
    }

    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.ordered.iter().find(|p| p.name.as_str() == name)
    }

    /// Look up a phase, failing with `UnknownPhase` when it is not defined.
    pub fn get(&self, name: &str) -> Result<&Phase, ConfigError> {
        self.phase(name)
            .ok_or_else(|| ConfigError::UnknownPhase(name.to_string()))
    }

    /// Every phase that depends on `name`, directly or transitively, in execution order.
    pub fn dependents_of(&self, name: &PhaseName) -> Vec<&PhaseName> {
        let mut affected: HashSet<&PhaseName> = HashSet::new();
        affected.insert(name);
        let mut dependents = Vec::new();

        // Execution order guarantees a dependency is visited before its dependents.
        for phase in &self.ordered {
            if phase.depends_on.iter().any(|d| affected.contains(d)) && affected.insert(&phase.name)
            {
                dependents.push(&phase.name);
            }
        }
        dependents
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

fn check_unique(phases: &[Phase]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut orders: HashMap<u32, &PhaseName> = HashMap::new();
    let mut services: HashMap<&ServiceName, &PhaseName> = HashMap::new();

    for phase in phases {
        if !names.insert(&phase.name) {
            return Err(ConfigError::DuplicatePhase(phase.name.clone()));
        }
        if let Some(first) = orders.insert(phase.order, &phase.name) {
            return Err(ConfigError::DuplicateOrder {
                order: phase.order,
                first: first.clone(),
                second: phase.name.clone(),
            });
        }
        for service in phase.services.iter() {
            if let Some(first) = services.insert(&service.name, &phase.name) {
                return Err(ConfigError::DuplicateService {
                    service: service.name.clone(),
                    first: first.clone(),
                    second: phase.name.clone(),
                });
            }
        }
    }

    for phase in phases {
        if let Some(missing) = phase.depends_on.iter().find(|d| !names.contains(d)) {
            return Err(ConfigError::UndefinedDependency {
                phase: phase.name.clone(),
                missing: missing.clone(),
            });
        }
    }

    Ok(())
}

/// Kahn's algorithm with an ordered ready set.
fn topological_order(phases: Vec<Phase>) -> Result<Vec<Phase>, ConfigError> {
    let index: HashMap<PhaseName, usize> = phases
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.clone(), i))
        .collect();

    let mut remaining: Vec<usize> = phases.iter().map(|p| p.depends_on.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); phases.len()];
    for (i, phase) in phases.iter().enumerate() {
        for dep in &phase.depends_on {
            dependents[index[dep]].push(i);
        }
    }

    let key = |i: usize| (phases[i].order, phases[i].name.clone(), i);
    let mut ready: BTreeSet<(u32, PhaseName, usize)> = remaining
        .iter()
        .enumerate()
        .filter(|(_, n)| **n == 0)
        .map(|(i, _)| key(i))
        .collect();

    let mut sequence = Vec::with_capacity(phases.len());
    while let Some((_, _, i)) = ready.pop_first() {
        sequence.push(i);
        for &d in &dependents[i] {
            remaining[d] -= 1;
            if remaining[d] == 0 {
                ready.insert(key(d));
            }
        }
    }

    if sequence.len() != phases.len() {
        let mut stuck: Vec<PhaseName> = remaining
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .map(|(i, _)| phases[i].name.clone())
            .collect();
        stuck.sort();
        return Err(ConfigError::Cycle { phases: stuck });
    }

    let mut slots: Vec<Option<Phase>> = phases.into_iter().map(Some).collect();
    Ok(sequence
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

fn check_order_indices(ordered: &[Phase]) -> Result<(), ConfigError> {
    let orders: HashMap<&PhaseName, u32> = ordered.iter().map(|p| (&p.name, p.order)).collect();
    for phase in ordered {
        for dep in &phase.depends_on {
            let dependency_order = orders[dep];
            if dependency_order >= phase.order {
                return Err(ConfigError::OrderConflict {
                    phase: phase.name.clone(),
                    order: phase.order,
                    dependency: dep.clone(),
                    dependency_order,
                });
            }
        }
    }
    Ok(())
}
