// ABOUTME: Rollout policy switches read from config and CLI flags.
// ABOUTME: Controls how isolation violations and degraded phases affect the run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RolloutPolicy {
    /// Any isolation violation fails the phase instead of warning.
    #[serde(default)]
    pub strict_isolation: bool,

    /// Skip dependents of a degraded phase, not only of a failed one.
    #[serde(default)]
    pub block_on_degraded: bool,
}

impl RolloutPolicy {
    pub fn strict_isolation(mut self, strict: bool) -> Self {
        self.strict_isolation = strict;
        self
    }
}
