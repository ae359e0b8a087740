// ABOUTME: Variable values exported to compose invocations.
// ABOUTME: Either a literal or a reference to an environment variable on the operator's machine.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// A plain string, or `{ env: NAME, default: ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    /// The literal, or the named variable from this process's environment.
    pub fn resolve(&self) -> Result<String> {
        let (var, default) = match self {
            EnvValue::Literal(value) => return Ok(value.clone()),
            EnvValue::FromEnv { var, default } => (var, default),
        };
        std::env::var(var)
            .ok()
            .or_else(|| default.clone())
            .ok_or_else(|| Error::MissingEnvVar(var.clone()))
    }
}

/// Every variable resolved, in key order. Stops at the first missing one.
pub fn resolve_variables(map: &BTreeMap<String, EnvValue>) -> Result<Vec<(String, String)>> {
    let mut resolved = Vec::with_capacity(map.len());
    for (key, value) in map {
        resolved.push((key.clone(), value.resolve()?));
    }
    Ok(resolved)
}
