// ABOUTME: Deployment run identifier.
// ABOUTME: Short random hex ids that appear in report file names and on the resume command line.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const RUN_ID_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunIdError {
    #[error("run id must be {RUN_ID_LEN} hex characters, got '{0}'")]
    Malformed(String),
}

/// Identifier of one `DeploymentRun`.
#[must_use = "run ids reference persisted reports and should not be ignored"]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self(simple[..RUN_ID_LEN].to_string())
    }

    pub fn parse(value: &str) -> Result<Self, RunIdError> {
        let value = value.trim();
        if value.len() != RUN_ID_LEN || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RunIdError::Malformed(value.to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = RunIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
