// ABOUTME: Docker network segment name as declared for a service or phase.
// ABOUTME: Follows the daemon's rule: [a-zA-Z0-9][a-zA-Z0-9_.-]*, capped in length.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Longest name accepted. Compose prefixes project names, so keep headroom.
pub const MAX_NETWORK_NAME: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkNameError {
    #[error("network name cannot be empty")]
    Empty,

    #[error("network name is {0} characters, the limit is {MAX_NETWORK_NAME}")]
    TooLong(usize),

    #[error("network name must start with a letter or digit, not '{0}'")]
    BadStart(char),

    #[error("invalid character in network name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkName(String);

impl NetworkName {
    /// Surrounding whitespace is dropped before checking.
    pub fn new(value: &str) -> Result<Self, NetworkNameError> {
        let name = value.trim();
        let mut chars = name.chars();
        let first = chars.next().ok_or(NetworkNameError::Empty)?;

        if name.len() > MAX_NETWORK_NAME {
            return Err(NetworkNameError::TooLong(name.len()));
        }
        if !first.is_ascii_alphanumeric() {
            return Err(NetworkNameError::BadStart(first));
        }
        if let Some(bad) = chars.find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))) {
            return Err(NetworkNameError::InvalidChar(bad));
        }

        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for NetworkName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl Serialize for NetworkName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NetworkName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NetworkName::new(&raw).map_err(serde::de::Error::custom)
    }
}
