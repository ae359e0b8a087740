// ABOUTME: Compose-compatible names for services and phases.
// ABOUTME: Lowercase alphanumerics plus hyphen and underscore, at most 63 characters.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name '{0}' exceeds maximum length of 63 characters")]
    TooLong(String),

    #[error("name '{0}' must start with a letter or digit")]
    BadStart(String),

    #[error("name '{0}' must be lowercase")]
    NotLowercase(String),

    #[error("invalid character in name '{name}': '{c}'")]
    InvalidChar { name: String, c: char },
}

fn validate(value: &str) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty);
    }

    if value.len() > 63 {
        return Err(NameError::TooLong(value.to_string()));
    }

    if value.starts_with(['-', '_']) {
        return Err(NameError::BadStart(value.to_string()));
    }

    for c in value.chars() {
        if c.is_ascii_uppercase() {
            return Err(NameError::NotLowercase(value.to_string()));
        }
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
            return Err(NameError::InvalidChar {
                name: value.to_string(),
                c,
            });
        }
    }

    Ok(())
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: &str) -> Result<Self, NameError> {
                validate(value)?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_name!(
    /// Name of a compose service (also its container name on the host).
    ServiceName
);

validated_name!(
    /// Name of a rollout phase.
    PhaseName
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_compose_style_names() {
        assert!(ServiceName::new("lucid-mongodb").is_ok());
        assert!(ServiceName::new("session_api2").is_ok());
        assert!(PhaseName::new("foundation").is_ok());
    }

    #[test]
    fn rejects_uppercase_and_symbols() {
        assert_eq!(
            ServiceName::new("Auth"),
            Err(NameError::NotLowercase("Auth".to_string()))
        );
        assert!(matches!(
            PhaseName::new("core phase"),
            Err(NameError::InvalidChar { c: ' ', .. })
        ));
        assert!(matches!(ServiceName::new("-x"), Err(NameError::BadStart(_))));
        assert_eq!(ServiceName::new(""), Err(NameError::Empty));
    }

    #[test]
    fn deserialize_validates() {
        let ok: ServiceName = serde_json::from_str("\"api-gateway\"").unwrap();
        assert_eq!(ok.as_str(), "api-gateway");

        let err = serde_json::from_str::<ServiceName>("\"API\"").unwrap_err();
        assert!(err.to_string().contains("lowercase"));
    }
}
