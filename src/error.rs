// ABOUTME: Application-wide error types for pirollout.
// ABOUTME: Uses thiserror for ergonomic error handling and maps errors to exit codes.

use crate::executor::ExecError;
use crate::registry::ConfigError;
use crate::report::ReportError;
use crate::rollout::LockError;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for configuration problems (bad phase graph, unreadable config).
pub const EXIT_CONFIG: i32 = 3;

/// Exit code for failures outside any phase (lock held, report unwritable).
pub const EXIT_ABORTED: i32 = 2;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Phases(#[from] ConfigError),

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code for an error that ended the program before a report was produced.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::UnknownEnvironment(_)
            | Error::MissingEnvVar(_)
            | Error::InvalidConfig(_)
            | Error::Phases(_)
            | Error::Yaml(_) => EXIT_CONFIG,
            Error::Ssh(_) | Error::Exec(_) | Error::Report(_) | Error::Lock(_) | Error::Io(_) => {
                EXIT_ABORTED
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
