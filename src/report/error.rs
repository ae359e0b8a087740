// ABOUTME: Errors raised while persisting or reading run reports.

use crate::types::RunId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("no report found for run {0}")]
    NotFound(RunId),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("malformed report {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
