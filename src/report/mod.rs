// ABOUTME: Persists each DeploymentRun as an immutable JSON report.
// ABOUTME: Reports are never rewritten; resume reads them back by run id.

mod error;

pub use error::ReportError;

use crate::rollout::DeploymentRun;
use crate::types::RunId;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const PREFIX: &str = "run-";
const SUFFIX: &str = ".json";

/// Where a report was written and the exit code it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRef {
    pub path: PathBuf,
    pub exit_code: i32,
}

#[derive(Debug, Clone)]
pub struct ReportEmitter {
    dir: PathBuf,
}

impl ReportEmitter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `run` to `<dir>/run-<yyyymmddTHHMMSSZ>-<id>.json`.
    ///
    /// # Errors
    ///
    /// `ReportError::AlreadyExists` if that file is already there; it is left untouched.
    pub fn emit(&self, run: &DeploymentRun) -> Result<ReportRef, ReportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ReportError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(file_name(run));
        let body = serde_json::to_vec_pretty(run).map_err(ReportError::Serialize)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::AlreadyExists => ReportError::AlreadyExists(path.clone()),
                _ => ReportError::Io {
                    path: path.clone(),
                    source,
                },
            })?;
        file.write_all(&body)
            .and_then(|()| file.write_all(b"\n"))
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), run_id = %run.id, "report written");
        Ok(ReportRef {
            path,
            exit_code: exit_code(run),
        })
    }

    /// Read back the report of `run_id`.
    pub fn load(&self, run_id: &RunId) -> Result<DeploymentRun, ReportError> {
        let wanted = format!("-{}{}", run_id, SUFFIX);
        let path = self
            .report_files()?
            .into_iter()
            .find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(&wanted))
            })
            .ok_or_else(|| ReportError::NotFound(run_id.clone()))?;
        read_report(&path)
    }

    /// The most recent report, if any.
    pub fn latest(&self) -> Result<Option<DeploymentRun>, ReportError> {
        match self.report_files()?.last() {
            Some(path) => read_report(path).map(Some),
            None => Ok(None),
        }
    }

    /// The most recent report of a run that applied phases. Verify-only runs are passed over.
    pub fn latest_applied(&self) -> Result<Option<DeploymentRun>, ReportError> {
        for path in self.report_files()?.iter().rev() {
            let run = read_report(path)?;
            if run.mode.applies() {
                return Ok(Some(run));
            }
        }
        Ok(None)
    }

    /// Report files sorted oldest first. A missing directory has none.
    pub fn report_files(&self) -> Result<Vec<PathBuf>, ReportError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ReportError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(PREFIX) && n.ends_with(SUFFIX))
            })
            .collect();
        // The timestamp leads the name, so lexical order is chronological.
        files.sort();
        Ok(files)
    }
}

/// 0 completed, 1 completed with degraded phases, 2 aborted.
pub fn exit_code(run: &DeploymentRun) -> i32 {
    run.status.exit_code()
}

pub fn file_name(run: &DeploymentRun) -> String {
    format!(
        "{}{}-{}{}",
        PREFIX,
        run.started_at.format("%Y%m%dT%H%M%SZ"),
        run.id,
        SUFFIX
    )
}

fn read_report(path: &Path) -> Result<DeploymentRun, ReportError> {
    let content = fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ReportError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
