// ABOUTME: Rollout lock preventing two concurrent rollouts onto the same host.
// ABOUTME: Created atomically with shell noclobber under ~/.local/state/pirollout/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::executor::{ExecError, RemoteExecutor};

const STATE_DIR: &str = ".local/state/pirollout";
const LOCK_FILE: &str = "rollout.lock";
const LOCK_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("rollout lock held by {holder} (pid {pid}) since {started_at}; use --force to break it")]
    Held {
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("rollout lock: {0}")]
    Failed(String),

    #[error("rollout lock: {0}")]
    Exec(#[from] ExecError),
}

/// Who holds the rollout lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    /// Run mode that took the lock.
    pub mode: String,
}

impl LockInfo {
    pub fn new(mode: &str) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            mode: mode.to_string(),
        }
    }

    /// Older than one hour.
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Uses $HOME so the path expands inside double quotes.
    pub fn lock_path() -> String {
        format!("$HOME/{}/{}", STATE_DIR, LOCK_FILE)
    }
}

/// A held rollout lock. Call `release` when the run ends, cancelled or not.
pub struct RolloutLock {
    executor: RemoteExecutor,
}

impl std::fmt::Debug for RolloutLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolloutLock")
            .field("target", &self.executor.target())
            .finish()
    }
}

impl RolloutLock {
    /// Take the lock, breaking it if stale or if `force` is set.
    pub async fn acquire(
        executor: &RemoteExecutor,
        mode: &str,
        force: bool,
    ) -> Result<Self, LockError> {
        let lock_path = LockInfo::lock_path();
        let mkdir = executor
            .execute(&format!("mkdir -p ~/{}", STATE_DIR), LOCK_COMMAND_TIMEOUT)
            .await?;
        if !mkdir.success() {
            return Err(LockError::Failed(format!(
                "failed to create state directory: {}",
                mkdir.stderr.trim()
            )));
        }

        let info = serde_json::to_string(&LockInfo::new(mode))
            .map_err(|e| LockError::Failed(format!("failed to serialize lock: {}", e)))?;
        // set -C makes > fail when the file exists
        let acquire_cmd = format!(
            "(set -C; echo '{}' > \"{}\") 2>/dev/null",
            info.replace('\'', "'\\''"),
            lock_path
        );

        if executor.execute(&acquire_cmd, LOCK_COMMAND_TIMEOUT).await?.success() {
            return Ok(Self::held(executor));
        }

        let existing = read_lock(executor, &lock_path).await?;
        match existing {
            Some(existing) if !force && !existing.is_stale() => {
                return Err(LockError::Held {
                    holder: existing.holder,
                    pid: existing.pid,
                    started_at: existing.started_at,
                });
            }
            Some(existing) => tracing::warn!(
                "breaking {} lock held by {} (pid {}) since {}",
                if force { "forced" } else { "stale" },
                existing.holder,
                existing.pid,
                existing.started_at
            ),
            None => tracing::warn!("lock info unreadable, breaking lock"),
        }

        executor
            .execute(&format!("rm -f \"{}\"", lock_path), LOCK_COMMAND_TIMEOUT)
            .await?;
        if !executor.execute(&acquire_cmd, LOCK_COMMAND_TIMEOUT).await?.success() {
            return Err(LockError::Failed(
                "lock taken by another process while breaking it".to_string(),
            ));
        }
        Ok(Self::held(executor))
    }

    fn held(executor: &RemoteExecutor) -> Self {
        Self {
            executor: executor.detached(),
        }
    }

    pub async fn release(self) -> Result<(), LockError> {
        let output = self
            .executor
            .execute(
                &format!("rm -f \"{}\"", LockInfo::lock_path()),
                LOCK_COMMAND_TIMEOUT,
            )
            .await?;
        if !output.success() {
            return Err(LockError::Failed(format!(
                "failed to remove lock file: {}",
                output.stderr.trim()
            )));
        }
        Ok(())
    }
}

/// `None` when the lock file is unreadable or corrupted.
async fn read_lock(executor: &RemoteExecutor, lock_path: &str) -> Result<Option<LockInfo>, LockError> {
    let output = executor
        .execute(&format!("cat \"{}\"", lock_path), LOCK_COMMAND_TIMEOUT)
        .await?;
    if !output.success() {
        return Ok(None);
    }
    Ok(serde_json::from_str(output.stdout.trim()).ok())
}
