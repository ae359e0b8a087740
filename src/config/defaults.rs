// ABOUTME: Timing defaults shared by every phase.
// ABOUTME: Poll interval, per-attempt probe timeout, connectivity backoff and command timeouts.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Defaults {
    /// Delay between health probe rounds for one service.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Upper bound on a single probe attempt.
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Wait before the single connectivity retry.
    #[serde(default = "default_retry_backoff", with = "humantime_serde")]
    pub retry_backoff: Duration,

    /// Upper bound on applying a phase's compose file.
    #[serde(default = "default_apply_timeout", with = "humantime_serde")]
    pub apply_timeout: Duration,

    /// Upper bound on inspection commands.
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// SSH sessions idle this long are closed by the client.
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(2)
}

fn default_apply_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            poll_interval: default_poll_interval(),
            probe_timeout: default_probe_timeout(),
            retry_backoff: default_retry_backoff(),
            apply_timeout: default_apply_timeout(),
            command_timeout: default_command_timeout(),
            idle_timeout: default_idle_timeout(),
        }
    }
}
