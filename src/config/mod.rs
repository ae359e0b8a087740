// ABOUTME: Configuration types and parsing for pirollout.yml.
// ABOUTME: Handles YAML parsing, variable interpolation, and environment overlays.

mod defaults;
mod env_value;
mod host;
mod init;

pub use defaults::Defaults;
pub use env_value::{EnvValue, resolve_variables};
pub use host::{Host, ServerConfig};
pub use init::init_config;

use crate::error::{Error, Result};
use crate::phase::Phase;
use crate::registry::{ConfigError, PhaseRegistry};
use crate::rollout::RolloutPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "pirollout.yml";
pub const CONFIG_FILENAME_ALT: &str = "pirollout.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".pirollout/config.yml";

/// Container engine whose compose plugin and CLI drive the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    #[default]
    Docker,
    Podman,
}

impl Runtime {
    pub fn binary(self) -> &'static str {
        match self {
            Runtime::Docker => "docker",
            Runtime::Podman => "podman",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host: Host,

    #[serde(default)]
    pub runtime: Runtime,

    /// Directory on the host the compose paths are relative to.
    #[serde(default = "default_project_dir")]
    pub project_dir: String,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub policy: RolloutPolicy,

    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Exported in front of every compose invocation.
    #[serde(default)]
    pub variables: BTreeMap<String, EnvValue>,

    /// Appended to every phase's env files.
    #[serde(default)]
    pub extra_env_files: Vec<String>,

    /// Phase catalog; the built-in one is used when absent.
    #[serde(default)]
    pub phases: Option<Vec<Phase>>,

    #[serde(default)]
    pub environments: HashMap<String, Environment>,

    /// Name of the applied environment overlay, if any.
    #[serde(skip)]
    pub environment: Option<String>,
}

/// Named overlay applied with `--env`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Environment {
    #[serde(default)]
    pub host: Option<Host>,

    #[serde(default)]
    pub project_dir: Option<String>,

    #[serde(default)]
    pub variables: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub env_files: Vec<String>,

    #[serde(default)]
    pub policy: Option<RolloutPolicy>,
}

fn default_project_dir() -> String {
    "~/lucid".to_string()
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(".pirollout/reports")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: Host::default(),
            runtime: Runtime::default(),
            project_dir: default_project_dir(),
            defaults: Defaults::default(),
            policy: RolloutPolicy::default(),
            report_dir: default_report_dir(),
            variables: BTreeMap::new(),
            extra_env_files: Vec::new(),
            phases: None,
            environments: HashMap::new(),
            environment: None,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn for_environment(&self, name: &str) -> Result<Config> {
        let env = self
            .environments
            .get(name)
            .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))?;

        let mut merged = self.clone();

        if let Some(ref host) = env.host {
            merged.host = host.clone();
        }

        if let Some(ref dir) = env.project_dir {
            merged.project_dir = dir.clone();
        }

        for (k, v) in &env.variables {
            merged.variables.insert(k.clone(), v.clone());
        }

        merged.extra_env_files.extend(env.env_files.iter().cloned());

        if let Some(policy) = env.policy {
            merged.policy = policy;
        }

        merged.environment = Some(name.to_string());
        Ok(merged)
    }

    /// Build and validate the phase registry this configuration describes.
    pub fn registry(&self) -> std::result::Result<PhaseRegistry, ConfigError> {
        match &self.phases {
            Some(phases) => PhaseRegistry::new(phases.clone()),
            None => PhaseRegistry::builtin(),
        }
    }
}
