// ABOUTME: Shell command lines for applying phases and inspecting containers and networks.
// ABOUTME: Every interpolated argument is single-quoted for POSIX sh.

use crate::config::{Config, Runtime, resolve_variables};
use crate::error::Result;
use crate::phase::Phase;
use crate::types::{NetworkName, ServiceName};

/// Quote `s` as a single shell word.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// `~/dir` keeps the tilde outside the quotes so the remote shell expands it.
fn quote_dir(dir: &str) -> String {
    match dir.strip_prefix("~/") {
        Some(rest) if !rest.is_empty() => format!("~/{}", shell_quote(rest)),
        _ if dir == "~" => "~".to_string(),
        _ => shell_quote(dir),
    }
}

/// Builds the command lines the controller and probes run on the host.
#[derive(Debug, Clone)]
pub struct ComposeCommands {
    runtime: Runtime,
    project_dir: String,
    variables: Vec<(String, String)>,
    extra_env_files: Vec<String>,
}

impl ComposeCommands {
    pub fn new(
        runtime: Runtime,
        project_dir: impl Into<String>,
        variables: Vec<(String, String)>,
        extra_env_files: Vec<String>,
    ) -> Self {
        Self {
            runtime,
            project_dir: project_dir.into(),
            variables,
            extra_env_files,
        }
    }

    /// Resolves the configured variables; a missing environment variable is an error.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.runtime,
            config.project_dir.clone(),
            resolve_variables(&config.variables)?,
            config.extra_env_files.clone(),
        ))
    }

    /// `cd <project> && [VARS] docker compose -f <compose> --env-file <f>... up -d <services>`
    pub fn apply(&self, phase: &Phase) -> String {
        let mut cmd = format!("cd {} && ", quote_dir(&self.project_dir));

        for (key, value) in &self.variables {
            cmd.push_str(&format!("{}={} ", key, shell_quote(value)));
        }

        cmd.push_str(&format!(
            "{} compose -f {}",
            self.runtime.binary(),
            shell_quote(&phase.compose)
        ));

        for env_file in phase.env_files.iter().chain(&self.extra_env_files) {
            cmd.push_str(&format!(" --env-file {}", shell_quote(env_file)));
        }

        cmd.push_str(" up -d");
        for service in phase.service_names() {
            cmd.push(' ');
            cmd.push_str(&shell_quote(service.as_str()));
        }
        cmd
    }

    /// Prints the container state (`running`, `exited`, ...).
    pub fn container_state(&self, service: &ServiceName) -> String {
        format!(
            "{} inspect --format {} {}",
            self.runtime.binary(),
            shell_quote("{{.State.Status}}"),
            shell_quote(service.as_str())
        )
    }

    /// Prints the container's networks as a JSON object keyed by network name.
    pub fn container_networks(&self, service: &ServiceName) -> String {
        format!(
            "{} inspect --format {} {}",
            self.runtime.binary(),
            shell_quote("{{json .NetworkSettings.Networks}}"),
            shell_quote(service.as_str())
        )
    }

    /// Prints `true` or `false` for the network's internal flag; fails if it does not exist.
    pub fn network_internal(&self, network: &NetworkName) -> String {
        format!(
            "{} network inspect --format {} {}",
            self.runtime.binary(),
            shell_quote("{{.Internal}}"),
            shell_quote(network.as_str())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PhaseRegistry;

    fn commands() -> ComposeCommands {
        ComposeCommands::new(
            Runtime::Docker,
            "~/lucid",
            vec![("LUCID_ENV".into(), "pi prod".into())],
            vec!["configs/environment/.env.production".into()],
        )
    }

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(shell_quote("lucid-redis"), "lucid-redis");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
    }

    #[test]
    fn project_dir_keeps_tilde_expandable() {
        assert_eq!(quote_dir("~/lucid"), "~/lucid");
        assert_eq!(quote_dir("~/my stack"), "~/'my stack'");
        assert_eq!(quote_dir("/opt/lucid"), "/opt/lucid");
    }

    #[test]
    fn apply_lists_env_files_and_services() {
        let registry = PhaseRegistry::builtin().unwrap();
        let foundation = registry.phase("foundation").unwrap();
        let cmd = commands().apply(foundation);

        assert!(cmd.starts_with("cd ~/lucid && LUCID_ENV='pi prod' docker compose -f "));
        assert!(cmd.contains(" --env-file configs/environment/.env.production"));
        assert!(cmd.contains(" up -d lucid-mongodb lucid-redis"));
        assert!(cmd.ends_with("lucid-auth-service"));
        assert!(!cmd.contains("--remove-orphans"));
    }

    #[test]
    fn phase_env_files_come_before_extra_ones() {
        let registry = PhaseRegistry::builtin().unwrap();
        let foundation = registry.phase("foundation").unwrap();
        let cmd = commands().apply(foundation);
        let extra = cmd.find(".env.production").unwrap();
        for own in &foundation.env_files {
            assert!(cmd.find(own.as_str()).unwrap() < extra);
        }
    }

    #[test]
    fn inspection_commands_use_runtime_binary() {
        let cmds = ComposeCommands::new(Runtime::Podman, "/srv", vec![], vec![]);
        let svc = ServiceName::new("lucid-redis").unwrap();
        assert_eq!(
            cmds.container_state(&svc),
            "podman inspect --format '{{.State.Status}}' lucid-redis"
        );
        let net = NetworkName::new("lucid-pi-network").unwrap();
        assert_eq!(
            cmds.network_internal(&net),
            "podman network inspect --format '{{.Internal}}' lucid-pi-network"
        );
    }
}
