// ABOUTME: Integration tests for configuration parsing and environment overlays.
// ABOUTME: Tests YAML parsing, env var interpolation, host forms and phase catalogs.

use pirollout::config::*;
use pirollout::error::Error;
use pirollout::executor::ComposeCommands;
use pirollout::registry::ConfigError;
use std::collections::BTreeMap;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.host, Host::Local);
        assert_eq!(config.runtime, Runtime::Docker);
        assert_eq!(config.project_dir, "~/lucid");
        assert_eq!(config.defaults, Defaults::default());
        assert!(!config.policy.strict_isolation);
        assert!(config.phases.is_none());
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
host: pi@192.168.0.75:2222
runtime: podman
project_dir: /opt/lucid

defaults:
  poll_interval: 2s
  probe_timeout: 3s
  retry_backoff: 1s
  apply_timeout: 5m

policy:
  strict_isolation: true

report_dir: /var/lib/pirollout

variables:
  LUCID_PLATFORM: arm64
  MONGO_PASSWORD:
    env: MONGO_PASSWORD

extra_env_files:
  - configs/environment/.env.secrets
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let Host::Remote(server) = &config.host else {
            panic!("expected remote host");
        };
        assert_eq!(server.user.as_deref(), Some("pi"));
        assert_eq!(server.port, 2222);
        assert_eq!(config.runtime, Runtime::Podman);
        assert_eq!(config.defaults.poll_interval, Duration::from_secs(2));
        assert_eq!(config.defaults.apply_timeout, Duration::from_secs(300));
        assert_eq!(config.defaults.command_timeout, Duration::from_secs(60));
        assert!(config.policy.strict_isolation);
        assert!(!config.policy.block_on_degraded);
        assert_eq!(
            config.variables.get("LUCID_PLATFORM"),
            Some(&EnvValue::Literal("arm64".to_string()))
        );
        assert_eq!(
            config.variables.get("MONGO_PASSWORD"),
            Some(&EnvValue::FromEnv {
                var: "MONGO_PASSWORD".to_string(),
                default: None
            })
        );
        assert_eq!(config.extra_env_files, vec!["configs/environment/.env.secrets"]);
    }

    #[test]
    fn unknown_runtime_is_rejected() {
        assert!(Config::from_yaml("runtime: containerd").is_err());
    }

    #[test]
    fn bad_host_is_rejected() {
        assert!(Config::from_yaml("host: pi@raspberrypi:ssh").is_err());
    }
}

mod phases {
    use super::*;

    #[test]
    fn builtin_catalog_when_phases_absent() {
        let registry = Config::default().registry().unwrap();
        assert_eq!(registry.ordered_phases()[0].name.as_str(), "foundation");
    }

    #[test]
    fn inline_catalog_is_validated() {
        let yaml = r#"
phases:
  - name: core
    order: 2
    compose: core.yml
    depends_on: [foundation]
    services:
      - name: api-gateway
        port: 8080
        priority: critical
        network: lucid-pi-network
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.registry(),
            Err(ConfigError::UndefinedDependency { .. })
        ));
    }

    #[test]
    fn phase_with_bad_service_name_fails_to_parse() {
        let yaml = r#"
phases:
  - name: core
    order: 1
    compose: core.yml
    services:
      - name: API_Gateway
        port: 8080
        priority: critical
        network: lucid-pi-network
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }
}

mod environments {
    use super::*;

    const WITH_ENVIRONMENTS: &str = r#"
host: pi@lucid-dev.local
variables:
  LUCID_ENV: development
  LOG_LEVEL: debug
environments:
  production:
    host: pi@lucid.local
    project_dir: /srv/lucid
    variables:
      LUCID_ENV: production
    env_files:
      - configs/environment/.env.production
    policy:
      strict_isolation: true
      block_on_degraded: true
"#;

    #[test]
    fn overlay_replaces_and_merges() {
        let config = Config::from_yaml(WITH_ENVIRONMENTS).unwrap();
        let prod = config.for_environment("production").unwrap();

        assert_eq!(prod.host, "pi@lucid.local".parse::<Host>().unwrap());
        assert_eq!(prod.project_dir, "/srv/lucid");
        assert_eq!(
            prod.variables.get("LUCID_ENV"),
            Some(&EnvValue::Literal("production".into()))
        );
        assert_eq!(
            prod.variables.get("LOG_LEVEL"),
            Some(&EnvValue::Literal("debug".into()))
        );
        assert_eq!(prod.extra_env_files, vec!["configs/environment/.env.production"]);
        assert!(prod.policy.strict_isolation);
        assert!(prod.policy.block_on_degraded);
        assert_eq!(prod.environment.as_deref(), Some("production"));
    }

    #[test]
    fn base_config_is_unchanged_by_overlay() {
        let config = Config::from_yaml(WITH_ENVIRONMENTS).unwrap();
        let _ = config.for_environment("production").unwrap();
        assert_eq!(config.host, "pi@lucid-dev.local".parse::<Host>().unwrap());
        assert!(config.environment.is_none());
    }

    #[test]
    fn unknown_environment() {
        let config = Config::from_yaml(WITH_ENVIRONMENTS).unwrap();
        assert!(matches!(
            config.for_environment("staging"),
            Err(Error::UnknownEnvironment(name)) if name == "staging"
        ));
    }
}

mod variables {
    use super::*;

    fn vars(yaml: &str) -> BTreeMap<String, EnvValue> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn env_reference_resolves_from_environment() {
        temp_env::with_var("PIROLLOUT_TEST_SECRET", Some("s3cret"), || {
            let resolved = resolve_variables(&vars("SECRET: { env: PIROLLOUT_TEST_SECRET }")).unwrap();
            assert_eq!(resolved, vec![("SECRET".to_string(), "s3cret".to_string())]);
        });
    }

    #[test]
    fn env_reference_falls_back_to_default() {
        temp_env::with_var_unset("PIROLLOUT_TEST_UNSET", || {
            let resolved = resolve_variables(&vars(
                "TZ: { env: PIROLLOUT_TEST_UNSET, default: Europe/London }",
            ))
            .unwrap();
            assert_eq!(resolved[0].1, "Europe/London");
        });
    }

    #[test]
    fn missing_env_reference_is_an_error() {
        temp_env::with_var_unset("PIROLLOUT_TEST_MISSING", || {
            let err = resolve_variables(&vars("X: { env: PIROLLOUT_TEST_MISSING }")).unwrap_err();
            assert!(matches!(err, Error::MissingEnvVar(ref var) if var == "PIROLLOUT_TEST_MISSING"));
            assert_eq!(err.exit_code(), 3);
        });
    }

    #[test]
    fn compose_commands_export_resolved_variables() {
        temp_env::with_var("PIROLLOUT_TEST_TAG", Some("v2.1"), || {
            let config = Config::from_yaml(
                r#"
variables:
  IMAGE_TAG: { env: PIROLLOUT_TEST_TAG }
  LUCID_ENV: pi prod
"#,
            )
            .unwrap();
            let registry = config.registry().unwrap();
            let commands = ComposeCommands::from_config(&config).unwrap();
            let line = commands.apply(&registry.ordered_phases()[0]);
            assert!(line.contains("IMAGE_TAG=v2.1 LUCID_ENV='pi prod' docker compose"));
        });
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_config_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "runtime: podman\n").unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.runtime, Runtime::Podman);
    }

    #[test]
    fn falls_back_to_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".pirollout")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), "project_dir: /tmp/x\n").unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.project_dir, "/tmp/x");
    }

    #[test]
    fn missing_config_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn init_writes_a_loadable_template() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("pi@10.0.0.9"), false).unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.host, "pi@10.0.0.9".parse::<Host>().unwrap());
        assert!(config.for_environment("production").is_ok());

        assert!(matches!(
            init_config(dir.path(), None, false),
            Err(Error::AlreadyExists(_))
        ));
        assert!(init_config(dir.path(), None, true).is_ok());
    }
}
