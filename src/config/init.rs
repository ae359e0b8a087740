// ABOUTME: Config scaffolding for new rollouts.
// ABOUTME: Creates a pirollout.yml template pointing at the target host.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Host};

pub fn init_config(dir: &Path, host: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let host: Host = host
        .unwrap_or("pi@raspberrypi.local")
        .parse()
        .map_err(Error::InvalidConfig)?;

    std::fs::write(&config_path, generate_template_yaml(&host))?;
    Ok(())
}

fn generate_template_yaml(host: &Host) -> String {
    format!(
        r#"host: {host}
runtime: docker
project_dir: ~/lucid

defaults:
  poll_interval: 5s
  probe_timeout: 5s
  retry_backoff: 2s

policy:
  strict_isolation: false
  # Block dependents of degraded phases as well as failed ones.
  block_on_degraded: false

report_dir: .pirollout/reports

# Without a `phases` list the built-in foundation/core/application/support/gui
# catalog is used. Run `pirollout phases` to print it.

environments:
  production:
    env_files:
      - configs/environment/.env.production
"#
    )
}
