// ABOUTME: Wires executor, probes and validator into a controller for one config.
// ABOUTME: Shared by every rollout subcommand.

use pirollout::config::Config;
use pirollout::error::Result;
use pirollout::executor::{ComposeCommands, RemoteExecutor};
use pirollout::health::{HealthGate, RuntimeProbe};
use pirollout::isolation::{IsolationValidator, RuntimeInspector};
use pirollout::output::Output;
use pirollout::registry::PhaseRegistry;
use pirollout::rollout::RolloutController;
use std::sync::Arc;

pub fn build_controller<'r>(
    config: &Config,
    registry: &'r PhaseRegistry,
    executor: &RemoteExecutor,
    output: Arc<Output>,
) -> Result<RolloutController<'r>> {
    let commands = ComposeCommands::from_config(config)?;
    let defaults = &config.defaults;

    let probe = RuntimeProbe::new(
        executor.clone(),
        commands.clone(),
        config.host.probe_address(),
        defaults.probe_timeout,
    );
    let inspector = RuntimeInspector::new(executor.clone(), commands.clone(), defaults.command_timeout);

    Ok(RolloutController::new(
        registry,
        executor.clone(),
        commands,
        HealthGate::new(Arc::new(probe), defaults.poll_interval),
        IsolationValidator::new(Arc::new(inspector)),
    )
    .policy(config.policy)
    .apply_timeout(defaults.apply_timeout)
    .environment(config.environment.clone())
    .observer(output))
}
