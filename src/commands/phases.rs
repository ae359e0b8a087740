// ABOUTME: `phases` subcommand: prints the resolved rollout order.

use pirollout::error::Result;
use pirollout::output::{Output, OutputMode};
use pirollout::registry::PhaseRegistry;

pub fn phases(registry: &PhaseRegistry, output: &Output) -> Result<i32> {
    if output.mode() == OutputMode::Json {
        let json = serde_json::to_string(registry.ordered_phases())
            .map_err(|e| pirollout::error::Error::InvalidConfig(e.to_string()))?;
        println!("{json}");
        return Ok(0);
    }

    for phase in registry.ordered_phases() {
        let deps: Vec<&str> = phase.depends_on.iter().map(|d| d.as_str()).collect();
        println!(
            "{}. {} (depends on: {}; timeout {:?})",
            phase.order,
            phase.name,
            if deps.is_empty() { "-".to_string() } else { deps.join(", ") },
            phase.health_timeout
        );
        for service in phase.services.iter() {
            println!(
                "   {} :{} {} on {}{}",
                service.name,
                service.port,
                service.priority,
                service.network,
                service.health_path.as_deref().map(|p| format!(" GET {p}")).unwrap_or_default()
            );
        }
    }
    Ok(0)
}
