// ABOUTME: Entry point for the pirollout CLI application.
// ABOUTME: Parses arguments, loads configuration and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use pirollout::config::{self, Config, Host};
use pirollout::error::{Error, Result};
use pirollout::output::{Output, OutputMode};
use pirollout::registry::PhaseRegistry;
use pirollout::types::RunId;
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins unless --verbose asks for debug.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Arc::new(Output::new(mode));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            on_signal.cancel();
        }
    });

    let code = match run(cli, Arc::clone(&output), cancel).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, output: Arc<Output>, cancel: CancellationToken) -> Result<i32> {
    let request = match &cli.command {
        Commands::Init => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, cli.host.as_deref(), cli.force)?;
            output.progress(&format!("Wrote {}", cwd.join(config::CONFIG_FILENAME).display()));
            return Ok(0);
        }
        Commands::Phases => {
            let registry = match load_config(&cli) {
                Ok(config) => config.registry()?,
                Err(Error::ConfigNotFound(_)) => PhaseRegistry::builtin()?,
                Err(e) => return Err(e),
            };
            return commands::phases(&registry, &output);
        }
        Commands::RunAll => commands::Request::RunAll,
        Commands::RunPhase { name } => commands::Request::RunPhase(name.clone()),
        Commands::VerifyOnly => commands::Request::VerifyOnly,
        Commands::Resume { run_id } => {
            let run_id = run_id
                .as_deref()
                .map(RunId::parse)
                .transpose()
                .map_err(|e| Error::InvalidConfig(e.to_string()))?;
            commands::Request::Resume(run_id)
        }
    };

    let config = load_config(&cli)?;
    let options = commands::Options {
        dry_run: cli.dry_run,
        force: cli.force,
    };
    commands::rollout(config, request, options, output, cancel).await
}

/// Config file, then `--env` overlay, then flag overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) if !path.exists() => return Err(Error::ConfigNotFound(path.clone())),
        Some(path) => Config::load(path)?,
        None => Config::discover(&env::current_dir()?)?,
    };

    let mut config = match &cli.environment {
        Some(name) => config.for_environment(name)?,
        None => config,
    };

    if let Some(host) = &cli.host {
        config.host = host.parse::<Host>().map_err(Error::InvalidConfig)?;
    }
    if cli.strict_isolation {
        config.policy = config.policy.strict_isolation(true);
    }
    Ok(config)
}
