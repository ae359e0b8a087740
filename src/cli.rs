// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and the global flags they share.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pirollout")]
#[command(about = "Phased Docker Compose rollouts onto a Raspberry Pi")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: pirollout.yml in the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Target host: local, host, user@host or user@host:port
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Environment overlay defined in the config
    #[arg(short, long = "env", global = true)]
    pub environment: Option<String>,

    /// Print the plan without executing or persisting anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Fail phases with isolation violations
    #[arg(long, global = true)]
    pub strict_isolation: bool,

    /// Break a held rollout lock and run phases whose dependencies are down
    #[arg(long, global = true)]
    pub force: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print failures and the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// JSON lines output
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Roll out every phase in dependency order
    RunAll,

    /// Roll out a single phase, checking its dependencies once
    RunPhase {
        /// Phase name
        name: String,
    },

    /// Health and isolation checks only; nothing is applied
    VerifyOnly,

    /// Re-run, skipping phases that succeeded in a previous run
    Resume {
        /// Run id of the previous run (default: the latest run that applied phases)
        run_id: Option<String>,
    },

    /// Write a starter pirollout.yml
    Init,

    /// Print the resolved phase order
    Phases,
}
