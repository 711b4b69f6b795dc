//! # packs CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use packs_cli::config::{run_config, ConfigArgs};
use packs_cli::jobs::{run_jobs, JobsArgs};
use packs_cli::screen::{run_screen, ScreenArgs};
use packs_cli::split::{run_split, SplitArgs};

/// Packs operator CLI
///
/// Offline tools for the token economy: split previews, abuse screening,
/// policy validation, and the job catalog.
#[derive(Parser, Debug)]
#[command(name = "packs", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// YAML policy file used by `screen`.
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Preview how an amount divides between recipient and platform.
    Split(SplitArgs),

    /// Run the abuse firewall over a message.
    Screen(ScreenArgs),

    /// Policy file operations.
    Config(ConfigArgs),

    /// List job schedules and their next run.
    Jobs(JobsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("packs CLI starting");

    let result = match &cli.command {
        Commands::Split(args) => run_split(args),
        Commands::Screen(args) => run_screen(args, cli.policy.as_deref()),
        Commands::Config(args) => run_config(args),
        Commands::Jobs(args) => run_jobs(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
