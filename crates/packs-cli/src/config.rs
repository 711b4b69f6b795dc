//! # Policy Validation
//!
//! `packs config check <file>` parses a YAML policy file and runs every
//! section's validation, so a bad threshold is caught before deploy.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};
use packs_api::config::PolicyConfig;

/// Config subcommand arguments.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Load and validate a YAML policy file.
    Check {
        /// Policy file.
        file: PathBuf,
    },
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs) -> Result<u8> {
    match &args.command {
        ConfigCommand::Check { file } => run_check(file),
    }
}

fn run_check(file: &Path) -> Result<u8> {
    match PolicyConfig::load(file) {
        Ok(policy) => {
            println!("OK: {}", file.display());
            print_summary(&policy);
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {}: {e}", file.display());
            Ok(1)
        }
    }
}

fn print_summary(policy: &PolicyConfig) {
    let abuse = &policy.abuse;
    println!(
        "  abuse:   block at severity {}, ladder {}/{}/{}/{}",
        abuse.block_threshold,
        abuse.warning_strikes,
        abuse.mute_strikes,
        abuse.suspension_strikes,
        abuse.ban_strikes
    );
    println!("  safety:  decay {} points/day", policy.safety.decay_per_day);
    println!(
        "  refunds: escalate after {}h, partial refund {}%",
        policy.refund.escalation_hours, policy.refund.partial_refund_percent
    );
}
