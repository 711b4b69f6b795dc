//! # packs-cli — Operator CLI for the Packs Token Economy
//!
//! Provides the `packs` command-line interface for operators. Every
//! subcommand runs offline against the domain crates; nothing here talks
//! to a running API.
//!
//! ## Subcommands
//!
//! - `packs split` — preview how an amount divides under a split ratio.
//! - `packs screen` — run the abuse firewall over a message.
//! - `packs config check` — load and validate a YAML policy file.
//! - `packs jobs` — list job schedules and their next run.
//!
//! ```bash
//! packs split --total 1000 --ratio creator
//! packs screen "send it to my cashapp"
//! packs config check deploy/policy.yaml
//! packs jobs --at 2026-03-01T00:00:00Z
//! ```

pub mod config;
pub mod jobs;
pub mod screen;
pub mod split;

use std::path::Path;

use anyhow::{Context, Result};
use packs_api::config::PolicyConfig;

/// The policy at `path`, or defaults when none is given.
pub fn load_policy(path: Option<&Path>) -> Result<PolicyConfig> {
    match path {
        Some(p) => PolicyConfig::load(p)
            .with_context(|| format!("failed to load policy from {}", p.display())),
        None => Ok(PolicyConfig::default()),
    }
}
