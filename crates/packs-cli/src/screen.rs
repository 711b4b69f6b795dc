//! # Abuse Screening
//!
//! `packs screen "<text>"` runs the abuse firewall without recording
//! strikes. Exit code 0 means the text is allowed, 2 flagged, 3 blocked.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use packs_rules::{AbuseFirewall, ScreenResult, Verdict};

use crate::load_policy;

/// Screen subcommand arguments.
#[derive(Args, Debug)]
pub struct ScreenArgs {
    /// Message text to screen.
    pub text: String,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Exit code for a verdict.
pub fn exit_code(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::Allow => 0,
        Verdict::Flag => 2,
        Verdict::Block => 3,
    }
}

/// Screen `text` under the policy at `policy_path`.
pub fn screen(text: &str, policy_path: Option<&Path>) -> Result<ScreenResult> {
    let policy = load_policy(policy_path)?;
    let firewall = AbuseFirewall::new(policy.abuse);
    Ok(firewall.screen(text))
}

/// Execute the screen subcommand.
pub fn run_screen(args: &ScreenArgs, policy_path: Option<&Path>) -> Result<u8> {
    let result = screen(&args.text, policy_path)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("verdict:  {}", result.verdict.as_str());
        if !result.categories.is_empty() {
            let names: Vec<&str> = result.categories.iter().map(|c| c.as_str()).collect();
            println!("category: {}", names.join(", "));
            println!("severity: {}", result.max_severity);
            println!("matched:  {}", result.matched.join(", "));
        }
    }
    Ok(exit_code(result.verdict))
}
