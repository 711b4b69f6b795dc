//! # Split Preview
//!
//! `packs split --total N --ratio standard|creator|<pct>` prints the
//! recipient and platform shares for an amount.

use anyhow::{Context, Result};
use clap::Args;
use packs_core::TokenAmount;
use packs_ledger::{Split, SplitRatio};

/// Split subcommand arguments.
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Tokens to divide.
    #[arg(long)]
    pub total: u64,

    /// `standard` (65/35), `creator` (80/20), or a recipient percentage.
    #[arg(long, default_value = "standard")]
    pub ratio: String,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Parse the ratio and divide the total.
pub fn preview(args: &SplitArgs) -> Result<(SplitRatio, Split)> {
    let ratio: SplitRatio = args
        .ratio
        .parse()
        .with_context(|| format!("invalid ratio '{}'", args.ratio))?;
    Ok((ratio, ratio.split(TokenAmount::new(args.total))))
}

/// Execute the split subcommand.
pub fn run_split(args: &SplitArgs) -> Result<u8> {
    let (ratio, split) = preview(args)?;
    if args.json {
        let out = serde_json::json!({
            "total": args.total,
            "recipient_percent": ratio.recipient_percent(),
            "platform_percent": ratio.platform_percent(),
            "recipient": split.recipient,
            "platform": split.platform,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("ratio:     {ratio}");
        println!("total:     {}", args.total);
        println!("recipient: {}", split.recipient);
        println!("platform:  {}", split.platform);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(total: u64, ratio: &str) -> SplitArgs {
        SplitArgs {
            total,
            ratio: ratio.to_string(),
            json: false,
        }
    }

    #[test]
    fn standard_ratio() {
        let (ratio, split) = preview(&args(1000, "standard")).unwrap();
        assert_eq!(ratio, SplitRatio::STANDARD);
        assert_eq!(split.recipient, TokenAmount::new(650));
        assert_eq!(split.platform, TokenAmount::new(350));
    }

    #[test]
    fn custom_ratio_rounds_platform_down() {
        let (_, split) = preview(&args(7, "70")).unwrap();
        assert_eq!(split.platform, TokenAmount::new(2));
        assert_eq!(split.recipient, TokenAmount::new(5));
    }

    #[test]
    fn out_of_range_ratio_rejected() {
        assert!(preview(&args(100, "100")).is_err());
        assert!(preview(&args(100, "half")).is_err());
    }
}
