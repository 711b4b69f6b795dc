//! # Split Ratios
//!
//! A payment is divided between the recipient and the platform. The
//! platform's share is always `floor(total × platform% / 100)` and the
//! recipient takes the remainder, so the two shares sum to the total for
//! every ratio and every amount.

use std::str::FromStr;

use packs_core::{TokenAmount, ValidationError};
use serde::{Deserialize, Serialize};

/// Recipient share as a whole percentage, 1..=99.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SplitRatio {
    recipient_percent: u32,
}

impl SplitRatio {
    /// 65 % recipient / 35 % platform.
    pub const STANDARD: SplitRatio = SplitRatio {
        recipient_percent: 65,
    };

    /// 80 % recipient / 20 % platform, for verified creators.
    pub const CREATOR: SplitRatio = SplitRatio {
        recipient_percent: 80,
    };

    /// A custom ratio.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::PercentOutOfRange`] unless
    /// `1 <= recipient_percent <= 99`.
    pub fn custom(recipient_percent: u32) -> Result<Self, ValidationError> {
        if !(1..=99).contains(&recipient_percent) {
            return Err(ValidationError::PercentOutOfRange {
                field: "recipient_percent",
                value: recipient_percent,
                min: 1,
                max: 99,
            });
        }
        Ok(Self { recipient_percent })
    }

    /// Recipient percentage.
    pub fn recipient_percent(&self) -> u32 {
        self.recipient_percent
    }

    /// Platform percentage.
    pub fn platform_percent(&self) -> u32 {
        100 - self.recipient_percent
    }

    /// Divide `total` into recipient and platform shares.
    pub fn split(&self, total: TokenAmount) -> Split {
        let platform = total.percent_floor(self.platform_percent());
        Split {
            recipient: total.saturating_sub(platform),
            platform,
        }
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl TryFrom<u32> for SplitRatio {
    type Error = ValidationError;

    fn try_from(recipient_percent: u32) -> Result<Self, Self::Error> {
        Self::custom(recipient_percent)
    }
}

impl From<SplitRatio> for u32 {
    fn from(ratio: SplitRatio) -> u32 {
        ratio.recipient_percent
    }
}

/// Accepts `standard`, `creator`, or a bare recipient percentage.
impl FromStr for SplitRatio {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::STANDARD),
            "creator" => Ok(Self::CREATOR),
            other => {
                let pct: u32 = other.parse().map_err(|_| ValidationError::UnknownCode {
                    kind: "split ratio",
                    value: s.to_string(),
                })?;
                Self::custom(pct)
            }
        }
    }
}

impl std::fmt::Display for SplitRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.recipient_percent, self.platform_percent())
    }
}

/// The result of applying a [`SplitRatio`] to an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Recipient share (receives the rounding remainder).
    pub recipient: TokenAmount,
    /// Platform share.
    pub platform: TokenAmount,
}
