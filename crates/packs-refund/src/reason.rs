//! Reason codes and tier classification.

use serde::{Deserialize, Serialize};

/// Never refundable.
pub const DISALLOWED_REASONS: &[&str] = &[
    "changed_mind",
    "no_romantic_interest",
    "rejected_advances",
    "expected_different_outcome",
];

/// Delivery failures, decided automatically from evidence.
pub const TIER_1_REASONS: &[&str] = &[
    "message_not_delivered",
    "call_not_connected",
    "event_cancelled",
    "creator_no_show",
    "technical_failure",
];

/// Quality complaints, reviewed by a moderator.
pub const TIER_2_REASONS: &[&str] = &["not_as_described", "low_quality", "inappropriate_content"];

/// Resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundTier {
    /// Tier 1: automatic evaluation.
    Auto,
    /// Tier 2: assisted review by a moderator.
    Assisted,
    /// Tier 3: human (administrator) resolution.
    Human,
}

impl RefundTier {
    /// 1, 2 or 3.
    pub fn number(&self) -> u8 {
        match self {
            Self::Auto => 1,
            Self::Assisted => 2,
            Self::Human => 3,
        }
    }
}

impl std::fmt::Display for RefundTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier {}", self.number())
    }
}

/// How a reason code is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonClass {
    /// Rejected outright.
    Disallowed,
    /// Routed to a tier.
    Tier(RefundTier),
}

/// Normalize a reason code: trimmed, lowercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

/// Classify a reason code. Unknown codes go to tier 3.
pub fn classify(code: &str) -> ReasonClass {
    let code = normalize_code(code);
    let code = code.as_str();
    if DISALLOWED_REASONS.contains(&code) {
        ReasonClass::Disallowed
    } else if TIER_1_REASONS.contains(&code) {
        ReasonClass::Tier(RefundTier::Auto)
    } else if TIER_2_REASONS.contains(&code) {
        ReasonClass::Tier(RefundTier::Assisted)
    } else {
        ReasonClass::Tier(RefundTier::Human)
    }
}
