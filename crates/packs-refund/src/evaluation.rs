//! # Automatic Delivery Evaluation
//!
//! Tier-1 requests are decided from delivery evidence alone. Each kind of
//! evidence maps to exactly one [`RefundOutcome`]:
//!
//! | Evidence | Outcome |
//! |---|---|
//! | chat not delivered | FULL_REFUND |
//! | chat delivered | CREATOR_WINS |
//! | call with 0 connected seconds | FULL_REFUND |
//! | call shorter than the minimum length | PARTIAL_REFUND |
//! | call at or above the minimum length | CREATOR_WINS |
//! | event cancelled / creator no-show | FULL_REFUND |
//! | event ended early | PARTIAL_REFUND |
//! | event completed | CREATOR_WINS |
//! | content not unlocked | FULL_REFUND |
//! | content unlocked | CREATOR_WINS |

use packs_core::TokenAmount;
use packs_ledger::TransactionKind;
use serde::{Deserialize, Serialize};

use crate::error::RefundError;

/// How an event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Ran to completion.
    Completed,
    /// Started but ended before the scheduled end.
    EndedEarly,
    /// Cancelled before it started.
    Cancelled,
    /// The creator never showed up.
    CreatorNoShow,
}

/// Delivery facts reported by the messaging/call/event/content services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryEvidence {
    /// A paid chat message.
    Chat {
        /// Whether the message reached the recipient.
        delivered: bool,
    },
    /// A call.
    Call {
        /// Seconds both parties were connected.
        connected_seconds: u32,
    },
    /// An event ticket.
    Event {
        /// How the event ended.
        status: EventStatus,
    },
    /// Unlockable content.
    Content {
        /// Whether the content was unlocked for the payer.
        unlocked: bool,
    },
}

impl DeliveryEvidence {
    /// The transaction kind this evidence describes.
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Chat { .. } => TransactionKind::Chat,
            Self::Call { .. } => TransactionKind::Call,
            Self::Event { .. } => TransactionKind::Event,
            Self::Content { .. } => TransactionKind::Content,
        }
    }
}

/// The decision on a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundOutcome {
    /// The whole escrow goes back to the payer.
    FullRefund,
    /// A fixed fraction goes back; the rest is split as usual.
    PartialRefund,
    /// No refund; the escrow is released to the recipient.
    CreatorWins,
}

impl RefundOutcome {
    /// Tokens returned to the payer for an escrow of `total`.
    pub fn refund_amount(&self, total: TokenAmount, partial_percent: u32) -> TokenAmount {
        match self {
            Self::FullRefund => total,
            Self::PartialRefund => total.percent_floor(partial_percent),
            Self::CreatorWins => TokenAmount::ZERO,
        }
    }

    /// The outcome actually applied and its refund amount. A partial
    /// refund that floors to zero tokens settles as [`Self::CreatorWins`].
    pub fn settle(&self, total: TokenAmount, partial_percent: u32) -> (Self, TokenAmount) {
        let amount = self.refund_amount(total, partial_percent);
        match self {
            Self::PartialRefund if amount.is_zero() => (Self::CreatorWins, amount),
            _ => (*self, amount),
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullRefund => "FULL_REFUND",
            Self::PartialRefund => "PARTIAL_REFUND",
            Self::CreatorWins => "CREATOR_WINS",
        }
    }
}

impl std::fmt::Display for RefundOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decide a tier-1 request from delivery evidence.
///
/// # Errors
///
/// [`RefundError::EvidenceMismatch`] when the evidence describes a
/// different transaction kind than the escrow.
pub fn auto_evaluate(
    kind: TransactionKind,
    evidence: &DeliveryEvidence,
    min_call_seconds: u32,
) -> Result<RefundOutcome, RefundError> {
    if evidence.kind() != kind {
        return Err(RefundError::EvidenceMismatch {
            kind: kind.to_string(),
            evidence: evidence.kind().to_string(),
        });
    }
    let outcome = match *evidence {
        DeliveryEvidence::Chat { delivered: false } => RefundOutcome::FullRefund,
        DeliveryEvidence::Chat { delivered: true } => RefundOutcome::CreatorWins,
        DeliveryEvidence::Call {
            connected_seconds: 0,
        } => RefundOutcome::FullRefund,
        DeliveryEvidence::Call { connected_seconds } if connected_seconds < min_call_seconds => {
            RefundOutcome::PartialRefund
        }
        DeliveryEvidence::Call { .. } => RefundOutcome::CreatorWins,
        DeliveryEvidence::Event {
            status: EventStatus::Cancelled | EventStatus::CreatorNoShow,
        } => RefundOutcome::FullRefund,
        DeliveryEvidence::Event {
            status: EventStatus::EndedEarly,
        } => RefundOutcome::PartialRefund,
        DeliveryEvidence::Event {
            status: EventStatus::Completed,
        } => RefundOutcome::CreatorWins,
        DeliveryEvidence::Content { unlocked: false } => RefundOutcome::FullRefund,
        DeliveryEvidence::Content { unlocked: true } => RefundOutcome::CreatorWins,
    };
    Ok(outcome)
}
