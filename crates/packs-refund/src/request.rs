//! # Refund Requests
//!
//! Status machine:
//!
//! ```text
//! (tier 1)  ─────────────────────────────► RESOLVED
//! (tier 2)  QUEUED_FOR_REVIEW ─┬─────────► RESOLVED
//!                              └─► AWAITING_HUMAN ─► RESOLVED
//! (tier 3)  AWAITING_HUMAN ──────────────► RESOLVED
//! (fraud)   ─────────────────────────────► REJECTED
//! ```

use chrono::{DateTime, Utc};
use packs_core::{TokenAmount, UserId};
use packs_ledger::EscrowId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::evaluation::{DeliveryEvidence, RefundOutcome};
use crate::reason::RefundTier;

/// A unique identifier for a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefundRequestId(Uuid);

impl RefundRequestId {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RefundRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RefundRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "refund:{}", self.0)
    }
}

/// Request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    /// Tier 2, waiting for a moderator.
    QueuedForReview,
    /// Tier 3, waiting for an administrator.
    AwaitingHuman,
    /// Decided and settled. Terminal.
    Resolved,
    /// Blocked by the fraud engine. Terminal.
    Rejected,
}

impl RefundStatus {
    /// All statuses, in declaration order.
    pub const ALL: [RefundStatus; 4] = [
        Self::QueuedForReview,
        Self::AwaitingHuman,
        Self::Resolved,
        Self::Rejected,
    ];

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueuedForReview => "QUEUED_FOR_REVIEW",
            Self::AwaitingHuman => "AWAITING_HUMAN",
            Self::Resolved => "RESOLVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who decided a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "user", rename_all = "snake_case")]
pub enum Resolver {
    /// Tier-1 automatic evaluation.
    Auto,
    /// The fraud engine rejected it.
    FraudEngine,
    /// A moderator resolved the tier-2 review.
    Moderator(UserId),
    /// An administrator override.
    Admin(UserId),
}

/// A payer's request for a refund on one escrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRequest {
    /// Request identifier.
    pub id: RefundRequestId,
    /// The escrow to refund.
    pub escrow_id: EscrowId,
    /// The payer who asked.
    pub requester: UserId,
    /// The escrow's recipient.
    pub recipient: UserId,
    /// Escrow total at submission.
    pub escrow_total: TokenAmount,
    /// Normalized reason code.
    pub reason_code: String,
    /// Free-text description.
    pub description: String,
    /// Delivery evidence, when supplied.
    pub evidence: Option<DeliveryEvidence>,
    /// Current tier.
    pub tier: RefundTier,
    /// Current status.
    pub status: RefundStatus,
    /// Decision, once resolved.
    pub outcome: Option<RefundOutcome>,
    /// Tokens returned to the payer, once resolved.
    pub refund_amount: Option<TokenAmount>,
    /// Who decided it.
    pub resolver: Option<Resolver>,
    /// Resolver's note.
    pub resolution_note: Option<String>,
    /// Fraud record produced at submission, if any.
    pub fraud_record_id: Option<Uuid>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
    /// When the request moved from tier 2 to tier 3.
    pub escalated_at: Option<DateTime<Utc>>,
}

impl RefundRequest {
    /// Whether the request still awaits a decision.
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Whether any tokens went back to the payer.
    pub fn was_approved(&self) -> bool {
        matches!(
            self.outcome,
            Some(RefundOutcome::FullRefund | RefundOutcome::PartialRefund)
        )
    }

    pub(crate) fn resolve(
        &mut self,
        outcome: RefundOutcome,
        refund_amount: TokenAmount,
        resolver: Resolver,
        note: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = RefundStatus::Resolved;
        self.outcome = Some(outcome);
        self.refund_amount = Some(refund_amount);
        self.resolver = Some(resolver);
        self.resolution_note = note;
        self.updated_at = now;
    }
}
