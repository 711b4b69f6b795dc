//! # Escrow Records
//!
//! An [`EscrowRecord`] tracks one held payment from a payer to a recipient
//! for a specific service (a chat message, a call, an event ticket, or a
//! piece of unlockable content).
//!
//! Status machine: `HELD → {RELEASED | REFUNDED | DISPUTED}`,
//! `DISPUTED → {RELEASED | REFUNDED}`. RELEASED and REFUNDED are terminal.
//! Every transition is appended to the record's transition log.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use packs_core::{TokenAmount, UserId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::split::SplitRatio;

// ── Identifiers ────────────────────────────────────────────────────────

/// A unique identifier for an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscrowId(Uuid);

impl EscrowId {
    /// Create a new random escrow identifier.
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

impl Default for EscrowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EscrowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "escrow:{}", self.0)
    }
}

// ── Transaction Kinds ──────────────────────────────────────────────────

/// The service an escrow pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// A paid chat message.
    Chat,
    /// A paid voice/video call.
    Call,
    /// An event ticket.
    Event,
    /// Unlockable content.
    Content,
}

impl TransactionKind {
    /// All kinds, in declaration order.
    pub const ALL: [TransactionKind; 4] = [Self::Chat, Self::Call, Self::Event, Self::Content];

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Call => "call",
            Self::Event => "event",
            Self::Content => "content",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| ValidationError::UnknownCode {
                kind: "transaction kind",
                value: s.to_string(),
            })
    }
}

// ── Escrow Status ──────────────────────────────────────────────────────

/// The status of an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    /// Funds are held pending delivery.
    Held,
    /// Paid out to recipient and platform. Terminal.
    Released,
    /// Returned (wholly or partly) to the payer. Terminal.
    Refunded,
    /// A refund request is under review; never auto-released.
    Disputed,
}

impl EscrowStatus {
    /// All statuses, in declaration order.
    pub const ALL: [EscrowStatus; 4] = [Self::Held, Self::Released, Self::Refunded, Self::Disputed];

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }

    /// Statuses reachable from this one.
    pub fn valid_transitions(&self) -> &'static [EscrowStatus] {
        match self {
            Self::Held => &[Self::Released, Self::Refunded, Self::Disputed],
            Self::Disputed => &[Self::Released, Self::Refunded],
            Self::Released | Self::Refunded => &[],
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "HELD",
            Self::Released => "RELEASED",
            Self::Refunded => "REFUNDED",
            Self::Disputed => "DISPUTED",
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Release Triggers ───────────────────────────────────────────────────

/// Who or what initiated a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseTrigger {
    /// The payer confirmed delivery.
    Payer,
    /// The periodic sweep found the auto-release deadline passed.
    AutoRelease,
    /// An administrator or a resolved refund request.
    Admin,
}

impl ReleaseTrigger {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payer => "payer",
            Self::AutoRelease => "auto_release",
            Self::Admin => "admin",
        }
    }
}

// ── Record ─────────────────────────────────────────────────────────────

/// Final distribution of an escrow's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Returned to the payer.
    pub payer_refund: TokenAmount,
    /// Paid to the recipient.
    pub recipient_amount: TokenAmount,
    /// Kept by the platform.
    pub platform_fee: TokenAmount,
}

impl Settlement {
    /// Sum of all three parts.
    pub fn total(&self) -> Option<TokenAmount> {
        self.payer_refund
            .checked_add(self.recipient_amount)?
            .checked_add(self.platform_fee)
    }
}

/// A recorded status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Status before.
    pub from: EscrowStatus,
    /// Status after.
    pub to: EscrowStatus,
    /// When the change happened.
    pub at: DateTime<Utc>,
    /// Why (trigger or refund request reference).
    pub reason: String,
}

/// A held payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Unique escrow identifier.
    pub id: EscrowId,
    /// The paying user.
    pub payer: UserId,
    /// The receiving user (usually a creator).
    pub recipient: UserId,
    /// The service being paid for.
    pub kind: TransactionKind,
    /// Caller-supplied reference to the message/call/event/content.
    pub reference: String,
    /// Total amount held.
    pub total: TokenAmount,
    /// Split ratio fixed at creation.
    pub split: SplitRatio,
    /// Recipient share at creation.
    pub recipient_share: TokenAmount,
    /// Platform share at creation.
    pub platform_share: TokenAmount,
    /// Current status.
    pub status: EscrowStatus,
    /// When the escrow was opened.
    pub created_at: DateTime<Utc>,
    /// End of the refund window.
    pub release_deadline: DateTime<Utc>,
    /// When the sweep may release the escrow.
    pub auto_release_at: DateTime<Utc>,
    /// Final distribution, set when the escrow reaches a terminal status.
    pub settlement: Option<Settlement>,
    /// Status history.
    pub transitions: Vec<StatusTransition>,
}

impl EscrowRecord {
    /// Whether `user` is the payer or the recipient.
    pub fn is_party(&self, user: &UserId) -> bool {
        self.payer == *user || self.recipient == *user
    }

    /// Whether a refund can still be requested at `now`.
    pub fn refund_window_open(&self, now: DateTime<Utc>) -> bool {
        now < self.release_deadline
    }

    /// Whether the sweep should release this escrow at `now`.
    pub fn auto_release_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EscrowStatus::Held && now >= self.auto_release_at
    }

    /// Distribution for a refund of `refund` tokens: the payer gets
    /// `refund`, and the remainder is split with the escrow's ratio.
    pub fn refund_settlement(&self, refund: TokenAmount) -> Result<Settlement, LedgerError> {
        let remainder =
            self.total
                .checked_sub(refund)
                .ok_or_else(|| LedgerError::RefundExceedsTotal {
                    escrow_id: self.id.to_string(),
                    requested: refund.value(),
                    total: self.total.value(),
                })?;
        let split = self.split.split(remainder);
        Ok(Settlement {
            payer_refund: refund,
            recipient_amount: split.recipient,
            platform_fee: split.platform,
        })
    }

    /// Distribution for a full release.
    pub fn release_settlement(&self) -> Settlement {
        Settlement {
            payer_refund: TokenAmount::ZERO,
            recipient_amount: self.recipient_share,
            platform_fee: self.platform_share,
        }
    }

    /// Reject `operation` unless the status is one of `allowed`.
    pub(crate) fn require_status(
        &self,
        operation: &str,
        allowed: &[EscrowStatus],
        expected: &'static str,
    ) -> Result<(), LedgerError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(LedgerError::InvalidEscrowOperation {
                escrow_id: self.id.to_string(),
                operation: operation.to_string(),
                status: self.status.as_str().to_string(),
                expected,
            })
        }
    }

    /// Move to `to`, recording the transition.
    pub(crate) fn transition(
        &mut self,
        to: EscrowStatus,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(LedgerError::InvalidEscrowOperation {
                escrow_id: self.id.to_string(),
                operation: format!("transition to {to}"),
                status: self.status.as_str().to_string(),
                expected: "a status that permits it",
            });
        }
        self.transitions.push(StatusTransition {
            from: self.status,
            to,
            at: now,
            reason: reason.into(),
        });
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> EscrowRecord {
        let now = Utc::now();
        let total = TokenAmount::new(1000);
        let split = SplitRatio::STANDARD.split(total);
        EscrowRecord {
            id: EscrowId::new(),
            payer: UserId::new(),
            recipient: UserId::new(),
            kind: TransactionKind::Chat,
            reference: "msg-1".to_string(),
            total,
            split: SplitRatio::STANDARD,
            recipient_share: split.recipient,
            platform_share: split.platform,
            status: EscrowStatus::Held,
            created_at: now,
            release_deadline: now + Duration::hours(24),
            auto_release_at: now + Duration::hours(48),
            settlement: None,
            transitions: Vec::new(),
        }
    }

    #[test]
    fn terminal_statuses_have_no_transitions() {
        for s in EscrowStatus::ALL {
            assert_eq!(s.is_terminal(), s.valid_transitions().is_empty());
        }
    }

    #[test]
    fn disputed_cannot_return_to_held() {
        assert!(!EscrowStatus::Disputed
            .valid_transitions()
            .contains(&EscrowStatus::Held));
    }

    #[test]
    fn refund_settlement_splits_remainder() {
        let r = record();
        let s = r.refund_settlement(TokenAmount::new(500)).unwrap();
        assert_eq!(s.payer_refund, TokenAmount::new(500));
        assert_eq!(s.platform_fee, TokenAmount::new(175));
        assert_eq!(s.recipient_amount, TokenAmount::new(325));
        assert_eq!(s.total(), Some(r.total));
    }

    #[test]
    fn refund_settlement_rejects_excess() {
        let r = record();
        assert!(matches!(
            r.refund_settlement(TokenAmount::new(1001)),
            Err(LedgerError::RefundExceedsTotal { .. })
        ));
    }

    #[test]
    fn transition_logs_history() {
        let mut r = record();
        let now = Utc::now();
        r.transition(EscrowStatus::Disputed, "refund-1", now).unwrap();
        r.transition(EscrowStatus::Refunded, "refund-1", now).unwrap();
        assert_eq!(r.transitions.len(), 2);
        assert_eq!(r.transitions[0].from, EscrowStatus::Held);
        assert!(r.transition(EscrowStatus::Released, "x", now).is_err());
    }

    #[test]
    fn refund_window_boundary_is_exclusive() {
        let r = record();
        assert!(r.refund_window_open(r.release_deadline - Duration::seconds(1)));
        assert!(!r.refund_window_open(r.release_deadline));
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("CALL".parse::<TransactionKind>().unwrap(), TransactionKind::Call);
        assert!("gift".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn status_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&EscrowStatus::Disputed).unwrap(),
            "\"DISPUTED\""
        );
    }
}
