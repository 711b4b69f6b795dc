//! # Refund Desk
//!
//! Holds every refund request and applies submissions, reviews, escalations
//! and admin overrides against an [`EscrowBook`].
//!
//! Each operation validates first and settles the escrow before storing the
//! request change, so a ledger failure leaves the desk untouched. Like the
//! book, the desk can group changes under [`RefundDesk::begin`] and undo
//! them with [`RefundDesk::rollback`].
//!
//! The NEW_ACCOUNT_ABUSE input is the requester's first wallet credit as
//! recorded in the journal, never a caller-supplied date.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use packs_core::{TokenAmount, UndoLog, UserId, ValidationError};
use packs_ledger::{
    EscrowBook, EscrowChange, EscrowId, EscrowRecord, EscrowStatus, LedgerEntry, ReleaseTrigger,
};
use packs_rules::fraud::HistoryOutcome;
use packs_rules::{FraudContext, FraudDetectionRecord, FraudEngine, RefundHistoryItem};
use serde::{Deserialize, Serialize};

use crate::error::RefundError;
use crate::evaluation::{auto_evaluate, DeliveryEvidence, RefundOutcome};
use crate::reason::{classify, normalize_code, ReasonClass, RefundTier};
use crate::request::{RefundRequest, RefundRequestId, RefundStatus, Resolver};

/// Refund routing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundConfig {
    /// Calls shorter than this (but connected) get a partial refund.
    pub min_call_seconds: u32,
    /// Percentage of the total returned on a partial refund.
    pub partial_refund_percent: u32,
    /// Hours a tier-2 request may wait before moving to tier 3.
    pub escalation_hours: i64,
    /// Maximum description length in characters.
    pub max_description_chars: usize,
}

impl Default for RefundConfig {
    fn default() -> Self {
        Self {
            min_call_seconds: 60,
            partial_refund_percent: 50,
            escalation_hours: 48,
            max_description_chars: 2_000,
        }
    }
}

impl RefundConfig {
    /// Range-check every parameter.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=99).contains(&self.partial_refund_percent) {
            return Err(ValidationError::PercentOutOfRange {
                field: "refund.partial_refund_percent",
                value: self.partial_refund_percent,
                min: 1,
                max: 99,
            });
        }
        if self.escalation_hours <= 0 {
            return Err(ValidationError::InvalidSetting {
                field: "refund.escalation_hours",
                reason: format!("must be positive, got {}", self.escalation_hours),
            });
        }
        Ok(())
    }

    /// Escalation delay as a duration.
    pub fn escalation_delay(&self) -> Duration {
        Duration::hours(self.escalation_hours)
    }
}

/// A payer's refund submission.
#[derive(Debug, Clone)]
pub struct RefundSubmission {
    /// The escrow to refund.
    pub escrow_id: EscrowId,
    /// The caller (must be the payer).
    pub requester: UserId,
    /// Reason code.
    pub reason_code: String,
    /// Free-text description.
    pub description: String,
    /// Delivery evidence (required for tier-1 reasons).
    pub evidence: Option<DeliveryEvidence>,
}

/// Result of [`RefundDesk::submit`].
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    /// The stored request.
    pub request: RefundRequest,
    /// The escrow after routing.
    pub escrow: EscrowRecord,
    /// Ledger entry, when a tier-1 request settled immediately.
    pub entry: Option<LedgerEntry>,
    /// Fraud audit record, when the fraud engine reported a finding.
    pub fraud_record: Option<FraudDetectionRecord>,
}

/// Result of a review or admin resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveOutcome {
    /// The resolved request.
    pub request: RefundRequest,
    /// The escrow settlement.
    pub change: EscrowChange,
}

/// All refund requests.
#[derive(Debug, Default)]
pub struct RefundDesk {
    requests: HashMap<RefundRequestId, RefundRequest>,
    config: RefundConfig,
    undo: UndoLog<RefundRequestId, RefundRequest>,
}

impl RefundDesk {
    /// An empty desk.
    pub fn new(config: RefundConfig) -> Self {
        Self {
            requests: HashMap::new(),
            config,
            undo: UndoLog::default(),
        }
    }

    /// Rebuild from persisted requests.
    pub fn restore(config: RefundConfig, requests: Vec<RefundRequest>) -> Self {
        Self {
            requests: requests.into_iter().map(|r| (r.id, r)).collect(),
            config,
            undo: UndoLog::default(),
        }
    }

    /// Start a unit of work that [`rollback`](Self::rollback) can undo.
    pub fn begin(&mut self) {
        self.undo.begin();
    }

    /// Keep every change made since [`begin`](Self::begin).
    pub fn commit(&mut self) {
        self.undo.commit();
    }

    /// Undo every request change made since [`begin`](Self::begin).
    /// Returns how many requests were restored.
    pub fn rollback(&mut self) -> usize {
        let restored = self.undo.rollback_into(&mut self.requests);
        if restored > 0 {
            tracing::warn!(requests = restored, "refund desk rolled back");
        }
        restored
    }

    fn store(&mut self, request: RefundRequest) {
        self.undo.note(request.id, self.requests.get(&request.id));
        self.requests.insert(request.id, request);
    }

    /// Active configuration.
    pub fn config(&self) -> &RefundConfig {
        &self.config
    }

    /// Look up a request.
    pub fn get(&self, id: &RefundRequestId) -> Option<&RefundRequest> {
        self.requests.get(id)
    }

    /// All requests, oldest first.
    pub fn list(&self) -> Vec<RefundRequest> {
        let mut all: Vec<RefundRequest> = self.requests.values().cloned().collect();
        all.sort_by_key(|r| (r.created_at, r.id));
        all
    }

    /// Open tier-2 and tier-3 requests, oldest first.
    pub fn queue(&self) -> Vec<RefundRequest> {
        let mut open: Vec<RefundRequest> = self
            .requests
            .values()
            .filter(|r| r.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|r| (r.created_at, r.id));
        open
    }

    /// The open request for an escrow, if any.
    pub fn pending_for(&self, escrow_id: &EscrowId) -> Option<&RefundRequest> {
        self.requests
            .values()
            .find(|r| r.escrow_id == *escrow_id && r.is_open())
    }

    /// Request count per status, in [`RefundStatus::ALL`] order.
    pub fn count_by_status(&self) -> Vec<(RefundStatus, usize)> {
        RefundStatus::ALL
            .into_iter()
            .map(|s| (s, self.requests.values().filter(|r| r.status == s).count()))
            .collect()
    }

    /// Earlier requests by `requester`, as fraud-rule history.
    pub fn history_for(&self, requester: &UserId) -> Vec<RefundHistoryItem> {
        self.requests
            .values()
            .filter(|r| r.requester == *requester)
            .map(|r| RefundHistoryItem {
                recipient: r.recipient,
                amount: r.escrow_total.value(),
                requested_at: r.created_at,
                outcome: match r.status {
                    RefundStatus::QueuedForReview | RefundStatus::AwaitingHuman => {
                        HistoryOutcome::Pending
                    }
                    RefundStatus::Resolved if r.was_approved() => HistoryOutcome::Approved,
                    RefundStatus::Resolved | RefundStatus::Rejected => HistoryOutcome::Denied,
                },
            })
            .collect()
    }

    fn require(&self, id: &RefundRequestId) -> Result<&RefundRequest, RefundError> {
        self.requests
            .get(id)
            .ok_or_else(|| RefundError::RequestNotFound(id.to_string()))
    }

    // -- Submission --------------------------------------------------------

    /// Validate, screen, and route a refund submission.
    pub fn submit(
        &mut self,
        sub: RefundSubmission,
        book: &mut EscrowBook,
        fraud: &FraudEngine,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, RefundError> {
        let reason = normalize_code(&sub.reason_code);
        if reason.is_empty() {
            return Err(ValidationError::EmptyField("reason_code").into());
        }
        let tier = match classify(&reason) {
            ReasonClass::Disallowed => {
                tracing::info!(requester = %sub.requester, reason = %reason, "refund reason not eligible");
                return Err(RefundError::DisallowedReason(reason));
            }
            ReasonClass::Tier(tier) => tier,
        };
        if sub.description.chars().count() > self.config.max_description_chars {
            return Err(ValidationError::TooLong {
                field: "description",
                max: self.config.max_description_chars,
            }
            .into());
        }

        let escrow = book.require(&sub.escrow_id)?.clone();
        if escrow.payer != sub.requester {
            return Err(RefundError::NotPayer {
                escrow_id: escrow.id.to_string(),
            });
        }
        if escrow.status != EscrowStatus::Held {
            return Err(RefundError::EscrowNotRefundable {
                escrow_id: escrow.id.to_string(),
                status: escrow.status.to_string(),
            });
        }
        if !escrow.refund_window_open(now) {
            return Err(RefundError::RefundWindowClosed {
                escrow_id: escrow.id.to_string(),
                deadline: escrow.release_deadline.to_rfc3339(),
            });
        }
        if let Some(open) = self.pending_for(&escrow.id) {
            return Err(RefundError::DuplicatePending {
                escrow_id: escrow.id.to_string(),
                request_id: open.id.to_string(),
            });
        }
        let auto_outcome = match (tier, &sub.evidence) {
            (RefundTier::Auto, None) => return Err(RefundError::EvidenceRequired { reason }),
            (RefundTier::Auto, Some(ev)) => {
                Some(auto_evaluate(escrow.kind, ev, self.config.min_call_seconds)?)
            }
            _ => None,
        };

        let id = RefundRequestId::new();
        let ctx = FraudContext {
            requester: sub.requester,
            account_created_at: book.account_opened_at(sub.requester).unwrap_or(now),
            recipient: escrow.recipient,
            amount: escrow.total.value(),
            description: sub.description.clone(),
            history: self.history_for(&sub.requester),
            now,
        };
        let finding = fraud.evaluate(&ctx);
        let fraud_record = finding
            .as_ref()
            .map(|f| FraudDetectionRecord::from_finding(sub.requester, f, Some(*id.as_uuid()), now));

        let mut request = RefundRequest {
            id,
            escrow_id: escrow.id,
            requester: sub.requester,
            recipient: escrow.recipient,
            escrow_total: escrow.total,
            reason_code: reason,
            description: sub.description,
            evidence: sub.evidence,
            tier,
            status: RefundStatus::AwaitingHuman,
            outcome: None,
            refund_amount: None,
            resolver: None,
            resolution_note: None,
            fraud_record_id: fraud_record.as_ref().map(|r| r.id),
            created_at: now,
            updated_at: now,
            escalated_at: None,
        };

        if let Some(f) = finding.as_ref().filter(|f| f.blocks_refund()) {
            request.status = RefundStatus::Rejected;
            request.resolver = Some(Resolver::FraudEngine);
            request.resolution_note = Some(format!(
                "{} ({})",
                f.pattern.as_str(),
                f.penalty.as_str()
            ));
            tracing::warn!(
                request_id = %request.id,
                escrow_id = %escrow.id,
                pattern = f.pattern.as_str(),
                "refund request rejected by fraud screening"
            );
            self.store(request.clone());
            return Ok(SubmitOutcome {
                request,
                escrow,
                entry: None,
                fraud_record,
            });
        }

        let (escrow, entry) = match (tier, auto_outcome) {
            (RefundTier::Auto, Some(outcome)) => {
                let (change, outcome, amount) = self.settle(book, &request, outcome, now)?;
                request.resolve(outcome, amount, Resolver::Auto, None, now);
                (change.escrow, Some(change.entry))
            }
            (RefundTier::Assisted, _) => {
                request.status = RefundStatus::QueuedForReview;
                (book.dispute(&escrow.id, &request.id.to_string(), now)?, None)
            }
            _ => {
                request.status = RefundStatus::AwaitingHuman;
                (book.dispute(&escrow.id, &request.id.to_string(), now)?, None)
            }
        };

        tracing::info!(
            request_id = %request.id,
            escrow_id = %request.escrow_id,
            tier = request.tier.number(),
            status = request.status.as_str(),
            outcome = request.outcome.map(|o| o.as_str()),
            "refund request routed"
        );
        self.store(request.clone());
        Ok(SubmitOutcome {
            request,
            escrow,
            entry,
            fraud_record,
        })
    }

    // -- Resolution --------------------------------------------------------

    /// A moderator decides a tier-2 request.
    pub fn review(
        &mut self,
        id: &RefundRequestId,
        outcome: RefundOutcome,
        reviewer: UserId,
        note: Option<String>,
        book: &mut EscrowBook,
        now: DateTime<Utc>,
    ) -> Result<ResolveOutcome, RefundError> {
        let request = self.require(id)?;
        if request.status != RefundStatus::QueuedForReview {
            return Err(RefundError::InvalidRequestState {
                request_id: id.to_string(),
                operation: "review".to_string(),
                status: request.status.to_string(),
            });
        }
        self.resolve_with(id, outcome, Resolver::Moderator(reviewer), note, book, now)
    }

    /// An administrator decides any open request.
    pub fn admin_resolve(
        &mut self,
        id: &RefundRequestId,
        outcome: RefundOutcome,
        admin: UserId,
        note: Option<String>,
        book: &mut EscrowBook,
        now: DateTime<Utc>,
    ) -> Result<ResolveOutcome, RefundError> {
        let request = self.require(id)?;
        if !request.is_open() {
            return Err(RefundError::InvalidRequestState {
                request_id: id.to_string(),
                operation: "resolve".to_string(),
                status: request.status.to_string(),
            });
        }
        self.resolve_with(id, outcome, Resolver::Admin(admin), note, book, now)
    }

    fn resolve_with(
        &mut self,
        id: &RefundRequestId,
        outcome: RefundOutcome,
        resolver: Resolver,
        note: Option<String>,
        book: &mut EscrowBook,
        now: DateTime<Utc>,
    ) -> Result<ResolveOutcome, RefundError> {
        let mut staged = self.require(id)?.clone();
        let (change, outcome, amount) = self.settle(book, &staged, outcome, now)?;
        staged.resolve(outcome, amount, resolver, note, now);
        tracing::info!(
            request_id = %id,
            escrow_id = %staged.escrow_id,
            outcome = outcome.as_str(),
            refund_amount = amount.value(),
            "refund request resolved"
        );
        self.store(staged.clone());
        Ok(ResolveOutcome {
            request: staged,
            change,
        })
    }

    /// Release an escrow directly, closing any open request as CREATOR_WINS.
    pub fn admin_release(
        &mut self,
        escrow_id: &EscrowId,
        admin: UserId,
        note: Option<String>,
        book: &mut EscrowBook,
        now: DateTime<Utc>,
    ) -> Result<(EscrowChange, Option<RefundRequest>), RefundError> {
        let change = book.release(escrow_id, ReleaseTrigger::Admin, now)?;
        let closed = self.close_pending(
            escrow_id,
            RefundOutcome::CreatorWins,
            TokenAmount::ZERO,
            admin,
            note,
            now,
        );
        Ok((change, closed))
    }

    /// Refund an escrow directly, closing any open request.
    pub fn admin_refund(
        &mut self,
        escrow_id: &EscrowId,
        amount: TokenAmount,
        admin: UserId,
        note: Option<String>,
        book: &mut EscrowBook,
        now: DateTime<Utc>,
    ) -> Result<(EscrowChange, Option<RefundRequest>), RefundError> {
        let change = book.refund(escrow_id, amount, "admin refund", now)?;
        let outcome = if amount == change.escrow.total {
            RefundOutcome::FullRefund
        } else {
            RefundOutcome::PartialRefund
        };
        let closed = self.close_pending(escrow_id, outcome, amount, admin, note, now);
        Ok((change, closed))
    }

    fn close_pending(
        &mut self,
        escrow_id: &EscrowId,
        outcome: RefundOutcome,
        amount: TokenAmount,
        admin: UserId,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<RefundRequest> {
        let mut request = self.pending_for(escrow_id)?.clone();
        request.resolve(outcome, amount, Resolver::Admin(admin), note, now);
        self.store(request.clone());
        Some(request)
    }

    /// Move tier-2 requests queued for at least `after` to tier 3.
    pub fn escalate_stale(&mut self, now: DateTime<Utc>, after: Duration) -> Vec<RefundRequest> {
        let mut escalated = Vec::new();
        for request in self.requests.values_mut() {
            if request.status == RefundStatus::QueuedForReview && now - request.created_at >= after
            {
                self.undo.note(request.id, Some(&*request));
                request.tier = RefundTier::Human;
                request.status = RefundStatus::AwaitingHuman;
                request.escalated_at = Some(now);
                request.updated_at = now;
                tracing::info!(request_id = %request.id, "refund request escalated to tier 3");
                escalated.push(request.clone());
            }
        }
        escalated.sort_by_key(|r| (r.created_at, r.id));
        escalated
    }

    /// Apply `outcome` to the request's escrow. Returns the outcome that
    /// was applied, which differs from `outcome` only when a partial refund
    /// rounds down to nothing.
    fn settle(
        &self,
        book: &mut EscrowBook,
        request: &RefundRequest,
        outcome: RefundOutcome,
        now: DateTime<Utc>,
    ) -> Result<(EscrowChange, RefundOutcome, TokenAmount), RefundError> {
        let (applied, amount) =
            outcome.settle(request.escrow_total, self.config.partial_refund_percent);
        if applied != outcome {
            tracing::info!(
                request_id = %request.id,
                requested = outcome.as_str(),
                applied = applied.as_str(),
                "partial refund rounds to zero; escrow released to creator"
            );
        }
        let change = if amount.is_zero() {
            book.release(&request.escrow_id, ReleaseTrigger::Admin, now)?
        } else {
            book.refund(&request.escrow_id, amount, &request.id.to_string(), now)?
        };
        Ok((change, applied, amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::EventStatus;
    use packs_ledger::{EscrowPolicy, OpenEscrow, SplitRatio, TransactionKind};
    use packs_rules::{FraudPattern, PenaltyAction};

    struct Fixture {
        book: EscrowBook,
        desk: RefundDesk,
        fraud: FraudEngine,
        payer: UserId,
        creator: UserId,
    }

    impl Fixture {
        /// A payer whose wallet was first funded a year ago.
        fn new() -> Self {
            Self::funded_at(Utc::now() - Duration::days(400))
        }

        fn funded_at(first_credit: DateTime<Utc>) -> Self {
            let payer = UserId::new();
            let mut book = EscrowBook::new(EscrowPolicy::default());
            book.credit(payer, TokenAmount::new(10_000), "purchase", first_credit)
                .unwrap();
            Self {
                book,
                desk: RefundDesk::new(RefundConfig::default()),
                fraud: FraudEngine::default(),
                payer,
                creator: UserId::new(),
            }
        }

        fn open(&mut self, kind: TransactionKind, total: u64) -> EscrowId {
            self.open_to(self.creator, kind, total)
        }

        fn open_to(&mut self, recipient: UserId, kind: TransactionKind, total: u64) -> EscrowId {
            self.book
                .open_escrow(
                    OpenEscrow {
                        payer: self.payer,
                        recipient,
                        kind,
                        reference: "ref".to_string(),
                        total: TokenAmount::new(total),
                        split: SplitRatio::STANDARD,
                    },
                    Utc::now(),
                )
                .unwrap()
                .escrow
                .id
        }

        fn submission(
            &self,
            escrow_id: EscrowId,
            reason: &str,
            evidence: Option<DeliveryEvidence>,
        ) -> RefundSubmission {
            RefundSubmission {
                escrow_id,
                requester: self.payer,
                reason_code: reason.to_string(),
                description: "it did not work".to_string(),
                evidence,
            }
        }

        fn submit(&mut self, sub: RefundSubmission) -> Result<SubmitOutcome, RefundError> {
            self.desk.submit(sub, &mut self.book, &self.fraud, Utc::now())
        }
    }

    // -- Validation ----------------------------------------------------------

    #[test]
    fn disallowed_reason_rejected_before_escrow_lookup() {
        let mut f = Fixture::new();
        let sub = f.submission(EscrowId::new(), "changed_mind", None);
        let err = f.submit(sub).unwrap_err();
        assert!(matches!(err, RefundError::DisallowedReason(ref r) if r == "changed_mind"));
        assert!(f.desk.list().is_empty());
    }

    #[test]
    fn unknown_escrow_is_ledger_not_found() {
        let mut f = Fixture::new();
        let sub = f.submission(EscrowId::new(), "other", None);
        assert!(matches!(
            f.submit(sub),
            Err(RefundError::Ledger(packs_ledger::LedgerError::EscrowNotFound(_)))
        ));
    }

    #[test]
    fn only_payer_may_request() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        let mut sub = f.submission(id, "other", None);
        sub.requester = f.creator;
        assert!(matches!(f.submit(sub), Err(RefundError::NotPayer { .. })));
    }

    #[test]
    fn closed_window_rejected() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        let sub = f.submission(id, "other", None);
        let late = Utc::now() + Duration::days(10);
        let err = f.desk.submit(sub, &mut f.book, &f.fraud, late).unwrap_err();
        assert!(matches!(err, RefundError::RefundWindowClosed { .. }));
    }

    #[test]
    fn tier_one_requires_evidence() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        let sub = f.submission(id, "message_not_delivered", None);
        assert!(matches!(
            f.submit(sub),
            Err(RefundError::EvidenceRequired { .. })
        ));
        assert!(f.desk.list().is_empty());
        assert_eq!(f.book.get(&id).unwrap().status, EscrowStatus::Held);
    }

    #[test]
    fn duplicate_pending_rejected() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        f.submit(f.submission(id, "other", None)).unwrap();
        // The escrow is DISPUTED now, so the status check fires first.
        let err = f.submit(f.submission(id, "other", None)).unwrap_err();
        assert!(matches!(err, RefundError::EscrowNotRefundable { .. }));
    }

    #[test]
    fn open_request_on_held_escrow_is_duplicate() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        let now = Utc::now();
        let open = RefundRequest {
            id: RefundRequestId::new(),
            escrow_id: id,
            requester: f.payer,
            recipient: f.creator,
            escrow_total: TokenAmount::new(100),
            reason_code: "other".to_string(),
            description: String::new(),
            evidence: None,
            tier: RefundTier::Human,
            status: RefundStatus::AwaitingHuman,
            outcome: None,
            refund_amount: None,
            resolver: None,
            resolution_note: None,
            fraud_record_id: None,
            created_at: now,
            updated_at: now,
            escalated_at: None,
        };
        f.desk = RefundDesk::restore(RefundConfig::default(), vec![open]);
        let err = f.submit(f.submission(id, "other", None)).unwrap_err();
        assert!(matches!(err, RefundError::DuplicatePending { .. }));
    }

    // -- Tier 1 ------------------------------------------------------------

    #[test]
    fn undelivered_chat_is_full_refund() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 1000);
        let out = f
            .submit(f.submission(
                id,
                "message_not_delivered",
                Some(DeliveryEvidence::Chat { delivered: false }),
            ))
            .unwrap();
        assert_eq!(out.request.status, RefundStatus::Resolved);
        assert_eq!(out.request.outcome, Some(RefundOutcome::FullRefund));
        assert_eq!(out.request.refund_amount, Some(TokenAmount::new(1000)));
        assert_eq!(out.request.resolver, Some(Resolver::Auto));
        assert_eq!(out.escrow.status, EscrowStatus::Refunded);
        assert!(out.entry.is_some());
        assert_eq!(f.book.wallet(f.payer).available, TokenAmount::new(10_000));
    }

    #[test]
    fn short_call_is_partial_refund() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Call, 1000);
        let out = f
            .submit(f.submission(
                id,
                "technical_failure",
                Some(DeliveryEvidence::Call {
                    connected_seconds: 30,
                }),
            ))
            .unwrap();
        assert_eq!(out.request.outcome, Some(RefundOutcome::PartialRefund));
        assert_eq!(out.request.refund_amount, Some(TokenAmount::new(500)));
        assert_eq!(f.book.wallet(f.payer).available, TokenAmount::new(9_500));
        assert_eq!(f.book.wallet(f.creator).available, TokenAmount::new(325));
        assert_eq!(f.book.platform_balance(), TokenAmount::new(175));
    }

    #[test]
    fn completed_event_is_creator_win() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Event, 1000);
        let out = f
            .submit(f.submission(
                id,
                "technical_failure",
                Some(DeliveryEvidence::Event {
                    status: EventStatus::Completed,
                }),
            ))
            .unwrap();
        assert_eq!(out.request.outcome, Some(RefundOutcome::CreatorWins));
        assert_eq!(out.request.refund_amount, Some(TokenAmount::ZERO));
        assert_eq!(out.escrow.status, EscrowStatus::Released);
        assert_eq!(f.book.wallet(f.creator).available, TokenAmount::new(650));
    }

    // -- Tier 2 / 3 ----------------------------------------------------------

    #[test]
    fn tier_two_is_queued_and_reviewed() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Content, 400);
        let out = f.submit(f.submission(id, "low_quality", None)).unwrap();
        assert_eq!(out.request.status, RefundStatus::QueuedForReview);
        assert_eq!(out.request.tier, RefundTier::Assisted);
        assert_eq!(out.escrow.status, EscrowStatus::Disputed);
        assert_eq!(f.desk.queue().len(), 1);

        let moderator = UserId::new();
        let resolved = f
            .desk
            .review(
                &out.request.id,
                RefundOutcome::FullRefund,
                moderator,
                Some("content was blank".to_string()),
                &mut f.book,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(resolved.request.status, RefundStatus::Resolved);
        assert_eq!(resolved.request.resolver, Some(Resolver::Moderator(moderator)));
        assert_eq!(resolved.change.escrow.status, EscrowStatus::Refunded);
        assert!(f.desk.queue().is_empty());
    }

    #[test]
    fn review_rejects_tier_three() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        let out = f.submit(f.submission(id, "harassment", None)).unwrap();
        assert_eq!(out.request.status, RefundStatus::AwaitingHuman);
        let err = f
            .desk
            .review(
                &out.request.id,
                RefundOutcome::FullRefund,
                UserId::new(),
                None,
                &mut f.book,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, RefundError::InvalidRequestState { .. }));
    }

    #[test]
    fn admin_resolves_tier_three_partially() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 1000);
        let out = f.submit(f.submission(id, "scam", None)).unwrap();
        let admin = UserId::new();
        let resolved = f
            .desk
            .admin_resolve(
                &out.request.id,
                RefundOutcome::PartialRefund,
                admin,
                None,
                &mut f.book,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(resolved.request.refund_amount, Some(TokenAmount::new(500)));
        assert_eq!(resolved.request.resolver, Some(Resolver::Admin(admin)));
        let again = f.desk.admin_resolve(
            &out.request.id,
            RefundOutcome::FullRefund,
            admin,
            None,
            &mut f.book,
            Utc::now(),
        );
        assert!(matches!(again, Err(RefundError::InvalidRequestState { .. })));
    }

    #[test]
    fn stale_tier_two_escalates() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Content, 100);
        let out = f.submit(f.submission(id, "not_as_described", None)).unwrap();
        let delay = f.desk.config().escalation_delay();

        assert!(f
            .desk
            .escalate_stale(out.request.created_at + Duration::hours(1), delay)
            .is_empty());
        let escalated = f
            .desk
            .escalate_stale(out.request.created_at + Duration::hours(49), delay);
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].tier, RefundTier::Human);
        assert_eq!(escalated[0].status, RefundStatus::AwaitingHuman);
        assert!(escalated[0].escalated_at.is_some());
    }

    // -- Admin escrow overrides ----------------------------------------------

    #[test]
    fn admin_release_closes_pending_request() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        let out = f.submit(f.submission(id, "other", None)).unwrap();
        let (change, closed) = f
            .desk
            .admin_release(&id, UserId::new(), None, &mut f.book, Utc::now())
            .unwrap();
        assert_eq!(change.escrow.status, EscrowStatus::Released);
        let closed = closed.unwrap();
        assert_eq!(closed.id, out.request.id);
        assert_eq!(closed.outcome, Some(RefundOutcome::CreatorWins));
    }

    #[test]
    fn admin_refund_without_request() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        let (change, closed) = f
            .desk
            .admin_refund(&id, TokenAmount::new(100), UserId::new(), None, &mut f.book, Utc::now())
            .unwrap();
        assert_eq!(change.escrow.status, EscrowStatus::Refunded);
        assert!(closed.is_none());
    }

    // -- Fraud gating --------------------------------------------------------

    #[test]
    fn blocking_fraud_finding_rejects_request() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        let mut sub = f.submission(id, "other", None);
        sub.description = "refund me or I will hurt myself, you owe me".to_string();
        let out = f.submit(sub).unwrap();
        assert_eq!(out.request.status, RefundStatus::Rejected);
        assert_eq!(out.request.resolver, Some(Resolver::FraudEngine));
        let record = out.fraud_record.unwrap();
        assert_eq!(record.pattern, FraudPattern::EmotionalBlackmail);
        assert_eq!(out.request.fraud_record_id, Some(record.id));
        assert_eq!(f.book.get(&id).unwrap().status, EscrowStatus::Held);
    }

    #[test]
    fn warning_finding_is_recorded_but_request_proceeds() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Chat, 100);
        let mut sub = f.submission(id, "other", None);
        sub.description = "you led me on".to_string();
        let out = f.submit(sub).unwrap();
        assert_eq!(out.request.status, RefundStatus::AwaitingHuman);
        assert_eq!(out.fraud_record.unwrap().penalty, PenaltyAction::Warning);
    }

    #[test]
    fn fifth_approved_refund_is_refund_farming() {
        let mut f = Fixture::new();
        for _ in 0..4 {
            let id = f.open_to(UserId::new(), TransactionKind::Chat, 100);
            let out = f
                .submit(f.submission(
                    id,
                    "message_not_delivered",
                    Some(DeliveryEvidence::Chat { delivered: false }),
                ))
                .unwrap();
            assert_eq!(out.request.status, RefundStatus::Resolved);
        }
        let id = f.open_to(UserId::new(), TransactionKind::Chat, 100);
        let out = f
            .submit(f.submission(
                id,
                "message_not_delivered",
                Some(DeliveryEvidence::Chat { delivered: false }),
            ))
            .unwrap();
        assert_eq!(out.request.status, RefundStatus::Rejected);
        assert_eq!(
            out.fraud_record.unwrap().pattern,
            FraudPattern::RefundFarming
        );
        let history = f.desk.history_for(&f.payer);
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn account_age_comes_from_first_credit() {
        let mut f = Fixture::funded_at(Utc::now() - Duration::hours(2));
        let id = f.open(TransactionKind::Chat, 100);
        let out = f.submit(f.submission(id, "other", None)).unwrap();
        assert_eq!(out.request.status, RefundStatus::Rejected);
        let record = out.fraud_record.unwrap();
        assert_eq!(record.pattern, FraudPattern::NewAccountAbuse);
        assert_eq!(record.penalty, PenaltyAction::AccountReview);
    }

    // -- Rounding ------------------------------------------------------------

    #[test]
    fn one_token_short_call_settles_as_creator_win() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Call, 1);
        let out = f
            .submit(f.submission(
                id,
                "technical_failure",
                Some(DeliveryEvidence::Call {
                    connected_seconds: 30,
                }),
            ))
            .unwrap();
        assert_eq!(out.request.outcome, Some(RefundOutcome::CreatorWins));
        assert_eq!(out.request.refund_amount, Some(TokenAmount::ZERO));
        assert!(!out.request.was_approved());
        assert_eq!(out.escrow.status, EscrowStatus::Released);
    }

    #[test]
    fn one_token_partial_review_settles_as_creator_win() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Content, 1);
        let out = f.submit(f.submission(id, "low_quality", None)).unwrap();
        let resolved = f
            .desk
            .review(
                &out.request.id,
                RefundOutcome::PartialRefund,
                UserId::new(),
                None,
                &mut f.book,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(resolved.request.outcome, Some(RefundOutcome::CreatorWins));
        assert_eq!(resolved.change.escrow.status, EscrowStatus::Released);
    }

    // -- Rollback ------------------------------------------------------------

    #[test]
    fn rollback_forgets_request_and_dispute() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Content, 400);
        f.desk.begin();
        f.book.begin();
        f.submit(f.submission(id, "low_quality", None)).unwrap();
        assert_eq!(f.desk.rollback(), 1);
        f.book.rollback();

        assert!(f.desk.list().is_empty());
        assert_eq!(f.book.get(&id).unwrap().status, EscrowStatus::Held);
        // The payer can submit again once the failed attempt is undone.
        let out = f.submit(f.submission(id, "low_quality", None)).unwrap();
        assert_eq!(out.request.status, RefundStatus::QueuedForReview);
    }

    #[test]
    fn rollback_reverts_escalation() {
        let mut f = Fixture::new();
        let id = f.open(TransactionKind::Content, 100);
        let out = f.submit(f.submission(id, "not_as_described", None)).unwrap();
        let delay = f.desk.config().escalation_delay();

        f.desk.begin();
        let later = out.request.created_at + Duration::hours(49);
        assert_eq!(f.desk.escalate_stale(later, delay).len(), 1);
        f.desk.rollback();
        assert_eq!(
            f.desk.get(&out.request.id).unwrap().status,
            RefundStatus::QueuedForReview
        );
    }

    #[test]
    fn config_validation() {
        RefundConfig::default().validate().unwrap();
        let bad = RefundConfig {
            partial_refund_percent: 0,
            ..RefundConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
