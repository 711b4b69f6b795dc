//! # Escrow Book
//!
//! Owns the journal and every escrow record. Each operation validates
//! against the current state, stages the record change on a copy, posts
//! the balanced ledger entry, and only then commits the record. A failed
//! posting leaves both the journal and the record untouched.
//!
//! Callers that persist changes elsewhere wrap a group of operations in
//! [`EscrowBook::begin`]. If the outside write fails,
//! [`EscrowBook::rollback`] drops the entries posted since `begin` and puts
//! every touched record back, so the journal never runs ahead of storage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use packs_core::{TokenAmount, UndoLog, UserId, ValidationError};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::escrow::{EscrowId, EscrowRecord, EscrowStatus, ReleaseTrigger, Settlement};
use crate::ledger::{AccountId, EntryKind, Ledger, LedgerEntry, Posting};
use crate::policy::EscrowPolicy;
use crate::split::SplitRatio;
use crate::TransactionKind;

/// Parameters for [`EscrowBook::open_escrow`].
#[derive(Debug, Clone)]
pub struct OpenEscrow {
    /// The paying user.
    pub payer: UserId,
    /// The receiving user.
    pub recipient: UserId,
    /// The service being paid for.
    pub kind: TransactionKind,
    /// Reference to the message/call/event/content.
    pub reference: String,
    /// Amount to hold.
    pub total: TokenAmount,
    /// Recipient/platform split.
    pub split: SplitRatio,
}

/// An escrow after a money-moving operation, with the entry that moved it.
#[derive(Debug, Clone, Serialize)]
pub struct EscrowChange {
    /// The escrow's new state.
    pub escrow: EscrowRecord,
    /// The journal entry recorded.
    pub entry: LedgerEntry,
}

/// An escrow the sweep could not release.
#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    /// The escrow left HELD.
    pub escrow_id: EscrowId,
    /// Why the release failed.
    pub error: String,
}

/// Outcome of [`EscrowBook::sweep_auto_release`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Escrows released in this sweep.
    pub released: Vec<EscrowChange>,
    /// Escrows that stayed HELD for the next sweep.
    pub failures: Vec<SweepFailure>,
}

/// A user's two balance buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    /// The wallet owner.
    pub user: UserId,
    /// Spendable tokens.
    pub available: TokenAmount,
    /// Tokens committed to open escrows.
    pub in_escrow: TokenAmount,
}

/// Journal plus escrow records, guarded as one unit by the caller.
#[derive(Debug, Default)]
pub struct EscrowBook {
    ledger: Ledger,
    escrows: HashMap<EscrowId, EscrowRecord>,
    policy: EscrowPolicy,
    undo: UndoLog<EscrowId, EscrowRecord>,
    /// Journal length when the open unit began.
    journal_mark: usize,
}

impl EscrowBook {
    /// An empty book.
    pub fn new(policy: EscrowPolicy) -> Self {
        Self {
            ledger: Ledger::new(),
            escrows: HashMap::new(),
            policy,
            undo: UndoLog::default(),
            journal_mark: 0,
        }
    }

    /// Rebuild a book from persisted journal entries and escrow records.
    ///
    /// The journal is replayed and chain-verified; records are trusted as
    /// stored.
    pub fn restore(
        policy: EscrowPolicy,
        entries: Vec<LedgerEntry>,
        escrows: Vec<EscrowRecord>,
    ) -> Result<Self, LedgerError> {
        let ledger = Ledger::replay(entries)?;
        let escrows = escrows.into_iter().map(|e| (e.id, e)).collect();
        Ok(Self {
            ledger,
            escrows,
            policy,
            undo: UndoLog::default(),
            journal_mark: 0,
        })
    }

    /// Start a unit of work that [`rollback`](Self::rollback) can undo.
    pub fn begin(&mut self) {
        if !self.undo.is_open() {
            self.journal_mark = self.ledger.len();
        }
        self.undo.begin();
    }

    /// Keep every change made since [`begin`](Self::begin).
    pub fn commit(&mut self) {
        self.undo.commit();
    }

    /// Undo every change made since [`begin`](Self::begin). Returns how many
    /// journal entries were dropped.
    pub fn rollback(&mut self) -> usize {
        if !self.undo.is_open() {
            return 0;
        }
        let dropped = self.ledger.rewind(self.journal_mark);
        let restored = self.undo.rollback_into(&mut self.escrows);
        if dropped > 0 || restored > 0 {
            tracing::warn!(
                entries = dropped,
                escrows = restored,
                "escrow book rolled back"
            );
        }
        dropped
    }

    fn store(&mut self, record: EscrowRecord) {
        self.undo.note(record.id, self.escrows.get(&record.id));
        self.escrows.insert(record.id, record);
    }

    /// The active time-window policy.
    pub fn policy(&self) -> &EscrowPolicy {
        &self.policy
    }

    /// The underlying journal.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Look up an escrow.
    pub fn get(&self, id: &EscrowId) -> Option<&EscrowRecord> {
        self.escrows.get(id)
    }

    /// Look up an escrow or fail with [`LedgerError::EscrowNotFound`].
    pub fn require(&self, id: &EscrowId) -> Result<&EscrowRecord, LedgerError> {
        self.escrows
            .get(id)
            .ok_or_else(|| LedgerError::EscrowNotFound(id.to_string()))
    }

    /// All escrows, oldest first.
    pub fn list(&self) -> Vec<EscrowRecord> {
        let mut all: Vec<EscrowRecord> = self.escrows.values().cloned().collect();
        all.sort_by_key(|e| (e.created_at, e.id));
        all
    }

    /// Escrow count per status, in [`EscrowStatus::ALL`] order.
    pub fn count_by_status(&self) -> Vec<(EscrowStatus, usize)> {
        EscrowStatus::ALL
            .into_iter()
            .map(|s| (s, self.escrows.values().filter(|e| e.status == s).count()))
            .collect()
    }

    /// A user's balances.
    pub fn wallet(&self, user: UserId) -> WalletBalance {
        WalletBalance {
            user,
            available: non_negative(self.ledger.balance(&AccountId::Available(user))),
            in_escrow: non_negative(self.ledger.balance(&AccountId::InEscrow(user))),
        }
    }

    /// Accumulated platform fees.
    pub fn platform_balance(&self) -> TokenAmount {
        non_negative(self.ledger.balance(&AccountId::Platform))
    }

    /// When `user`'s wallet first received tokens.
    pub fn account_opened_at(&self, user: UserId) -> Option<DateTime<Utc>> {
        self.ledger.opened_at(&AccountId::Available(user))
    }

    /// Verify the journal's hash chain.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        self.ledger.verify_chain()
    }

    /// Top up a wallet from the external (purchases) account.
    pub fn credit(
        &mut self,
        user: UserId,
        amount: TokenAmount,
        memo: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let delta = delta_of(amount, &AccountId::Available(user))?;
        let entry = self
            .ledger
            .post(
                EntryKind::Credit,
                None,
                memo,
                vec![
                    Posting::new(AccountId::External, -delta),
                    Posting::new(AccountId::Available(user), delta),
                ],
                now,
            )?
            .clone();
        tracing::info!(user = %user, amount = amount.value(), sequence = entry.sequence, "wallet credited");
        Ok(entry)
    }

    /// Hold `total` tokens from the payer.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAmount`], [`LedgerError::SelfEscrow`], an empty
    /// reference, or [`LedgerError::InsufficientFunds`].
    pub fn open_escrow(
        &mut self,
        req: OpenEscrow,
        now: DateTime<Utc>,
    ) -> Result<EscrowChange, LedgerError> {
        if req.total.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        if req.payer == req.recipient {
            return Err(LedgerError::SelfEscrow);
        }
        if req.reference.trim().is_empty() {
            return Err(ValidationError::EmptyField("reference").into());
        }
        let available = self.wallet(req.payer).available;
        if available < req.total {
            return Err(LedgerError::InsufficientFunds {
                user: req.payer.to_string(),
                available: available.value(),
                requested: req.total.value(),
            });
        }

        let windows = self.policy.windows(req.kind);
        let shares = req.split.split(req.total);
        let record = EscrowRecord {
            id: EscrowId::new(),
            payer: req.payer,
            recipient: req.recipient,
            kind: req.kind,
            reference: req.reference,
            total: req.total,
            split: req.split,
            recipient_share: shares.recipient,
            platform_share: shares.platform,
            status: EscrowStatus::Held,
            created_at: now,
            release_deadline: now + windows.refund_window(),
            auto_release_at: now + windows.auto_release_after(),
            settlement: None,
            transitions: Vec::new(),
        };

        let delta = delta_of(req.total, &AccountId::InEscrow(req.payer))?;
        let entry = self
            .ledger
            .post(
                EntryKind::EscrowOpen,
                Some(*record.id.as_uuid()),
                format!("{} {}", record.kind, record.reference),
                vec![
                    Posting::new(AccountId::Available(req.payer), -delta),
                    Posting::new(AccountId::InEscrow(req.payer), delta),
                ],
                now,
            )?
            .clone();

        tracing::info!(
            escrow_id = %record.id,
            payer = %record.payer,
            recipient = %record.recipient,
            kind = %record.kind,
            total = record.total.value(),
            split = %record.split,
            "escrow opened"
        );
        self.store(record.clone());
        Ok(EscrowChange {
            escrow: record,
            entry,
        })
    }

    /// Pay an escrow out to the recipient and platform.
    ///
    /// Payer and auto-release triggers require HELD; auto-release also
    /// requires `now >= auto_release_at`. Admin may release a DISPUTED
    /// escrow as well.
    pub fn release(
        &mut self,
        id: &EscrowId,
        trigger: ReleaseTrigger,
        now: DateTime<Utc>,
    ) -> Result<EscrowChange, LedgerError> {
        let current = self.require(id)?;
        match trigger {
            ReleaseTrigger::Admin => current.require_status(
                "release",
                &[EscrowStatus::Held, EscrowStatus::Disputed],
                "HELD or DISPUTED",
            )?,
            ReleaseTrigger::Payer | ReleaseTrigger::AutoRelease => {
                current.require_status("release", &[EscrowStatus::Held], "HELD")?
            }
        }
        if trigger == ReleaseTrigger::AutoRelease && now < current.auto_release_at {
            return Err(LedgerError::ReleaseNotYetEligible {
                escrow_id: id.to_string(),
                auto_release_at: current.auto_release_at.to_rfc3339(),
            });
        }

        let mut staged = current.clone();
        let settlement = staged.release_settlement();
        staged.transition(EscrowStatus::Released, trigger.as_str(), now)?;
        staged.settlement = Some(settlement);

        let postings = settlement_postings(&staged, &settlement)?;
        let entry = self
            .ledger
            .post(
                EntryKind::EscrowRelease,
                Some(*id.as_uuid()),
                format!("release ({})", trigger.as_str()),
                postings,
                now,
            )?
            .clone();

        tracing::info!(
            escrow_id = %id,
            trigger = trigger.as_str(),
            recipient_amount = settlement.recipient_amount.value(),
            platform_fee = settlement.platform_fee.value(),
            "escrow released"
        );
        self.store(staged.clone());
        Ok(EscrowChange {
            escrow: staged,
            entry,
        })
    }

    /// Return `refund_amount` to the payer; the remainder is split with the
    /// escrow's ratio. Allowed from HELD or DISPUTED.
    pub fn refund(
        &mut self,
        id: &EscrowId,
        refund_amount: TokenAmount,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<EscrowChange, LedgerError> {
        let current = self.require(id)?;
        current.require_status(
            "refund",
            &[EscrowStatus::Held, EscrowStatus::Disputed],
            "HELD or DISPUTED",
        )?;
        if refund_amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let mut staged = current.clone();
        let settlement = staged.refund_settlement(refund_amount)?;
        staged.transition(EscrowStatus::Refunded, reason, now)?;
        staged.settlement = Some(settlement);

        let postings = settlement_postings(&staged, &settlement)?;
        let entry = self
            .ledger
            .post(
                EntryKind::EscrowRefund,
                Some(*id.as_uuid()),
                format!("refund: {reason}"),
                postings,
                now,
            )?
            .clone();

        tracing::info!(
            escrow_id = %id,
            payer_refund = settlement.payer_refund.value(),
            recipient_amount = settlement.recipient_amount.value(),
            platform_fee = settlement.platform_fee.value(),
            "escrow refunded"
        );
        self.store(staged.clone());
        Ok(EscrowChange {
            escrow: staged,
            entry,
        })
    }

    /// Freeze a HELD escrow while a refund request is reviewed.
    pub fn dispute(
        &mut self,
        id: &EscrowId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<EscrowRecord, LedgerError> {
        let current = self.require(id)?;
        current.require_status("dispute", &[EscrowStatus::Held], "HELD")?;
        let mut staged = current.clone();
        staged.transition(EscrowStatus::Disputed, reason, now)?;
        tracing::info!(escrow_id = %id, reason, "escrow disputed");
        self.store(staged.clone());
        Ok(staged)
    }

    /// Release every HELD escrow whose auto-release deadline has passed.
    ///
    /// Failures are reported and leave the escrow HELD.
    pub fn sweep_auto_release(&mut self, now: DateTime<Utc>) -> SweepReport {
        let mut due: Vec<(DateTime<Utc>, EscrowId)> = self
            .escrows
            .values()
            .filter(|e| e.auto_release_due(now))
            .map(|e| (e.auto_release_at, e.id))
            .collect();
        due.sort();

        let mut report = SweepReport::default();
        for (_, id) in due {
            match self.release(&id, ReleaseTrigger::AutoRelease, now) {
                Ok(change) => report.released.push(change),
                Err(e) => {
                    tracing::warn!(escrow_id = %id, error = %e, "auto-release failed; escrow stays HELD");
                    report.failures.push(SweepFailure {
                        escrow_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }
        if !report.released.is_empty() || !report.failures.is_empty() {
            tracing::info!(
                released = report.released.len(),
                failed = report.failures.len(),
                "auto-release sweep complete"
            );
        }
        report
    }
}

fn non_negative(balance: i64) -> TokenAmount {
    TokenAmount::new(u64::try_from(balance).unwrap_or(0))
}

fn delta_of(amount: TokenAmount, account: &AccountId) -> Result<i64, LedgerError> {
    amount.as_delta().ok_or_else(|| LedgerError::AmountOverflow {
        account: account.to_string(),
    })
}

/// Postings that empty the payer's in-escrow bucket according to `s`.
fn settlement_postings(
    escrow: &EscrowRecord,
    s: &Settlement,
) -> Result<Vec<Posting>, LedgerError> {
    let held = AccountId::InEscrow(escrow.payer);
    let mut postings = vec![Posting::new(held, -delta_of(escrow.total, &held)?)];
    let legs = [
        (AccountId::Available(escrow.payer), s.payer_refund),
        (AccountId::Available(escrow.recipient), s.recipient_amount),
        (AccountId::Platform, s.platform_fee),
    ];
    for (account, amount) in legs {
        if !amount.is_zero() {
            postings.push(Posting::new(account, delta_of(amount, &account)?));
        }
    }
    Ok(postings)
}
