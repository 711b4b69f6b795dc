//! # Hash-Chained Journal
//!
//! An append-only list of [`LedgerEntry`] values. Each entry carries
//! balanced [`Posting`]s and the digest of its predecessor, so any edit to
//! a recorded entry breaks [`Ledger::verify_chain`].
//!
//! Balances are maintained incrementally on every [`Ledger::post`] and can
//! be recomputed from scratch with [`Ledger::replay`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use packs_core::{EntryDigest, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

// ── Accounts ───────────────────────────────────────────────────────────

/// A balance-carrying account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "user", rename_all = "snake_case")]
pub enum AccountId {
    /// Tokens a user can spend.
    Available(UserId),
    /// Tokens a user has committed to open escrows.
    InEscrow(UserId),
    /// Platform fee revenue.
    Platform,
    /// Source of purchased tokens. The only account allowed below zero.
    External,
}

impl AccountId {
    /// Whether this account may carry a negative balance.
    pub fn may_go_negative(&self) -> bool {
        matches!(self, Self::External)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(u) => write!(f, "user:{u}:available"),
            Self::InEscrow(u) => write!(f, "user:{u}:in_escrow"),
            Self::Platform => f.write_str("platform"),
            Self::External => f.write_str("external"),
        }
    }
}

/// One leg of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// The account affected.
    pub account: AccountId,
    /// Signed change in tokens.
    pub delta: i64,
}

impl Posting {
    /// Shorthand constructor.
    pub fn new(account: AccountId, delta: i64) -> Self {
        Self { account, delta }
    }
}

/// What produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Wallet top-up from a purchase.
    Credit,
    /// Funds moved from available into escrow.
    EscrowOpen,
    /// Escrow paid out to recipient and platform.
    EscrowRelease,
    /// Escrow returned (wholly or partly) to the payer.
    EscrowRefund,
}

impl EntryKind {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::EscrowOpen => "ESCROW_OPEN",
            Self::EscrowRelease => "ESCROW_RELEASE",
            Self::EscrowRefund => "ESCROW_REFUND",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Entries ────────────────────────────────────────────────────────────

/// A recorded journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// 1-based position in the journal.
    pub sequence: u64,
    /// What produced this entry.
    pub kind: EntryKind,
    /// The escrow this entry belongs to, if any.
    pub escrow_id: Option<Uuid>,
    /// Free-text memo.
    pub memo: String,
    /// Balanced postings.
    pub postings: Vec<Posting>,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Digest of the previous entry (genesis digest for the first).
    pub prev_hash: EntryDigest,
    /// Digest of this entry's body including `prev_hash`.
    pub hash: EntryDigest,
}

#[derive(Serialize)]
struct EntryBody<'a> {
    sequence: u64,
    kind: EntryKind,
    escrow_id: Option<&'a Uuid>,
    memo: &'a str,
    postings: &'a [Posting],
    recorded_at: &'a DateTime<Utc>,
    prev_hash: &'a EntryDigest,
}

impl LedgerEntry {
    fn body(&self) -> EntryBody<'_> {
        EntryBody {
            sequence: self.sequence,
            kind: self.kind,
            escrow_id: self.escrow_id.as_ref(),
            memo: &self.memo,
            postings: &self.postings,
            recorded_at: &self.recorded_at,
            prev_hash: &self.prev_hash,
        }
    }

    /// Recompute this entry's digest from its body.
    pub fn compute_hash(&self) -> Result<EntryDigest, LedgerError> {
        Ok(EntryDigest::of(&self.body())?)
    }

    /// Sum of all posting deltas. Zero for a balanced entry.
    pub fn posting_sum(&self) -> i128 {
        self.postings.iter().map(|p| i128::from(p.delta)).sum()
    }
}

// ── Ledger ─────────────────────────────────────────────────────────────

/// The journal plus its maintained balance aggregate.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    balances: HashMap<AccountId, i64>,
    /// Sequence and time of each account's first posting.
    opened: HashMap<AccountId, (u64, DateTime<Utc>)>,
}

impl Ledger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from a previously recorded journal.
    ///
    /// Verifies the hash chain first, then re-applies every entry with the
    /// same balance checks [`post`](Self::post) enforces.
    pub fn replay(entries: Vec<LedgerEntry>) -> Result<Self, LedgerError> {
        verify_entries(&entries)?;
        let mut balances = HashMap::new();
        let mut opened = HashMap::new();
        for entry in &entries {
            let next = apply_postings(&balances, entry.sequence, &entry.postings)?;
            balances.extend(next);
            note_opened(&mut opened, entry);
        }
        Ok(Self {
            entries,
            balances,
            opened,
        })
    }

    /// Append a balanced entry.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unbalanced`] if postings do not sum to zero,
    /// [`LedgerError::Overdraw`] if a non-external account would go
    /// negative, [`LedgerError::AmountOverflow`] on arithmetic overflow.
    /// On error nothing is recorded.
    pub fn post(
        &mut self,
        kind: EntryKind,
        escrow_id: Option<Uuid>,
        memo: impl Into<String>,
        postings: Vec<Posting>,
        now: DateTime<Utc>,
    ) -> Result<&LedgerEntry, LedgerError> {
        let sequence = self.entries.len() as u64 + 1;
        let sum: i128 = postings.iter().map(|p| i128::from(p.delta)).sum();
        if sum != 0 || postings.is_empty() {
            return Err(LedgerError::Unbalanced { sequence, sum });
        }
        let updated = apply_postings(&self.balances, sequence, &postings)?;

        let prev_hash = self.head_hash();
        let mut entry = LedgerEntry {
            sequence,
            kind,
            escrow_id,
            memo: memo.into(),
            postings,
            recorded_at: now,
            prev_hash,
            hash: EntryDigest::genesis(),
        };
        entry.hash = entry.compute_hash()?;

        self.balances.extend(updated);
        note_opened(&mut self.opened, &entry);
        let idx = self.entries.len();
        self.entries.push(entry);
        Ok(&self.entries[idx])
    }

    /// Drop every entry after the first `len`, newest first, reversing
    /// each one's postings. Returns how many entries were dropped.
    pub fn rewind(&mut self, len: usize) -> usize {
        let mut dropped = 0;
        while self.entries.len() > len {
            let Some(entry) = self.entries.pop() else {
                break;
            };
            for p in &entry.postings {
                if let Some(balance) = self.balances.get_mut(&p.account) {
                    *balance -= p.delta;
                }
            }
            self.opened.retain(|_, (sequence, _)| *sequence < entry.sequence);
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, len, "journal rewound");
        }
        dropped
    }

    /// When `account` first received a posting.
    pub fn opened_at(&self, account: &AccountId) -> Option<DateTime<Utc>> {
        self.opened.get(account).map(|(_, at)| *at)
    }

    /// Current balance of an account (zero if never touched).
    pub fn balance(&self, account: &AccountId) -> i64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// All recorded entries, oldest first.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Digest of the newest entry, or the genesis digest.
    pub fn head_hash(&self) -> EntryDigest {
        self.entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(EntryDigest::genesis)
    }

    /// Verify sequence numbering, balance, and the hash chain.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        verify_entries(&self.entries)
    }

    /// Recompute every balance from the journal and compare with the
    /// maintained aggregate.
    pub fn balances_consistent(&self) -> bool {
        let mut recomputed: HashMap<AccountId, i64> = HashMap::new();
        for entry in &self.entries {
            for p in &entry.postings {
                *recomputed.entry(p.account).or_insert(0) += p.delta;
            }
        }
        recomputed
            .iter()
            .all(|(account, bal)| self.balance(account) == *bal)
            && self
                .balances
                .iter()
                .all(|(account, bal)| recomputed.get(account).copied().unwrap_or(0) == *bal)
    }

    /// Sum of every balance. Always zero for a consistent ledger.
    pub fn total_supply_check(&self) -> i128 {
        self.balances.values().map(|b| i128::from(*b)).sum()
    }
}

fn note_opened(opened: &mut HashMap<AccountId, (u64, DateTime<Utc>)>, entry: &LedgerEntry) {
    for p in &entry.postings {
        opened
            .entry(p.account)
            .or_insert((entry.sequence, entry.recorded_at));
    }
}

/// Compute the post-image of every account touched by `postings`.
fn apply_postings(
    balances: &HashMap<AccountId, i64>,
    sequence: u64,
    postings: &[Posting],
) -> Result<HashMap<AccountId, i64>, LedgerError> {
    let mut touched: HashMap<AccountId, i64> = HashMap::new();
    for p in postings {
        let current = touched
            .get(&p.account)
            .copied()
            .unwrap_or_else(|| balances.get(&p.account).copied().unwrap_or(0));
        let next = current
            .checked_add(p.delta)
            .ok_or_else(|| LedgerError::AmountOverflow {
                account: p.account.to_string(),
            })?;
        touched.insert(p.account, next);
    }
    for (account, bal) in &touched {
        if *bal < 0 && !account.may_go_negative() {
            let before = balances.get(account).copied().unwrap_or(0);
            let delta = bal - before;
            tracing::debug!(sequence, %account, before, delta, "posting rejected: overdraw");
            return Err(LedgerError::Overdraw {
                account: account.to_string(),
                balance: before,
                delta,
            });
        }
    }
    Ok(touched)
}

fn verify_entries(entries: &[LedgerEntry]) -> Result<(), LedgerError> {
    let mut prev = EntryDigest::genesis();
    for (idx, entry) in entries.iter().enumerate() {
        let expected_seq = idx as u64 + 1;
        if entry.sequence != expected_seq {
            return Err(LedgerError::ChainBroken {
                sequence: entry.sequence,
                reason: format!("expected sequence {expected_seq}"),
            });
        }
        if entry.prev_hash != prev {
            return Err(LedgerError::ChainBroken {
                sequence: entry.sequence,
                reason: "prev_hash does not match predecessor".to_string(),
            });
        }
        let sum = entry.posting_sum();
        if sum != 0 {
            return Err(LedgerError::Unbalanced {
                sequence: entry.sequence,
                sum,
            });
        }
        if entry.compute_hash()? != entry.hash {
            return Err(LedgerError::ChainBroken {
                sequence: entry.sequence,
                reason: "hash mismatch".to_string(),
            });
        }
        prev = entry.hash.clone();
    }
    Ok(())
}
