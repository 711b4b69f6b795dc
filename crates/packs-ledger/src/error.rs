//! # Ledger Error Types
//!
//! Every variant carries the identifiers and amounts an operator needs to
//! diagnose the rejection. Escrow status errors include the escrow id, the
//! attempted operation, and the status the escrow was actually in.

use packs_core::ValidationError;
use thiserror::Error;

/// Errors arising from ledger and escrow operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The payer's available balance cannot cover the amount.
    #[error("insufficient funds for {user}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The user whose balance was checked.
        user: String,
        /// Available balance at the time of the check.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// Escrow operation attempted from a status that does not permit it.
    #[error("escrow {escrow_id} cannot perform {operation}: status {status} is not {expected}")]
    InvalidEscrowOperation {
        /// The escrow identifier.
        escrow_id: String,
        /// The attempted operation (e.g. "release").
        operation: String,
        /// The current escrow status.
        status: String,
        /// The status (or statuses) the operation requires.
        expected: &'static str,
    },

    /// No escrow with this identifier exists.
    #[error("escrow {0} not found")]
    EscrowNotFound(String),

    /// An auto-release was attempted before the escrow's deadline.
    #[error("escrow {escrow_id} is not eligible for auto-release until {auto_release_at}")]
    ReleaseNotYetEligible {
        /// The escrow identifier.
        escrow_id: String,
        /// The auto-release deadline (RFC 3339).
        auto_release_at: String,
    },

    /// A refund larger than the escrowed total was requested.
    #[error("refund of {requested} exceeds escrow {escrow_id} total {total}")]
    RefundExceedsTotal {
        /// The escrow identifier.
        escrow_id: String,
        /// The requested refund amount.
        requested: u64,
        /// The escrow total.
        total: u64,
    },

    /// Payer and recipient are the same account.
    #[error("payer and recipient must differ")]
    SelfEscrow,

    /// A zero amount was supplied where a positive amount is required.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// A balance computation overflowed.
    #[error("amount overflow on {account}")]
    AmountOverflow {
        /// The account whose balance overflowed.
        account: String,
    },

    /// A posting would leave a non-external account negative.
    #[error("posting would overdraw {account}: balance {balance}, delta {delta}")]
    Overdraw {
        /// The account that would go negative.
        account: String,
        /// Its balance before the posting.
        balance: i64,
        /// The rejected delta.
        delta: i64,
    },

    /// An entry's postings do not sum to zero.
    #[error("entry {sequence} is unbalanced: postings sum to {sum}")]
    Unbalanced {
        /// Sequence number of the offending entry.
        sequence: u64,
        /// The non-zero sum.
        sum: i128,
    },

    /// The journal's hash chain does not verify.
    #[error("ledger chain broken at entry {sequence}: {reason}")]
    ChainBroken {
        /// Sequence number of the first entry that fails verification.
        sequence: u64,
        /// What failed.
        reason: String,
    },

    /// A domain value failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Entry digest computation failed.
    #[error("digest error: {0}")]
    Digest(#[from] serde_json::Error),
}
