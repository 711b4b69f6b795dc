//! # packs-ledger — Escrow Ledger
//!
//! Holds token payments between a payer and a recipient until the service
//! is delivered, then releases them (recipient + platform fee) or refunds
//! them (wholly or partly) to the payer.
//!
//! ## Accounting Model
//!
//! Every balance change is a [`LedgerEntry`](ledger::LedgerEntry) of
//! balanced postings appended to a hash-chained journal. Each user has an
//! *available* and an *in-escrow* bucket; the platform has one fee account;
//! the external account is the source of purchased tokens and is the only
//! account allowed to go negative. Balances are a maintained aggregate that
//! [`Ledger::replay`](ledger::Ledger::replay) can rebuild from the journal.
//!
//! ## Escrow Lifecycle
//!
//! ```text
//! HELD ──► RELEASED
//!   │  └─► REFUNDED
//!   └────► DISPUTED ──► RELEASED | REFUNDED
//! ```
//!
//! [`EscrowBook`](book::EscrowBook) owns both the journal and the escrow
//! records. Callers guard it with a single mutex so that validation and
//! mutation happen atomically.

pub mod book;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod policy;
pub mod split;

pub use book::{EscrowBook, EscrowChange, OpenEscrow, SweepReport, WalletBalance};
pub use error::LedgerError;
pub use escrow::{
    EscrowId, EscrowRecord, EscrowStatus, ReleaseTrigger, Settlement, StatusTransition,
    TransactionKind,
};
pub use ledger::{AccountId, EntryKind, Ledger, LedgerEntry, Posting};
pub use policy::{EscrowPolicy, KindWindows};
pub use split::{Split, SplitRatio};
