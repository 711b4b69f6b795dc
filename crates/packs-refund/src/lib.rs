//! # packs-refund — Tiered Refund Resolution
//!
//! Routes a payer's refund request for an escrow through one of three
//! tiers, chosen by the request's reason code:
//!
//! | Tier | Reasons | Handling |
//! |---|---|---|
//! | 1 (auto) | delivery failures | evaluated against delivery evidence and settled immediately |
//! | 2 (assisted) | quality complaints | escrow DISPUTED, queued for moderator review |
//! | 3 (human) | everything else | escrow DISPUTED, awaiting an administrator |
//!
//! A handful of reasons (changed mind, no romantic interest, …) are never
//! refundable and are rejected before the escrow or fraud engine is
//! consulted. Every accepted request is screened by the fraud engine first;
//! a blocking finding stores the request as REJECTED.
//!
//! Tier-2 requests left in the queue past the escalation delay move to
//! tier 3. Administrators can resolve any open request, or release/refund
//! an escrow directly.
//!
//! ## Locking
//!
//! [`RefundDesk`] operations take `&mut EscrowBook`. Callers that guard
//! both with mutexes always lock the desk first, then the book.

pub mod desk;
pub mod error;
pub mod evaluation;
pub mod reason;
pub mod request;

pub use desk::{RefundConfig, RefundDesk, RefundSubmission, ResolveOutcome, SubmitOutcome};
pub use error::RefundError;
pub use evaluation::{auto_evaluate, DeliveryEvidence, EventStatus, RefundOutcome};
pub use reason::{classify, ReasonClass, RefundTier};
pub use request::{RefundRequest, RefundRequestId, RefundStatus, Resolver};
