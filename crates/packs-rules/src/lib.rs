//! # packs-rules — Heuristic Rule Engines
//!
//! Threshold and keyword heuristics over per-user counters. Nothing here
//! is a learned model: every decision is an ordered list of [`Rule`]s, each
//! a predicate plus weighted signals that produce a confidence in basis
//! points.
//!
//! - [`fraud`] — six refund-fraud patterns, severity bands, and penalties.
//! - [`safety`] — four-dimension safety score with decay and risk levels.
//! - [`abuse`] — message screening and the strike/sanction ladder.
//!
//! Evaluation is deterministic: the same context and rule order always
//! produce the same result, and ties go to the earliest rule.

pub mod abuse;
pub mod fraud;
pub mod rule;
pub mod safety;

pub use abuse::{
    AbuseCategory, AbuseConfig, AbuseFirewall, OffenderRecord, Sanction, ScreenOutcome,
    ScreenResult, Verdict,
};
pub use fraud::{
    FraudContext, FraudDetectionRecord, FraudEngine, FraudFinding, FraudPattern, FraudThresholds,
    PenaltyAction, RefundHistoryItem, Severity,
};
pub use rule::{
    confidence_basis_points, confidence_fraction, KeywordMatcher, Rule, RuleHit, RuleSet,
    WeightedSignal, FULL_CONFIDENCE,
};
pub use safety::{RiskLevel, SafetyConfig, SafetyDimension, SafetyEventKind, SafetyScore};
