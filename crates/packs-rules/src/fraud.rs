//! # Refund Fraud Heuristics
//!
//! Six patterns evaluated against a refund requester's recent history and
//! the free text of the request. The [`FraudEngine`] runs every rule, keeps
//! the highest-confidence hit, and ignores hits below the reporting
//! threshold.
//!
//! | Confidence | Severity | Penalty | Blocks refund |
//! |---|---|---|---|
//! | ≥ 0.90 | CRITICAL | SUSPENSION | yes |
//! | ≥ 0.75 | HIGH | ACCOUNT_REVIEW | yes |
//! | ≥ 0.60 | MEDIUM | REFUND_RESTRICTION | yes |
//! | otherwise | LOW | WARNING | no |

use chrono::{DateTime, Duration, Utc};
use packs_core::{UserId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rule::{
    confidence_basis_points, confidence_fraction, KeywordMatcher, Rule, RuleHit, RuleSet,
    WeightedSignal,
};

// ---------------------------------------------------------------------------
// Patterns, severity, penalties
// ---------------------------------------------------------------------------

/// A named fraud pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudPattern {
    /// Many refunds, nearly all approved.
    RefundFarming,
    /// Self-harm or guilt pressure in the request text.
    EmotionalBlackmail,
    /// Romantic entitlement in the request text.
    RomanceManipulation,
    /// Freshly created account requesting a refund.
    NewAccountAbuse,
    /// Repeated refunds against one recipient.
    RepeatTargeting,
    /// Large refunded volume in a short window.
    RefundVelocity,
}

impl FraudPattern {
    /// All patterns in evaluation order.
    pub const ALL: [FraudPattern; 6] = [
        Self::RefundFarming,
        Self::EmotionalBlackmail,
        Self::RomanceManipulation,
        Self::NewAccountAbuse,
        Self::RepeatTargeting,
        Self::RefundVelocity,
    ];

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefundFarming => "REFUND_FARMING",
            Self::EmotionalBlackmail => "EMOTIONAL_BLACKMAIL",
            Self::RomanceManipulation => "ROMANCE_MANIPULATION",
            Self::NewAccountAbuse => "NEW_ACCOUNT_ABUSE",
            Self::RepeatTargeting => "REPEAT_TARGETING",
            Self::RefundVelocity => "REFUND_VELOCITY",
        }
    }

    /// Parse a canonical name.
    pub fn from_code(code: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == code)
            .ok_or_else(|| ValidationError::UnknownCode {
                kind: "fraud pattern",
                value: code.to_string(),
            })
    }
}

impl std::fmt::Display for FraudPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity band derived from confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Below 0.6.
    Low,
    /// 0.6 up to 0.75.
    Medium,
    /// 0.75 up to 0.9.
    High,
    /// 0.9 and above.
    Critical,
}

impl Severity {
    /// Band for a confidence in basis points.
    pub fn from_confidence(basis_points: u32) -> Self {
        if basis_points >= 9_000 {
            Self::Critical
        } else if basis_points >= 7_500 {
            Self::High
        } else if basis_points >= 6_000 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// The penalty this severity carries.
    pub fn penalty(&self) -> PenaltyAction {
        match self {
            Self::Low => PenaltyAction::Warning,
            Self::Medium => PenaltyAction::RefundRestriction,
            Self::High => PenaltyAction::AccountReview,
            Self::Critical => PenaltyAction::Suspension,
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Penalty applied to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PenaltyAction {
    /// Recorded only.
    Warning,
    /// Refund denied.
    RefundRestriction,
    /// Refund denied and account queued for review.
    AccountReview,
    /// Refund denied and account suspended.
    Suspension,
}

impl PenaltyAction {
    /// Whether this penalty rejects the refund request.
    pub fn blocks_refund(&self) -> bool {
        !matches!(self, Self::Warning)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::RefundRestriction => "REFUND_RESTRICTION",
            Self::AccountReview => "ACCOUNT_REVIEW",
            Self::Suspension => "SUSPENSION",
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Tunable thresholds for every pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudThresholds {
    /// Minimum requests in the farming window.
    pub farming_min_requests: usize,
    /// Farming look-back in days.
    pub farming_window_days: i64,
    /// Minimum approval rate (percent) among resolved requests.
    pub farming_min_approval_pct: u32,
    /// Accounts younger than this many days count as new.
    pub new_account_days: i64,
    /// Minimum requests against one recipient in the targeting window.
    pub repeat_target_min_requests: usize,
    /// Targeting look-back in days.
    pub repeat_target_window_days: i64,
    /// Velocity look-back in hours.
    pub velocity_window_hours: i64,
    /// Requested refund volume that trips the velocity rule.
    pub velocity_max_tokens: u64,
    /// Hits below this confidence are ignored.
    pub report_threshold: f64,
    /// Emotional blackmail phrases.
    pub blackmail_phrases: Vec<String>,
    /// Romance manipulation phrases.
    pub romance_phrases: Vec<String>,
}

impl Default for FraudThresholds {
    fn default() -> Self {
        Self {
            farming_min_requests: 5,
            farming_window_days: 30,
            farming_min_approval_pct: 80,
            new_account_days: 7,
            repeat_target_min_requests: 3,
            repeat_target_window_days: 30,
            velocity_window_hours: 24,
            velocity_max_tokens: 5_000,
            report_threshold: 0.5,
            blackmail_phrases: [
                "hurt myself",
                "kill myself",
                "you owe me",
                "after everything i did",
                "your fault",
                "i will expose you",
                "i will tell everyone",
                "make you regret",
            ]
            .map(String::from)
            .to_vec(),
            romance_phrases: [
                "you promised to love",
                "i thought we had something",
                "i thought you loved me",
                "you led me on",
                "you said you cared",
                "we had a connection",
                "you broke my heart",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl FraudThresholds {
    /// Range-check every threshold.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.farming_min_approval_pct > 100 {
            return Err(ValidationError::PercentOutOfRange {
                field: "fraud.farming_min_approval_pct",
                value: self.farming_min_approval_pct,
                min: 0,
                max: 100,
            });
        }
        if !(0.0..=1.0).contains(&self.report_threshold) {
            return Err(ValidationError::InvalidSetting {
                field: "fraud.report_threshold",
                reason: format!("{} is outside 0..=1", self.report_threshold),
            });
        }
        let windows = [
            ("fraud.farming_window_days", self.farming_window_days),
            ("fraud.new_account_days", self.new_account_days),
            ("fraud.repeat_target_window_days", self.repeat_target_window_days),
            ("fraud.velocity_window_hours", self.velocity_window_hours),
        ];
        for (field, value) in windows {
            if value <= 0 {
                return Err(ValidationError::InvalidSetting {
                    field,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        if self.farming_min_requests == 0 || self.repeat_target_min_requests == 0 {
            return Err(ValidationError::InvalidSetting {
                field: "fraud.min_requests",
                reason: "request count thresholds must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// How an earlier refund request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryOutcome {
    /// Still open.
    Pending,
    /// Any refund was granted.
    Approved,
    /// No refund granted.
    Denied,
}

/// One earlier refund request by the same requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundHistoryItem {
    /// Recipient of the refunded escrow.
    pub recipient: UserId,
    /// Escrow total the request was for.
    pub amount: u64,
    /// When the request was submitted.
    pub requested_at: DateTime<Utc>,
    /// How it ended.
    pub outcome: HistoryOutcome,
}

/// Everything the fraud rules look at for one refund request.
#[derive(Debug, Clone)]
pub struct FraudContext {
    /// The requester.
    pub requester: UserId,
    /// When the requester's account was created.
    pub account_created_at: DateTime<Utc>,
    /// Recipient of the escrow being refunded.
    pub recipient: UserId,
    /// Escrow total being refunded.
    pub amount: u64,
    /// Free-text description supplied with the request.
    pub description: String,
    /// Earlier requests by the same requester (any age).
    pub history: Vec<RefundHistoryItem>,
    /// Evaluation time.
    pub now: DateTime<Utc>,
}

impl FraudContext {
    fn within(&self, window: Duration) -> impl Iterator<Item = &RefundHistoryItem> {
        let since = self.now - window;
        self.history.iter().filter(move |h| h.requested_at >= since)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct RefundFarming {
    min_requests: usize,
    window: Duration,
    min_approval_pct: u32,
}

impl Rule<FraudContext> for RefundFarming {
    fn id(&self) -> &'static str {
        FraudPattern::RefundFarming.as_str()
    }

    fn evaluate(&self, ctx: &FraudContext) -> Option<RuleHit> {
        let recent: Vec<_> = ctx.within(self.window).collect();
        // The request under evaluation counts toward the total.
        let count = recent.len() + 1;
        let resolved = recent
            .iter()
            .filter(|h| h.outcome != HistoryOutcome::Pending)
            .count();
        let approved = recent
            .iter()
            .filter(|h| h.outcome == HistoryOutcome::Approved)
            .count();
        if count < self.min_requests || resolved == 0 {
            return None;
        }
        let approval_pct = (approved * 100 / resolved) as u32;
        if approval_pct < self.min_approval_pct {
            return None;
        }
        let signals = [
            WeightedSignal::new("request_count", 6_000, true),
            WeightedSignal::new("approval_rate", 2_000, true),
            WeightedSignal::new("double_threshold_count", 1_000, count >= self.min_requests * 2),
            WeightedSignal::new("every_request_approved", 1_000, approved == resolved),
        ];
        let mut evidence = WeightedSignal::fired_names(&signals);
        evidence.push(format!("{count} requests, {approval_pct}% approved"));
        Some(RuleHit::new(self.id(), WeightedSignal::combine(&signals), evidence))
    }
}

struct KeywordPressure {
    pattern: FraudPattern,
    matcher: KeywordMatcher,
    base: u32,
    per_extra: u32,
    cap: u32,
}

impl Rule<FraudContext> for KeywordPressure {
    fn id(&self) -> &'static str {
        self.pattern.as_str()
    }

    fn evaluate(&self, ctx: &FraudContext) -> Option<RuleHit> {
        let found = self.matcher.matches(&ctx.description);
        if found.is_empty() {
            return None;
        }
        let extra = u32::try_from(found.len() - 1).unwrap_or(u32::MAX);
        let confidence = self
            .base
            .saturating_add(self.per_extra.saturating_mul(extra))
            .min(self.cap);
        Some(RuleHit::new(self.id(), confidence, found))
    }
}

struct NewAccountAbuse {
    max_age: Duration,
}

impl Rule<FraudContext> for NewAccountAbuse {
    fn id(&self) -> &'static str {
        FraudPattern::NewAccountAbuse.as_str()
    }

    fn evaluate(&self, ctx: &FraudContext) -> Option<RuleHit> {
        let age = ctx.now - ctx.account_created_at;
        if age >= self.max_age {
            return None;
        }
        let signals = [
            WeightedSignal::new("new_account", 5_500, true),
            WeightedSignal::new("same_day_account", 2_000, age < Duration::days(1)),
            WeightedSignal::new("large_amount", 1_000, ctx.amount >= 1_000),
        ];
        let mut evidence = WeightedSignal::fired_names(&signals);
        evidence.push(format!("account age {}h", age.num_hours()));
        Some(RuleHit::new(self.id(), WeightedSignal::combine(&signals), evidence))
    }
}

struct RepeatTargeting {
    min_requests: usize,
    window: Duration,
}

impl Rule<FraudContext> for RepeatTargeting {
    fn id(&self) -> &'static str {
        FraudPattern::RepeatTargeting.as_str()
    }

    fn evaluate(&self, ctx: &FraudContext) -> Option<RuleHit> {
        let against = ctx
            .within(self.window)
            .filter(|h| h.recipient == ctx.recipient)
            .count()
            + 1;
        if against < self.min_requests {
            return None;
        }
        let extra = u32::try_from(against - self.min_requests).unwrap_or(u32::MAX);
        let confidence = 6_500u32.saturating_add(1_000u32.saturating_mul(extra)).min(9_500);
        Some(RuleHit::new(
            self.id(),
            confidence,
            vec![format!("{against} requests against {}", ctx.recipient)],
        ))
    }
}

struct RefundVelocity {
    window: Duration,
    max_tokens: u64,
}

impl Rule<FraudContext> for RefundVelocity {
    fn id(&self) -> &'static str {
        FraudPattern::RefundVelocity.as_str()
    }

    fn evaluate(&self, ctx: &FraudContext) -> Option<RuleHit> {
        let volume = ctx
            .within(self.window)
            .fold(ctx.amount, |acc, h| acc.saturating_add(h.amount));
        if volume < self.max_tokens {
            return None;
        }
        let signals = [
            WeightedSignal::new("volume_over_limit", 7_000, true),
            WeightedSignal::new(
                "volume_double_limit",
                2_000,
                volume >= self.max_tokens.saturating_mul(2),
            ),
        ];
        let mut evidence = WeightedSignal::fired_names(&signals);
        evidence.push(format!("{volume} tokens requested"));
        Some(RuleHit::new(self.id(), WeightedSignal::combine(&signals), evidence))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The strongest reportable hit, with its consequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudFinding {
    /// Pattern matched.
    pub pattern: FraudPattern,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Severity band.
    pub severity: Severity,
    /// Penalty applied.
    pub penalty: PenaltyAction,
    /// Rule evidence.
    pub evidence: Vec<String>,
}

impl FraudFinding {
    /// Whether the refund request must be rejected.
    pub fn blocks_refund(&self) -> bool {
        self.penalty.blocks_refund()
    }
}

/// Runs the six fraud rules in a fixed order.
#[derive(Debug)]
pub struct FraudEngine {
    rules: RuleSet<FraudContext>,
    thresholds: FraudThresholds,
}

impl FraudEngine {
    /// Build the standard rule order from `thresholds`.
    pub fn new(thresholds: FraudThresholds) -> Self {
        let t = &thresholds;
        let rules = RuleSet::new()
            .with(RefundFarming {
                min_requests: t.farming_min_requests,
                window: Duration::days(t.farming_window_days),
                min_approval_pct: t.farming_min_approval_pct,
            })
            .with(KeywordPressure {
                pattern: FraudPattern::EmotionalBlackmail,
                matcher: KeywordMatcher::new(&t.blackmail_phrases),
                base: 6_500,
                per_extra: 1_500,
                cap: 9_500,
            })
            .with(KeywordPressure {
                pattern: FraudPattern::RomanceManipulation,
                matcher: KeywordMatcher::new(&t.romance_phrases),
                base: 5_500,
                per_extra: 1_500,
                cap: 9_000,
            })
            .with(NewAccountAbuse {
                max_age: Duration::days(t.new_account_days),
            })
            .with(RepeatTargeting {
                min_requests: t.repeat_target_min_requests,
                window: Duration::days(t.repeat_target_window_days),
            })
            .with(RefundVelocity {
                window: Duration::hours(t.velocity_window_hours),
                max_tokens: t.velocity_max_tokens,
            });
        Self { rules, thresholds }
    }

    /// Active thresholds.
    pub fn thresholds(&self) -> &FraudThresholds {
        &self.thresholds
    }

    /// Every raw hit, for diagnostics.
    pub fn evaluate_all(&self, ctx: &FraudContext) -> Vec<RuleHit> {
        self.rules.evaluate_all(ctx)
    }

    /// The strongest hit at or above the reporting threshold.
    pub fn evaluate(&self, ctx: &FraudContext) -> Option<FraudFinding> {
        let hit = self.rules.strongest(ctx)?;
        if hit.confidence < confidence_basis_points(self.thresholds.report_threshold) {
            return None;
        }
        let pattern = FraudPattern::from_code(&hit.rule_id).ok()?;
        let severity = Severity::from_confidence(hit.confidence);
        let finding = FraudFinding {
            pattern,
            confidence: confidence_fraction(hit.confidence),
            severity,
            penalty: severity.penalty(),
            evidence: hit.evidence,
        };
        tracing::info!(
            user = %ctx.requester,
            pattern = pattern.as_str(),
            confidence = finding.confidence,
            severity = severity.as_str(),
            penalty = finding.penalty.as_str(),
            "fraud pattern detected"
        );
        Some(finding)
    }
}

impl Default for FraudEngine {
    fn default() -> Self {
        Self::new(FraudThresholds::default())
    }
}

/// Append-only audit entry for a fraud finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudDetectionRecord {
    /// Record identifier.
    pub id: Uuid,
    /// The flagged user.
    pub user: UserId,
    /// Pattern matched.
    pub pattern: FraudPattern,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Severity band.
    pub severity: Severity,
    /// Penalty applied.
    pub penalty: PenaltyAction,
    /// The refund request that triggered evaluation, if any.
    pub refund_request_id: Option<Uuid>,
    /// Rule evidence.
    pub evidence: Vec<String>,
    /// When the finding was made.
    pub detected_at: DateTime<Utc>,
}

impl FraudDetectionRecord {
    /// Build an audit record from a finding.
    pub fn from_finding(
        user: UserId,
        finding: &FraudFinding,
        refund_request_id: Option<Uuid>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            pattern: finding.pattern,
            confidence: finding.confidence,
            severity: finding.severity,
            penalty: finding.penalty,
            refund_request_id,
            evidence: finding.evidence.clone(),
            detected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(now: DateTime<Utc>) -> FraudContext {
        FraudContext {
            requester: UserId::new(),
            account_created_at: now - Duration::days(365),
            recipient: UserId::new(),
            amount: 100,
            description: "the call dropped".to_string(),
            history: Vec::new(),
            now,
        }
    }

    fn past(
        now: DateTime<Utc>,
        days_ago: i64,
        recipient: UserId,
        outcome: HistoryOutcome,
    ) -> RefundHistoryItem {
        RefundHistoryItem {
            recipient,
            amount: 100,
            requested_at: now - Duration::days(days_ago),
            outcome,
        }
    }

    #[test]
    fn clean_request_has_no_finding() {
        let engine = FraudEngine::default();
        assert!(engine.evaluate(&ctx(Utc::now())).is_none());
    }

    #[test]
    fn five_requests_mostly_approved_is_refund_farming() {
        let now = Utc::now();
        let mut c = ctx(now);
        for i in 0..4 {
            c.history
                .push(past(now, i + 1, UserId::new(), HistoryOutcome::Approved));
        }
        let f = FraudEngine::default().evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::RefundFarming);
        assert!(f.confidence >= 0.8);
        assert!(f.blocks_refund());
    }

    #[test]
    fn farming_needs_high_approval_rate() {
        let now = Utc::now();
        let mut c = ctx(now);
        for i in 0..4 {
            let outcome = if i < 2 {
                HistoryOutcome::Approved
            } else {
                HistoryOutcome::Denied
            };
            c.history.push(past(now, i + 1, UserId::new(), outcome));
        }
        assert!(FraudEngine::default().evaluate(&c).is_none());
    }

    #[test]
    fn farming_ignores_requests_outside_window() {
        let now = Utc::now();
        let mut c = ctx(now);
        for i in 0..4 {
            c.history
                .push(past(now, 40 + i, UserId::new(), HistoryOutcome::Approved));
        }
        assert!(FraudEngine::default().evaluate(&c).is_none());
    }

    #[test]
    fn blackmail_phrase_blocks() {
        let now = Utc::now();
        let mut c = ctx(now);
        c.description = "Refund me or I'll hurt myself. You owe me!".to_string();
        let f = FraudEngine::default().evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::EmotionalBlackmail);
        assert_eq!(f.evidence, vec!["hurt myself", "you owe me"]);
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.penalty, PenaltyAction::AccountReview);
    }

    #[test]
    fn single_romance_phrase_is_warning_only() {
        let now = Utc::now();
        let mut c = ctx(now);
        c.description = "I thought we had something special".to_string();
        let f = FraudEngine::default().evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::RomanceManipulation);
        assert_eq!(f.severity, Severity::Low);
        assert_eq!(f.penalty, PenaltyAction::Warning);
        assert!(!f.blocks_refund());
    }

    #[test]
    fn new_account_same_day() {
        let now = Utc::now();
        let mut c = ctx(now);
        c.account_created_at = now - Duration::hours(3);
        let f = FraudEngine::default().evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::NewAccountAbuse);
        assert!((f.confidence - 0.75).abs() < 1e-9);
        assert_eq!(f.severity, Severity::High);
    }

    #[test]
    fn repeat_targeting_same_recipient() {
        let now = Utc::now();
        let mut c = ctx(now);
        let target = c.recipient;
        c.history.push(past(now, 2, target, HistoryOutcome::Denied));
        c.history.push(past(now, 3, target, HistoryOutcome::Denied));
        let f = FraudEngine::default().evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::RepeatTargeting);
        assert_eq!(f.severity, Severity::Medium);
    }

    #[test]
    fn velocity_over_limit() {
        let now = Utc::now();
        let mut c = ctx(now);
        c.amount = 3_000;
        c.history.push(RefundHistoryItem {
            recipient: UserId::new(),
            amount: 2_500,
            requested_at: now - Duration::hours(2),
            outcome: HistoryOutcome::Pending,
        });
        let f = FraudEngine::default().evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::RefundVelocity);
        assert!((f.confidence - 0.7).abs() < 1e-9);
    }

    fn velocity_at(now: DateTime<Utc>, amount: u64) -> FraudContext {
        let mut c = ctx(now);
        c.amount = amount;
        c
    }

    #[test]
    fn velocity_at_double_limit_is_critical() {
        let now = Utc::now();
        let f = FraudEngine::default()
            .evaluate(&velocity_at(now, 10_000))
            .unwrap();
        assert_eq!(f.pattern, FraudPattern::RefundVelocity);
        assert_eq!(f.confidence, 0.9);
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(f.penalty, PenaltyAction::Suspension);

        let f = FraudEngine::default()
            .evaluate(&velocity_at(now, 9_999))
            .unwrap();
        assert_eq!(f.severity, Severity::Medium);
    }

    #[test]
    fn repeat_targeting_climbs_through_every_band() {
        let now = Utc::now();
        let engine = FraudEngine::default();
        let mut c = ctx(now);
        let target = c.recipient;
        let expected = [
            (2, Severity::Medium),
            (3, Severity::High),
            (4, Severity::High),
            (5, Severity::Critical),
            (6, Severity::Critical),
        ];
        for (earlier, severity) in expected {
            c.history = (0..earlier)
                .map(|i| past(now, i + 1, target, HistoryOutcome::Denied))
                .collect();
            let f = engine.evaluate(&c).unwrap();
            assert_eq!(f.pattern, FraudPattern::RepeatTargeting);
            assert_eq!(f.severity, severity, "{earlier} earlier requests");
        }
    }

    #[test]
    fn keyword_sums_land_on_band_edges() {
        let now = Utc::now();
        let engine = FraudEngine::default();
        let mut c = ctx(now);

        c.description = "you led me on and you broke my heart".to_string();
        let f = engine.evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::RomanceManipulation);
        assert_eq!(f.severity, Severity::Medium);

        c.description = "you owe me, it is your fault, i will tell everyone".to_string();
        let f = engine.evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::EmotionalBlackmail);
        assert_eq!(f.confidence, 0.95);
        assert_eq!(f.severity, Severity::Critical);
    }

    #[test]
    fn new_account_signals_sum_exactly() {
        let now = Utc::now();
        let mut c = ctx(now);
        c.account_created_at = now - Duration::hours(3);
        c.amount = 1_000;
        let f = FraudEngine::default().evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::NewAccountAbuse);
        assert_eq!(f.confidence, 0.85);
        assert_eq!(f.severity, Severity::High);
    }

    #[test]
    fn farming_with_every_signal_is_certain() {
        let now = Utc::now();
        let mut c = ctx(now);
        for i in 0..9 {
            c.history
                .push(past(now, i + 1, UserId::new(), HistoryOutcome::Approved));
        }
        let f = FraudEngine::default().evaluate(&c).unwrap();
        assert_eq!(f.pattern, FraudPattern::RefundFarming);
        assert_eq!(f.confidence, 1.0);
        assert_eq!(f.severity, Severity::Critical);
    }

    #[test]
    fn highest_confidence_wins_across_rules() {
        let now = Utc::now();
        let mut c = ctx(now);
        c.account_created_at = now - Duration::days(3); // NEW_ACCOUNT_ABUSE 0.55
        c.description = "you owe me and it is your fault".to_string(); // 0.8
        let engine = FraudEngine::default();
        assert_eq!(engine.evaluate_all(&c).len(), 2);
        assert_eq!(
            engine.evaluate(&c).unwrap().pattern,
            FraudPattern::EmotionalBlackmail
        );
    }

    #[test]
    fn report_threshold_filters_weak_hits() {
        let now = Utc::now();
        let mut c = ctx(now);
        c.account_created_at = now - Duration::days(3);
        let t = FraudThresholds {
            report_threshold: 0.6,
            ..FraudThresholds::default()
        };
        assert!(FraudEngine::new(t).evaluate(&c).is_none());
    }

    #[test]
    fn severity_bands() {
        let bands = [
            (10_000, Severity::Critical),
            (9_000, Severity::Critical),
            (8_999, Severity::High),
            (7_500, Severity::High),
            (7_499, Severity::Medium),
            (6_000, Severity::Medium),
            (5_999, Severity::Low),
            (0, Severity::Low),
        ];
        for (basis_points, severity) in bands {
            assert_eq!(Severity::from_confidence(basis_points), severity, "{basis_points}");
        }
        assert!(Severity::Medium.penalty().blocks_refund());
        assert!(!Severity::Low.penalty().blocks_refund());
    }

    #[test]
    fn thresholds_validation() {
        FraudThresholds::default().validate().unwrap();
        let bad = FraudThresholds {
            report_threshold: 1.5,
            ..FraudThresholds::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn record_from_finding_copies_fields() {
        let finding = FraudFinding {
            pattern: FraudPattern::RefundVelocity,
            confidence: 0.7,
            severity: Severity::Medium,
            penalty: PenaltyAction::RefundRestriction,
            evidence: vec!["x".into()],
        };
        let user = UserId::new();
        let req = Uuid::new_v4();
        let rec = FraudDetectionRecord::from_finding(user, &finding, Some(req), Utc::now());
        assert_eq!(rec.user, user);
        assert_eq!(rec.refund_request_id, Some(req));
        assert_eq!(rec.pattern, FraudPattern::RefundVelocity);
    }
}
