//! # Safety Scoring
//!
//! Each user carries four independent 0–100 scores. Recorded events push
//! a dimension down (or, for identity verification, up); daily decay moves
//! every dimension back toward 100. The overall score is the floor of the
//! mean and determines the user's [`RiskLevel`].

use chrono::{DateTime, Utc};
use packs_core::{UserId, ValidationError};
use serde::{Deserialize, Serialize};

/// Maximum (and starting) value of every dimension.
pub const MAX_SCORE: u8 = 100;

/// A scored aspect of behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyDimension {
    /// Interpersonal conduct.
    Conduct,
    /// Payment and refund behaviour.
    Financial,
    /// Content policy compliance.
    Content,
    /// Standing with other users.
    Reputation,
}

/// An event that moves a safety dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyEventKind {
    /// Another user reported this one.
    ReportReceived,
    /// A moderator confirmed harassment.
    HarassmentConfirmed,
    /// The fraud engine flagged this user.
    FraudFlagged,
    /// Refund abuse was confirmed.
    RefundAbuse,
    /// Content was removed by moderation.
    ContentRemoved,
    /// Another user blocked this one.
    BlockedByUser,
    /// The user completed identity verification.
    IdentityVerified,
}

impl SafetyEventKind {
    /// The dimension this event affects.
    pub fn dimension(&self) -> SafetyDimension {
        match self {
            Self::ReportReceived | Self::HarassmentConfirmed => SafetyDimension::Conduct,
            Self::FraudFlagged | Self::RefundAbuse => SafetyDimension::Financial,
            Self::ContentRemoved => SafetyDimension::Content,
            Self::BlockedByUser | Self::IdentityVerified => SafetyDimension::Reputation,
        }
    }

    /// Signed change applied to the dimension.
    pub fn delta(&self) -> i16 {
        match self {
            Self::ReportReceived => -10,
            Self::HarassmentConfirmed => -25,
            Self::FraudFlagged => -20,
            Self::RefundAbuse => -10,
            Self::ContentRemoved => -15,
            Self::BlockedByUser => -5,
            Self::IdentityVerified => 10,
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReportReceived => "report_received",
            Self::HarassmentConfirmed => "harassment_confirmed",
            Self::FraudFlagged => "fraud_flagged",
            Self::RefundAbuse => "refund_abuse",
            Self::ContentRemoved => "content_removed",
            Self::BlockedByUser => "blocked_by_user",
            Self::IdentityVerified => "identity_verified",
        }
    }
}

/// Risk band derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Below 40.
    Restricted,
    /// 40 to 59.
    Watch,
    /// 60 to 79.
    Standard,
    /// 80 and above.
    Trusted,
}

impl RiskLevel {
    /// Band for an overall score.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Trusted,
            60..=79 => Self::Standard,
            40..=59 => Self::Watch,
            _ => Self::Restricted,
        }
    }

    /// Whether pricing and moderation should treat the user with caution.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Watch | Self::Restricted)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restricted => "RESTRICTED",
            Self::Watch => "WATCH",
            Self::Standard => "STANDARD",
            Self::Trusted => "TRUSTED",
        }
    }
}

/// Safety scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Points each dimension recovers per day.
    pub decay_per_day: u8,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self { decay_per_day: 2 }
    }
}

impl SafetyConfig {
    /// Reject a decay rate above the score range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.decay_per_day > MAX_SCORE {
            return Err(ValidationError::InvalidSetting {
                field: "safety.decay_per_day",
                reason: format!("{} exceeds {MAX_SCORE}", self.decay_per_day),
            });
        }
        Ok(())
    }
}

/// A user's safety score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyScore {
    /// Score owner.
    pub user: UserId,
    /// Conduct dimension.
    pub conduct: u8,
    /// Financial dimension.
    pub financial: u8,
    /// Content dimension.
    pub content: u8,
    /// Reputation dimension.
    pub reputation: u8,
    /// Events applied so far.
    pub events_recorded: u32,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl SafetyScore {
    /// A fresh score with every dimension at 100.
    pub fn new(user: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user,
            conduct: MAX_SCORE,
            financial: MAX_SCORE,
            content: MAX_SCORE,
            reputation: MAX_SCORE,
            events_recorded: 0,
            updated_at: now,
        }
    }

    /// Current value of one dimension.
    pub fn dimension(&self, d: SafetyDimension) -> u8 {
        match d {
            SafetyDimension::Conduct => self.conduct,
            SafetyDimension::Financial => self.financial,
            SafetyDimension::Content => self.content,
            SafetyDimension::Reputation => self.reputation,
        }
    }

    fn dimension_mut(&mut self, d: SafetyDimension) -> &mut u8 {
        match d {
            SafetyDimension::Conduct => &mut self.conduct,
            SafetyDimension::Financial => &mut self.financial,
            SafetyDimension::Content => &mut self.content,
            SafetyDimension::Reputation => &mut self.reputation,
        }
    }

    /// Apply an event's delta, clamped to `0..=100`.
    pub fn apply_event(&mut self, kind: SafetyEventKind, now: DateTime<Utc>) {
        let slot = self.dimension_mut(kind.dimension());
        let next = (i16::from(*slot) + kind.delta()).clamp(0, i16::from(MAX_SCORE));
        *slot = next as u8;
        self.events_recorded = self.events_recorded.saturating_add(1);
        self.updated_at = now;
        tracing::debug!(
            user = %self.user,
            event = kind.as_str(),
            overall = self.overall(),
            "safety event applied"
        );
    }

    /// Move every dimension toward 100 by `per_day × days`.
    pub fn decay(&mut self, days: u32, per_day: u8, now: DateTime<Utc>) {
        let step = u32::from(per_day).saturating_mul(days);
        for d in [
            SafetyDimension::Conduct,
            SafetyDimension::Financial,
            SafetyDimension::Content,
            SafetyDimension::Reputation,
        ] {
            let slot = self.dimension_mut(d);
            let next = u32::from(*slot).saturating_add(step).min(u32::from(MAX_SCORE));
            *slot = next as u8;
        }
        self.updated_at = now;
    }

    /// Floor of the mean of the four dimensions.
    pub fn overall(&self) -> u8 {
        let sum = u16::from(self.conduct)
            + u16::from(self.financial)
            + u16::from(self.content)
            + u16::from(self.reputation);
        (sum / 4) as u8
    }

    /// Risk band of the overall score.
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.overall())
    }

    /// Whether every dimension is at 100.
    pub fn is_pristine(&self) -> bool {
        self.overall() == MAX_SCORE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score() -> SafetyScore {
        SafetyScore::new(UserId::new(), Utc::now())
    }

    #[test]
    fn new_score_is_trusted() {
        let s = score();
        assert_eq!(s.overall(), 100);
        assert_eq!(s.risk_level(), RiskLevel::Trusted);
    }

    #[test]
    fn events_hit_their_dimension() {
        let mut s = score();
        s.apply_event(SafetyEventKind::HarassmentConfirmed, Utc::now());
        s.apply_event(SafetyEventKind::FraudFlagged, Utc::now());
        s.apply_event(SafetyEventKind::ContentRemoved, Utc::now());
        s.apply_event(SafetyEventKind::BlockedByUser, Utc::now());
        assert_eq!(s.conduct, 75);
        assert_eq!(s.financial, 80);
        assert_eq!(s.content, 85);
        assert_eq!(s.reputation, 95);
        // (75 + 80 + 85 + 95) / 4 = 83.75 → 83
        assert_eq!(s.overall(), 83);
        assert_eq!(s.events_recorded, 4);
    }

    #[test]
    fn penalties_saturate_at_zero() {
        let mut s = score();
        for _ in 0..10 {
            s.apply_event(SafetyEventKind::HarassmentConfirmed, Utc::now());
        }
        assert_eq!(s.conduct, 0);
    }

    #[test]
    fn identity_verification_caps_at_100() {
        let mut s = score();
        s.apply_event(SafetyEventKind::IdentityVerified, Utc::now());
        assert_eq!(s.reputation, 100);
        s.apply_event(SafetyEventKind::BlockedByUser, Utc::now());
        s.apply_event(SafetyEventKind::IdentityVerified, Utc::now());
        assert_eq!(s.reputation, 100);
    }

    #[test]
    fn decay_moves_toward_100() {
        let mut s = score();
        s.apply_event(SafetyEventKind::HarassmentConfirmed, Utc::now());
        s.decay(5, 2, Utc::now());
        assert_eq!(s.conduct, 85);
        s.decay(100, 2, Utc::now());
        assert_eq!(s.conduct, 100);
        assert!(s.is_pristine());
    }

    #[test]
    fn risk_level_bands() {
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Trusted);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::Standard);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Standard);
        assert_eq!(RiskLevel::from_score(59), RiskLevel::Watch);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Watch);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::Restricted);
        assert!(RiskLevel::Watch.is_elevated());
        assert!(!RiskLevel::Standard.is_elevated());
    }

    #[test]
    fn config_validation() {
        SafetyConfig::default().validate().unwrap();
        assert!(SafetyConfig { decay_per_day: 101 }.validate().is_err());
    }

    const EVENTS: [SafetyEventKind; 7] = [
        SafetyEventKind::ReportReceived,
        SafetyEventKind::HarassmentConfirmed,
        SafetyEventKind::FraudFlagged,
        SafetyEventKind::RefundAbuse,
        SafetyEventKind::ContentRemoved,
        SafetyEventKind::BlockedByUser,
        SafetyEventKind::IdentityVerified,
    ];

    proptest::proptest! {
        #[test]
        fn overall_stays_in_range_and_decay_never_lowers(
            events in proptest::collection::vec(0usize..7, 0..40),
            days in 0u32..60,
        ) {
            let mut s = score();
            for i in events {
                s.apply_event(EVENTS[i], Utc::now());
            }
            proptest::prop_assert!(s.overall() <= MAX_SCORE);
            let before = s.overall();
            s.decay(days, 2, Utc::now());
            proptest::prop_assert!(s.overall() >= before);
        }
    }
}
