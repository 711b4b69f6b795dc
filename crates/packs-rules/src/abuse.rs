//! # Abuse Firewall
//!
//! Screens message text against per-category keyword rules. A message
//! with no hit is allowed; otherwise the most severe category decides
//! between FLAG and BLOCK. Every flagged or blocked message adds that
//! category's severity weight to the sender's strike count, and the strike
//! count maps onto a sanction ladder that only ever escalates.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use packs_core::{UserId, ValidationError};
use serde::{Deserialize, Serialize};

use crate::rule::{KeywordMatcher, Rule, RuleHit, RuleSet};
use crate::safety::SafetyEventKind;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// A class of abusive content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbuseCategory {
    /// Insults and demeaning language.
    Harassment,
    /// Threats of violence or exposure.
    Threat,
    /// Attempts to move payment off the platform.
    OffPlatformPayment,
    /// Unsolicited sexual requests.
    SexualSolicitation,
    /// Slurs and hateful language.
    HateSpeech,
}

impl AbuseCategory {
    /// All categories in evaluation order.
    pub const ALL: [AbuseCategory; 5] = [
        Self::Harassment,
        Self::Threat,
        Self::OffPlatformPayment,
        Self::SexualSolicitation,
        Self::HateSpeech,
    ];

    /// Strike weight of one hit in this category.
    pub fn severity(&self) -> u32 {
        match self {
            Self::Harassment => 2,
            Self::Threat => 5,
            Self::OffPlatformPayment => 3,
            Self::SexualSolicitation => 3,
            Self::HateSpeech => 4,
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Harassment => "harassment",
            Self::Threat => "threat",
            Self::OffPlatformPayment => "off_platform_payment",
            Self::SexualSolicitation => "sexual_solicitation",
            Self::HateSpeech => "hate_speech",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    fn default_phrases(&self) -> &'static [&'static str] {
        match self {
            Self::Harassment => &[
                "you are worthless",
                "you re worthless",
                "shut up",
                "loser",
                "pathetic",
                "nobody likes you",
                "ugly",
            ],
            Self::Threat => &[
                "i will find you",
                "i know where you live",
                "you will regret",
                "i will hurt you",
                "watch your back",
            ],
            Self::OffPlatformPayment => &[
                "cash app",
                "cashapp",
                "venmo",
                "paypal me",
                "zelle",
                "pay me outside",
                "send crypto",
                "gift card",
            ],
            Self::SexualSolicitation => &[
                "send nudes",
                "nude pics",
                "sexy pics",
                "hook up tonight",
            ],
            Self::HateSpeech => &["go back to your country", "subhuman", "your kind"],
        }
    }
}

// ---------------------------------------------------------------------------
// Verdicts and sanctions
// ---------------------------------------------------------------------------

/// Screening verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// No category matched.
    Allow,
    /// Matched, below the block threshold; delivered and recorded.
    Flag,
    /// Matched at or above the block threshold; not delivered.
    Block,
}

impl Verdict {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Flag => "FLAG",
            Self::Block => "BLOCK",
        }
    }
}

/// Sanction currently applied to a user. Ordered by severity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sanction {
    /// No sanction.
    #[default]
    None,
    /// Recorded warning.
    Warning,
    /// Cannot send messages until `sanction_until`.
    Mute,
    /// Account suspended until `sanction_until`.
    Suspension,
    /// Permanent ban.
    Ban,
}

impl Sanction {
    /// All sanctions in ascending severity.
    pub const ALL: [Sanction; 5] = [
        Self::None,
        Self::Warning,
        Self::Mute,
        Self::Suspension,
        Self::Ban,
    ];

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Warning => "WARNING",
            Self::Mute => "MUTE",
            Self::Suspension => "SUSPENSION",
            Self::Ban => "BAN",
        }
    }
}

/// Firewall parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbuseConfig {
    /// Highest category severity at or above which a message is blocked.
    pub block_threshold: u32,
    /// Strikes for a warning.
    pub warning_strikes: u32,
    /// Strikes for a mute.
    pub mute_strikes: u32,
    /// Strikes for a suspension.
    pub suspension_strikes: u32,
    /// Strikes for a ban.
    pub ban_strikes: u32,
    /// Mute length in hours.
    pub mute_hours: i64,
    /// Suspension length in days.
    pub suspension_days: i64,
    /// Extra phrases per category, added to the built-in lists.
    pub extra_phrases: HashMap<AbuseCategory, Vec<String>>,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            block_threshold: 4,
            warning_strikes: 1,
            mute_strikes: 3,
            suspension_strikes: 6,
            ban_strikes: 10,
            mute_hours: 24,
            suspension_days: 7,
            extra_phrases: HashMap::new(),
        }
    }
}

impl AbuseConfig {
    /// The ladder must be strictly increasing and durations positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let ladder = [
            self.warning_strikes,
            self.mute_strikes,
            self.suspension_strikes,
            self.ban_strikes,
        ];
        if ladder[0] == 0 || ladder.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ValidationError::InvalidSetting {
                field: "abuse.strikes",
                reason: format!("sanction ladder {ladder:?} must be strictly increasing from 1"),
            });
        }
        if self.mute_hours <= 0 || self.suspension_days <= 0 {
            return Err(ValidationError::InvalidSetting {
                field: "abuse.durations",
                reason: "mute_hours and suspension_days must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Sanction earned by `strikes`.
    pub fn sanction_for(&self, strikes: u32) -> Sanction {
        if strikes >= self.ban_strikes {
            Sanction::Ban
        } else if strikes >= self.suspension_strikes {
            Sanction::Suspension
        } else if strikes >= self.mute_strikes {
            Sanction::Mute
        } else if strikes >= self.warning_strikes {
            Sanction::Warning
        } else {
            Sanction::None
        }
    }

    fn sanction_length(&self, sanction: Sanction) -> Option<Duration> {
        match sanction {
            Sanction::Mute => Some(Duration::hours(self.mute_hours)),
            Sanction::Suspension => Some(Duration::days(self.suspension_days)),
            Sanction::None | Sanction::Warning | Sanction::Ban => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Screening
// ---------------------------------------------------------------------------

struct CategoryRule {
    category: AbuseCategory,
    matcher: KeywordMatcher,
}

impl Rule<str> for CategoryRule {
    fn id(&self) -> &'static str {
        self.category.as_str()
    }

    fn evaluate(&self, text: &str) -> Option<RuleHit> {
        let found = self.matcher.matches(text);
        if found.is_empty() {
            return None;
        }
        let confidence = 5_000u32.saturating_add(2_500u32.saturating_mul(found.len() as u32));
        Some(RuleHit::new(self.id(), confidence, found))
    }
}

/// Result of screening one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenResult {
    /// Verdict.
    pub verdict: Verdict,
    /// Categories that matched, in evaluation order.
    pub categories: Vec<AbuseCategory>,
    /// Highest severity among matched categories (0 when allowed).
    pub max_severity: u32,
    /// Phrases that matched.
    pub matched: Vec<String>,
}

/// Screening plus the side effects on the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenOutcome {
    /// The screening result.
    pub result: ScreenResult,
    /// The sender's record after this message, when it was not allowed.
    pub offender: Option<OffenderRecord>,
    /// Safety event to apply to the sender, if any.
    pub safety_event: Option<SafetyEventKind>,
}

/// A user's strike history and current sanction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffenderRecord {
    /// The user.
    pub user: UserId,
    /// Accumulated strike weight.
    pub strikes: u32,
    /// Flagged or blocked messages.
    pub violations: u32,
    /// Current sanction.
    pub sanction: Sanction,
    /// End of a time-limited sanction.
    pub sanction_until: Option<DateTime<Utc>>,
    /// Most recent violation.
    pub last_violation_at: DateTime<Utc>,
}

impl OffenderRecord {
    /// Whether the user is currently barred from sending messages.
    pub fn is_silenced(&self, now: DateTime<Utc>) -> bool {
        match self.sanction {
            Sanction::Ban => true,
            Sanction::Mute | Sanction::Suspension => {
                self.sanction_until.map(|until| now < until).unwrap_or(false)
            }
            Sanction::None | Sanction::Warning => false,
        }
    }
}

/// Keyword screening with per-user strike tracking.
#[derive(Debug)]
pub struct AbuseFirewall {
    rules: RuleSet<str>,
    config: AbuseConfig,
    offenders: HashMap<UserId, OffenderRecord>,
}

impl AbuseFirewall {
    /// Build the category rules from the built-in and configured phrases.
    pub fn new(config: AbuseConfig) -> Self {
        let mut rules: RuleSet<str> = RuleSet::new();
        for category in AbuseCategory::ALL {
            let mut phrases: Vec<String> = category
                .default_phrases()
                .iter()
                .map(|p| p.to_string())
                .collect();
            if let Some(extra) = config.extra_phrases.get(&category) {
                phrases.extend(extra.iter().cloned());
            }
            rules.push(CategoryRule {
                category,
                matcher: KeywordMatcher::new(phrases),
            });
        }
        Self {
            rules,
            config,
            offenders: HashMap::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AbuseConfig {
        &self.config
    }

    /// Screen text without recording anything.
    pub fn screen(&self, text: &str) -> ScreenResult {
        let hits = self.rules.evaluate_all(text);
        let categories: Vec<AbuseCategory> = hits
            .iter()
            .filter_map(|h| AbuseCategory::from_code(&h.rule_id))
            .collect();
        let max_severity = categories.iter().map(|c| c.severity()).max().unwrap_or(0);
        let verdict = if categories.is_empty() {
            Verdict::Allow
        } else if max_severity >= self.config.block_threshold {
            Verdict::Block
        } else {
            Verdict::Flag
        };
        ScreenResult {
            verdict,
            categories,
            max_severity,
            matched: hits.into_iter().flat_map(|h| h.evidence).collect(),
        }
    }

    /// Screen a message from `sender` and update their strike record.
    pub fn screen_message(&mut self, sender: UserId, text: &str, now: DateTime<Utc>) -> ScreenOutcome {
        let result = self.screen(text);
        if result.verdict == Verdict::Allow {
            return ScreenOutcome {
                result,
                offender: None,
                safety_event: None,
            };
        }

        let record = self.offenders.entry(sender).or_insert_with(|| OffenderRecord {
            user: sender,
            strikes: 0,
            violations: 0,
            sanction: Sanction::None,
            sanction_until: None,
            last_violation_at: now,
        });
        record.strikes = record.strikes.saturating_add(result.max_severity);
        record.violations = record.violations.saturating_add(1);
        record.last_violation_at = now;

        let earned = self.config.sanction_for(record.strikes);
        if earned > record.sanction {
            record.sanction = earned;
            record.sanction_until = self.config.sanction_length(earned).map(|d| now + d);
            tracing::warn!(
                user = %sender,
                strikes = record.strikes,
                sanction = earned.as_str(),
                "abuse sanction escalated"
            );
        }

        let safety_event = match result.verdict {
            Verdict::Block => Some(SafetyEventKind::HarassmentConfirmed),
            Verdict::Flag => Some(SafetyEventKind::ReportReceived),
            Verdict::Allow => None,
        };
        tracing::info!(
            user = %sender,
            verdict = result.verdict.as_str(),
            max_severity = result.max_severity,
            "message screened"
        );
        ScreenOutcome {
            offender: Some(record.clone()),
            result,
            safety_event,
        }
    }

    /// A user's record, if they have ever been flagged.
    pub fn offender(&self, user: &UserId) -> Option<&OffenderRecord> {
        self.offenders.get(user)
    }

    /// Number of offenders per sanction, in [`Sanction::ALL`] order.
    pub fn count_by_sanction(&self) -> Vec<(Sanction, usize)> {
        Sanction::ALL
            .into_iter()
            .map(|s| (s, self.offenders.values().filter(|o| o.sanction == s).count()))
            .collect()
    }
}

impl Default for AbuseFirewall {
    fn default() -> Self {
        Self::new(AbuseConfig::default())
    }
}
