//! # Creator Missions
//!
//! Missions track a creator's activity per period. Each mission watches one
//! [`MissionMetric`]; when progress reaches the target the mission completes
//! (once per period) and awards XP. Periods end when the scheduler calls
//! [`MissionBoard::reset`] for the mission's cadence.
//!
//! Levels follow fixed XP thresholds: 0, 100, 300, 700, 1500, 3000, and
//! doubling from there.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use packs_core::{UserId, ValidationError};
use serde::{Deserialize, Serialize};

/// XP needed for levels 1 through 6.
pub const LEVEL_THRESHOLDS: [u64; 6] = [0, 100, 300, 700, 1_500, 3_000];

/// How often a mission's progress resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionCadence {
    /// Reset at midnight UTC.
    Daily,
    /// Reset Monday midnight UTC.
    Weekly,
    /// Reset on the first of the month.
    Monthly,
}

impl MissionCadence {
    /// All cadences.
    pub const ALL: [MissionCadence; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// Activity counted toward missions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionMetric {
    /// Paid messages answered.
    MessagesAnswered,
    /// Calls completed.
    CallsCompleted,
    /// Tokens earned from released escrows.
    TokensEarned,
    /// Events hosted.
    EventsHosted,
}

impl MissionMetric {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessagesAnswered => "messages_answered",
            Self::CallsCompleted => "calls_completed",
            Self::TokensEarned => "tokens_earned",
            Self::EventsHosted => "events_hosted",
        }
    }
}

/// A mission definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    /// Stable identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Reset cadence.
    pub cadence: MissionCadence,
    /// Metric that advances it.
    pub metric: MissionMetric,
    /// Progress needed to complete.
    pub target: u64,
    /// XP awarded on completion.
    pub xp_reward: u64,
}

impl Mission {
    fn new(
        id: &str,
        title: &str,
        cadence: MissionCadence,
        metric: MissionMetric,
        target: u64,
        xp_reward: u64,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            cadence,
            metric,
            target,
            xp_reward,
        }
    }
}

/// The built-in mission catalog.
pub fn default_catalog() -> Vec<Mission> {
    use MissionCadence::*;
    use MissionMetric::*;
    vec![
        Mission::new("daily_replies", "Answer 20 messages", Daily, MessagesAnswered, 20, 25),
        Mission::new("daily_call", "Complete a call", Daily, CallsCompleted, 1, 30),
        Mission::new("weekly_calls", "Complete 10 calls", Weekly, CallsCompleted, 10, 120),
        Mission::new("weekly_earnings", "Earn 5,000 tokens", Weekly, TokensEarned, 5_000, 150),
        Mission::new("monthly_events", "Host 2 events", Monthly, EventsHosted, 2, 300),
        Mission::new("monthly_earnings", "Earn 50,000 tokens", Monthly, TokensEarned, 50_000, 600),
    ]
}

/// Level (1-based) for a lifetime XP total.
pub fn level_for_xp(xp: u64) -> u32 {
    let mut level = LEVEL_THRESHOLDS.iter().filter(|t| xp >= **t).count() as u32;
    let mut next = LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1].saturating_mul(2);
    while level as usize >= LEVEL_THRESHOLDS.len() && xp >= next {
        level += 1;
        next = next.saturating_mul(2);
        if next == u64::MAX {
            break;
        }
    }
    level
}

/// Progress on one mission in the current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionProgress {
    /// Accumulated metric value this period.
    pub progress: u64,
    /// When the mission completed this period.
    pub completed_at: Option<DateTime<Utc>>,
}

/// A creator's XP, level and mission progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorProgress {
    /// The creator.
    pub creator: UserId,
    /// Lifetime XP.
    pub xp: u64,
    /// Current level.
    pub level: u32,
    /// Progress keyed by mission id.
    pub missions: BTreeMap<String, MissionProgress>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl CreatorProgress {
    fn new(creator: UserId, now: DateTime<Utc>) -> Self {
        Self {
            creator,
            xp: 0,
            level: level_for_xp(0),
            missions: BTreeMap::new(),
            updated_at: now,
        }
    }
}

/// A mission completed by an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionCompletion {
    /// Completed mission.
    pub mission_id: String,
    /// XP awarded.
    pub xp_awarded: u64,
}

/// Result of [`MissionBoard::record_activity`].
#[derive(Debug, Clone, Serialize)]
pub struct ActivityOutcome {
    /// Progress after the activity.
    pub progress: CreatorProgress,
    /// Missions completed by this activity.
    pub completed: Vec<MissionCompletion>,
    /// Whether the creator gained a level.
    pub leveled_up: bool,
}

/// Mission catalog plus every creator's progress.
#[derive(Debug)]
pub struct MissionBoard {
    catalog: Vec<Mission>,
    creators: HashMap<UserId, CreatorProgress>,
}

impl Default for MissionBoard {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            creators: HashMap::new(),
        }
    }
}

impl MissionBoard {
    /// A board over `catalog`. Ids must be unique and targets non-zero.
    pub fn new(catalog: Vec<Mission>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        for mission in &catalog {
            if mission.id.trim().is_empty() {
                return Err(ValidationError::EmptyField("mission.id"));
            }
            if !seen.insert(mission.id.as_str()) {
                return Err(ValidationError::InvalidSetting {
                    field: "missions",
                    reason: format!("duplicate mission id {}", mission.id),
                });
            }
            if mission.target == 0 {
                return Err(ValidationError::ZeroAmount("mission.target"));
            }
        }
        Ok(Self {
            catalog,
            creators: HashMap::new(),
        })
    }

    /// The mission catalog.
    pub fn catalog(&self) -> &[Mission] {
        &self.catalog
    }

    /// A creator's progress, if they have recorded any activity.
    pub fn progress(&self, creator: &UserId) -> Option<&CreatorProgress> {
        self.creators.get(creator)
    }

    /// Advance every mission on `metric` by `amount`.
    pub fn record_activity(
        &mut self,
        creator: UserId,
        metric: MissionMetric,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome, ValidationError> {
        if amount == 0 {
            return Err(ValidationError::ZeroAmount("amount"));
        }
        let state = self
            .creators
            .entry(creator)
            .or_insert_with(|| CreatorProgress::new(creator, now));
        let level_before = state.level;
        let mut completed = Vec::new();

        for mission in self.catalog.iter().filter(|m| m.metric == metric) {
            let entry = state
                .missions
                .entry(mission.id.clone())
                .or_insert(MissionProgress {
                    progress: 0,
                    completed_at: None,
                });
            entry.progress = entry.progress.saturating_add(amount);
            if entry.completed_at.is_none() && entry.progress >= mission.target {
                entry.completed_at = Some(now);
                state.xp = state.xp.saturating_add(mission.xp_reward);
                completed.push(MissionCompletion {
                    mission_id: mission.id.clone(),
                    xp_awarded: mission.xp_reward,
                });
            }
        }
        state.level = level_for_xp(state.xp);
        state.updated_at = now;

        for c in &completed {
            tracing::info!(creator = %creator, mission = %c.mission_id, xp = c.xp_awarded, "mission completed");
        }
        Ok(ActivityOutcome {
            progress: state.clone(),
            leveled_up: state.level > level_before,
            completed,
        })
    }

    /// Clear progress on every mission of `cadence`. Returns how many
    /// progress records were cleared.
    pub fn reset(&mut self, cadence: MissionCadence, now: DateTime<Utc>) -> usize {
        let ids: HashSet<&str> = self
            .catalog
            .iter()
            .filter(|m| m.cadence == cadence)
            .map(|m| m.id.as_str())
            .collect();
        let mut cleared = 0;
        for state in self.creators.values_mut() {
            let before = state.missions.len();
            state.missions.retain(|id, _| !ids.contains(id.as_str()));
            if state.missions.len() != before {
                cleared += before - state.missions.len();
                state.updated_at = now;
            }
        }
        tracing::info!(cadence = cadence.as_str(), cleared, "missions reset");
        cleared
    }
}
