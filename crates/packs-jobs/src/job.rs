//! The job catalog and its scheduler.

use chrono::{DateTime, Utc};
use packs_core::ValidationError;
use serde::{Deserialize, Serialize};

use crate::schedule::{CronSchedule, SchedulePattern};

/// A periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Release HELD escrows past their auto-release deadline.
    EscrowAutoRelease,
    /// Decay every safety score one day toward 100.
    SafetyDecay,
    /// Move stale tier-2 refund requests to tier 3.
    RefundEscalation,
    /// Reset daily missions.
    MissionResetDaily,
    /// Reset weekly missions.
    MissionResetWeekly,
    /// Reset monthly missions.
    MissionResetMonthly,
}

impl JobKind {
    /// Every job, in catalog order.
    pub const ALL: [JobKind; 6] = [
        Self::EscrowAutoRelease,
        Self::SafetyDecay,
        Self::RefundEscalation,
        Self::MissionResetDaily,
        Self::MissionResetWeekly,
        Self::MissionResetMonthly,
    ];

    /// The canonical string name (also the schedule id).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EscrowAutoRelease => "escrow_auto_release",
            Self::SafetyDecay => "safety_decay",
            Self::RefundEscalation => "refund_escalation",
            Self::MissionResetDaily => "mission_reset_daily",
            Self::MissionResetWeekly => "mission_reset_weekly",
            Self::MissionResetMonthly => "mission_reset_monthly",
        }
    }

    /// How often the job runs.
    pub fn pattern(&self) -> SchedulePattern {
        match self {
            Self::EscrowAutoRelease => SchedulePattern::Hourly,
            Self::SafetyDecay | Self::RefundEscalation | Self::MissionResetDaily => {
                SchedulePattern::Daily
            }
            Self::MissionResetWeekly => SchedulePattern::Weekly,
            Self::MissionResetMonthly => SchedulePattern::Monthly,
        }
    }

    /// One-line description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::EscrowAutoRelease => "release held escrows past their auto-release deadline",
            Self::SafetyDecay => "decay safety scores toward 100",
            Self::RefundEscalation => "escalate stale tier-2 refund requests to tier 3",
            Self::MissionResetDaily => "reset daily creator missions",
            Self::MissionResetWeekly => "reset weekly creator missions",
            Self::MissionResetMonthly => "reset monthly creator missions",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCode {
                kind: "job",
                value: s.to_string(),
            })
    }
}

/// Schedules for every [`JobKind`].
#[derive(Debug, Clone)]
pub struct JobScheduler {
    schedules: Vec<(JobKind, CronSchedule)>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    /// All jobs, active.
    pub fn new() -> Self {
        Self {
            schedules: JobKind::ALL
                .into_iter()
                .map(|k| (k, CronSchedule::new(k.as_str(), k.description(), k.pattern())))
                .collect(),
        }
    }

    /// The schedules, in catalog order.
    pub fn schedules(&self) -> impl Iterator<Item = &CronSchedule> {
        self.schedules.iter().map(|(_, s)| s)
    }

    /// One job's schedule.
    pub fn schedule(&self, kind: JobKind) -> Option<&CronSchedule> {
        self.schedules
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| s)
    }

    /// Enable or disable a job.
    pub fn set_active(&mut self, kind: JobKind, active: bool) {
        for (k, s) in &mut self.schedules {
            if *k == kind {
                s.active = active;
            }
        }
    }

    /// Jobs due at `now`, marked fired.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<JobKind> {
        let mut due = Vec::new();
        for (kind, schedule) in &mut self.schedules {
            if schedule.should_fire(now) {
                schedule.mark_fired(now);
                due.push(*kind);
            }
        }
        if !due.is_empty() {
            tracing::debug!(count = due.len(), "jobs due");
        }
        due
    }
}
