//! Cron-like recurring schedules.
//!
//! A schedule fires in the first minute of its slot (top of the hour,
//! midnight UTC, Monday midnight, the 1st at midnight) and never twice for
//! the same slot.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SchedulePattern
// ---------------------------------------------------------------------------

/// A recurrence pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePattern {
    /// Every hour at minute 0.
    Hourly,
    /// Every day at midnight UTC.
    Daily,
    /// Every Monday at midnight UTC.
    Weekly,
    /// First day of each month at midnight UTC.
    Monthly,
}

impl SchedulePattern {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Whether `now` falls in the first minute of a slot.
    pub fn matches(&self, now: DateTime<Utc>) -> bool {
        let top_of_hour = now.minute() == 0;
        let midnight = top_of_hour && now.hour() == 0;
        match self {
            Self::Hourly => top_of_hour,
            Self::Daily => midnight,
            Self::Weekly => midnight && now.weekday() == Weekday::Mon,
            Self::Monthly => midnight && now.day() == 1,
        }
    }

    /// Start of the first slot strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map_or(now, |t| t.and_utc());
        match self {
            Self::Hourly => {
                let hour_start = now
                    .with_minute(0)
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))
                    .unwrap_or(now);
                hour_start + Duration::hours(1)
            }
            Self::Daily => midnight(date) + Duration::days(1),
            Self::Weekly => {
                let days_ahead = 7 - i64::from(now.weekday().num_days_from_monday());
                midnight(date) + Duration::days(days_ahead)
            }
            Self::Monthly => {
                let (y, m) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1)
                    .map(midnight)
                    .unwrap_or_else(|| midnight(date) + Duration::days(31))
            }
        }
    }
}

impl std::fmt::Display for SchedulePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CronSchedule
// ---------------------------------------------------------------------------

/// A named recurring schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    /// Unique schedule identifier.
    pub schedule_id: String,
    /// Human-readable description.
    pub description: String,
    /// The recurrence pattern.
    pub pattern: SchedulePattern,
    /// Whether this schedule is currently active.
    pub active: bool,
    /// Last time this schedule fired.
    pub last_fired: Option<DateTime<Utc>>,
}

impl CronSchedule {
    /// Create an active schedule that has never fired.
    pub fn new(
        schedule_id: impl Into<String>,
        description: impl Into<String>,
        pattern: SchedulePattern,
    ) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            description: description.into(),
            pattern,
            active: true,
            last_fired: None,
        }
    }

    /// Whether the schedule should fire at `now`: active, in the first
    /// minute of a slot, and not already fired for that slot.
    pub fn should_fire(&self, now: DateTime<Utc>) -> bool {
        if !self.active || !self.pattern.matches(now) {
            return false;
        }
        match self.last_fired {
            Some(last) => minute_slot(now) != minute_slot(last),
            None => true,
        }
    }

    /// Record that the schedule fired at `at`.
    pub fn mark_fired(&mut self, at: DateTime<Utc>) {
        self.last_fired = Some(at);
    }
}

fn minute_slot(t: DateTime<Utc>) -> Option<chrono::NaiveDateTime> {
    t.date_naive().and_hms_opt(t.hour(), t.minute(), 0)
}
