//! # packs-jobs — Periodic Job Schedules
//!
//! Cron-like schedules for the background work of the packs platform. This
//! crate only decides *when* a job is due; the API crate owns the state the
//! jobs act on and runs them on a one-minute tokio interval.
//!
//! | Job | Pattern |
//! |---|---|
//! | `escrow_auto_release` | hourly |
//! | `safety_decay` | daily |
//! | `refund_escalation` | daily |
//! | `mission_reset_daily` | daily |
//! | `mission_reset_weekly` | weekly (Monday) |
//! | `mission_reset_monthly` | monthly (1st) |

pub mod job;
pub mod schedule;

pub use job::{JobKind, JobScheduler};
pub use schedule::{CronSchedule, SchedulePattern};
