//! # Job Runner
//!
//! Executes [`JobKind`]s against the application state, either on demand
//! through the jobs route or from the background scheduler task started by
//! [`spawn_scheduler`]. Jobs that touch escrows or refund requests commit
//! through [`AppState::transact`], so a failed write leaves nothing behind.

use std::time::Duration;

use chrono::{DateTime, Utc};
use packs_engagement::MissionCadence;
use packs_jobs::JobKind;
use serde::Serialize;

use crate::db::WriteSet;
use crate::error::AppError;
use crate::state::AppState;

/// Outcome of one job run.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// The job that ran.
    pub job: JobKind,
    /// Records changed: escrows released, scores decayed, requests
    /// escalated, or mission progress cleared.
    pub affected: usize,
    /// Per-record failures that did not stop the run.
    pub failures: Vec<String>,
    /// When the run started.
    pub ran_at: DateTime<Utc>,
}

/// Run one job now.
pub async fn run_job(state: &AppState, job: JobKind, now: DateTime<Utc>) -> Result<JobReport, AppError> {
    let mut failures = Vec::new();
    let affected = match job {
        JobKind::EscrowAutoRelease => {
            let (released, sweep_failures) = state
                .transact(|_, book| {
                    let report = book.sweep_auto_release(now);
                    let failures: Vec<String> = report
                        .failures
                        .iter()
                        .map(|f| format!("{}: {}", f.escrow_id, f.error))
                        .collect();
                    let mut writes = WriteSet::default();
                    let mut released = Vec::with_capacity(report.released.len());
                    for change in report.released {
                        writes.escrows.push(change.escrow.clone());
                        writes.entries.push(change.entry);
                        released.push(change.escrow);
                    }
                    Ok(((released, failures), writes))
                })
                .await?;
            failures = sweep_failures;
            for escrow in &released {
                state.record_settlement(escrow, now);
            }
            released.len()
        }
        JobKind::SafetyDecay => {
            let per_day = state.safety_config().decay_per_day;
            state.safety_scores.update_all(|s| s.decay(1, per_day, now))
        }
        JobKind::RefundEscalation => {
            state
                .transact(|desk, _| {
                    let after = desk.config().escalation_delay();
                    let escalated = desk.escalate_stale(now, after);
                    let count = escalated.len();
                    let writes = WriteSet {
                        refunds: escalated,
                        ..WriteSet::default()
                    };
                    Ok((count, writes))
                })
                .await?
        }
        JobKind::MissionResetDaily => reset_missions(state, MissionCadence::Daily, now),
        JobKind::MissionResetWeekly => reset_missions(state, MissionCadence::Weekly, now),
        JobKind::MissionResetMonthly => reset_missions(state, MissionCadence::Monthly, now),
    };

    tracing::info!(
        job = job.as_str(),
        affected,
        failures = failures.len(),
        "job finished"
    );
    Ok(JobReport {
        job,
        affected,
        failures,
        ran_at: now,
    })
}

fn reset_missions(state: &AppState, cadence: MissionCadence, now: DateTime<Utc>) -> usize {
    state.missions.lock().reset(cadence, now)
}

/// Check the schedules once a minute and run whatever is due.
pub fn spawn_scheduler(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let due = state.scheduler.lock().due(now);
            for job in due {
                if let Err(e) = run_job(&state, job, now).await {
                    tracing::error!(job = job.as_str(), error = %e, "scheduled job failed");
                }
            }
        }
    })
}
