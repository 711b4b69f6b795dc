//! # Job Schedules
//!
//! `packs jobs` lists the built-in job catalog with each job's pattern and
//! next run. `--at` evaluates the next run from a given instant instead of
//! now.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use packs_jobs::JobScheduler;

/// Jobs subcommand arguments.
#[derive(Args, Debug)]
pub struct JobsArgs {
    /// RFC 3339 instant to compute next runs from.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

/// One row of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub job: String,
    pub pattern: &'static str,
    pub next_run: DateTime<Utc>,
    pub description: String,
}

/// The catalog in order, with next runs after `at`.
pub fn schedule_rows(at: DateTime<Utc>) -> Vec<JobRow> {
    JobScheduler::new()
        .schedules()
        .map(|s| JobRow {
            job: s.schedule_id.clone(),
            pattern: s.pattern.as_str(),
            next_run: s.pattern.next_after(at),
            description: s.description.clone(),
        })
        .collect()
}

/// Execute the jobs subcommand.
pub fn run_jobs(args: &JobsArgs) -> Result<u8> {
    let at = args.at.unwrap_or_else(Utc::now);
    println!("{:<24} {:<8} {:<26} DESCRIPTION", "JOB", "PATTERN", "NEXT RUN");
    for row in schedule_rows(at) {
        println!(
            "{:<24} {:<8} {:<26} {}",
            row.job,
            row.pattern,
            row.next_run.to_rfc3339(),
            row.description
        );
    }
    Ok(0)
}
