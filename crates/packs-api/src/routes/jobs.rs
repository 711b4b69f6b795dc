//! # Job Routes
//!
//! Administrators list the periodic job schedules and trigger a job
//! outside its schedule.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use packs_jobs::{CronSchedule, JobKind};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::jobs::run_job;
use crate::state::AppState;

/// One job schedule.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScheduleResponse {
    pub job: String,
    pub description: String,
    /// `hourly`, `daily`, `weekly` or `monthly`.
    pub pattern: String,
    pub active: bool,
    pub last_fired: Option<String>,
    pub next_run: String,
}

/// Result of a manual run.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobRunResponse {
    pub job: String,
    pub affected: usize,
    pub failures: Vec<String>,
    pub ran_at: String,
}

/// Enable or disable a schedule.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScheduleUpdateRequest {
    pub active: bool,
}

/// Build the jobs router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/jobs", get(list_jobs))
        .route("/v1/jobs/:job", post(update_schedule))
        .route("/v1/jobs/:job/run", post(trigger_job))
}

fn parse_job(raw: &str) -> Result<JobKind, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("unknown job: '{raw}'")))
}

fn schedule_to_response(s: &CronSchedule) -> ScheduleResponse {
    ScheduleResponse {
        job: s.schedule_id.clone(),
        description: s.description.clone(),
        pattern: s.pattern.as_str().to_string(),
        active: s.active,
        last_fired: s.last_fired.map(|t| t.to_rfc3339()),
        next_run: s.pattern.next_after(Utc::now()).to_rfc3339(),
    }
}

/// GET /v1/jobs — Job schedules.
#[utoipa::path(
    get,
    path = "/v1/jobs",
    responses(
        (status = 200, description = "Schedules in catalog order", body = Vec<ScheduleResponse>),
        (status = 403, description = "Admin role required"),
    ),
    tag = "jobs"
)]
async fn list_jobs(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<ScheduleResponse>>, AppError> {
    require_role(&caller, Role::Admin)?;
    let scheduler = state.scheduler.lock();
    Ok(Json(scheduler.schedules().map(schedule_to_response).collect()))
}

/// POST /v1/jobs/:job — Enable or disable a job's schedule.
#[utoipa::path(
    post,
    path = "/v1/jobs/{job}",
    params(("job" = String, Path, description = "Job name, e.g. `safety_decay`")),
    request_body = ScheduleUpdateRequest,
    responses(
        (status = 200, description = "Updated schedule", body = ScheduleResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown job"),
    ),
    tag = "jobs"
)]
async fn update_schedule(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(job): Path<String>,
    body: Result<Json<ScheduleUpdateRequest>, JsonRejection>,
) -> Result<Json<ScheduleResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let kind = parse_job(&job)?;
    let req = extract_json(body)?;

    let mut scheduler = state.scheduler.lock();
    scheduler.set_active(kind, req.active);
    tracing::info!(job = kind.as_str(), active = req.active, "job schedule updated");
    let schedule = scheduler
        .schedule(kind)
        .ok_or_else(|| AppError::NotFound(format!("no schedule for {kind}")))?;
    Ok(Json(schedule_to_response(schedule)))
}

/// POST /v1/jobs/:job/run — Run a job now.
#[utoipa::path(
    post,
    path = "/v1/jobs/{job}/run",
    params(("job" = String, Path, description = "Job name, e.g. `escrow_auto_release`")),
    responses(
        (status = 202, description = "Job ran", body = JobRunResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unknown job"),
    ),
    tag = "jobs"
)]
async fn trigger_job(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(job): Path<String>,
) -> Result<(StatusCode, Json<JobRunResponse>), AppError> {
    require_role(&caller, Role::Admin)?;
    let kind = parse_job(&job)?;
    let report = run_job(&state, kind, Utc::now()).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(JobRunResponse {
            job: report.job.as_str().to_string(),
            affected: report.affected,
            failures: report.failures,
            ran_at: report.ran_at.to_rfc3339(),
        }),
    ))
}
