//! # Creator Mission Routes
//!
//! Creators earn XP by completing daily, weekly and monthly missions. Their
//! level feeds the pricing level multiplier.
//!
//! Progress comes from settled escrows. The manual activity endpoint is a
//! staff correction tool and needs the moderator role.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use packs_core::UserId;
use packs_engagement::{level_for_xp, MissionBoard, MissionMetric};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, require_self_or, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_positive, Validate};
use crate::routes::parse_code;
use crate::state::AppState;

/// Creator activity that advances missions.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActivityRequest {
    pub creator_id: Uuid,
    /// `messages_answered`, `calls_completed`, `tokens_earned` or `events_hosted`.
    pub metric: String,
    pub amount: u64,
}

impl Validate for ActivityRequest {
    fn validate(&self) -> Result<(), String> {
        require_positive("amount", self.amount)
    }
}

/// One mission with the creator's progress this period.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MissionStatusResponse {
    pub mission_id: String,
    pub title: String,
    pub cadence: String,
    pub metric: String,
    pub target: u64,
    pub xp_reward: u64,
    pub progress: u64,
    pub completed_at: Option<String>,
}

/// A creator's XP, level and missions.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatorMissionsResponse {
    pub creator_id: String,
    pub xp: u64,
    pub level: u32,
    pub missions: Vec<MissionStatusResponse>,
}

/// Result of recording activity.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityResponse {
    /// Mission ids completed by this activity.
    pub completed: Vec<String>,
    pub xp_awarded: u64,
    pub leveled_up: bool,
    pub status: CreatorMissionsResponse,
}

/// Build the missions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/missions/activity", post(record_activity))
        .route("/v1/missions/:creator", get(get_missions))
}

fn creator_status(board: &MissionBoard, creator: UserId) -> CreatorMissionsResponse {
    let progress = board.progress(&creator);
    let missions = board
        .catalog()
        .iter()
        .map(|m| {
            let p = progress.and_then(|p| p.missions.get(&m.id));
            MissionStatusResponse {
                mission_id: m.id.clone(),
                title: m.title.clone(),
                cadence: m.cadence.as_str().to_string(),
                metric: m.metric.as_str().to_string(),
                target: m.target,
                xp_reward: m.xp_reward,
                progress: p.map_or(0, |p| p.progress),
                completed_at: p.and_then(|p| p.completed_at).map(|t| t.to_rfc3339()),
            }
        })
        .collect();
    CreatorMissionsResponse {
        creator_id: creator.to_string(),
        xp: progress.map_or(0, |p| p.xp),
        level: progress.map_or_else(|| level_for_xp(0), |p| p.level),
        missions,
    }
}

/// GET /v1/missions/:creator — Mission status for a creator.
#[utoipa::path(
    get,
    path = "/v1/missions/{creator}",
    params(("creator" = Uuid, Path, description = "Creator UUID")),
    responses(
        (status = 200, description = "Missions with progress", body = CreatorMissionsResponse),
        (status = 403, description = "Not the creator or a moderator"),
    ),
    tag = "missions"
)]
async fn get_missions(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(creator): Path<Uuid>,
) -> Result<Json<CreatorMissionsResponse>, AppError> {
    let creator = UserId::from_uuid(creator);
    require_self_or(&caller, &creator, Role::Moderator)?;
    Ok(Json(creator_status(&state.missions.lock(), creator)))
}

/// POST /v1/missions/activity — Record creator activity by hand.
#[utoipa::path(
    post,
    path = "/v1/missions/activity",
    request_body = ActivityRequest,
    responses(
        (status = 200, description = "Missions advanced", body = ActivityResponse),
        (status = 403, description = "Moderator role required"),
        (status = 422, description = "Unknown metric or zero amount"),
    ),
    tag = "missions"
)]
async fn record_activity(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ActivityRequest>, JsonRejection>,
) -> Result<Json<ActivityResponse>, AppError> {
    require_role(&caller, Role::Moderator)?;
    let req = extract_validated_json(body)?;
    let creator = UserId::from_uuid(req.creator_id);
    let metric: MissionMetric = parse_code("metric", &req.metric)?;
    tracing::info!(creator = %creator, metric = metric.as_str(), amount = req.amount, "manual mission activity");

    let mut board = state.missions.lock();
    let outcome = board.record_activity(creator, metric, req.amount, Utc::now())?;
    Ok(Json(ActivityResponse {
        xp_awarded: outcome.completed.iter().map(|c| c.xp_awarded).sum(),
        completed: outcome.completed.into_iter().map(|c| c.mission_id).collect(),
        leveled_up: outcome.leveled_up,
        status: creator_status(&board, creator),
    }))
}
