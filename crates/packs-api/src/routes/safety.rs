//! # Safety Score Routes
//!
//! Moderators record safety events; users read their own score. Scores
//! start at 100 in each of four dimensions and recover daily through the
//! safety-decay job.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use packs_core::UserId;
use packs_rules::{SafetyEventKind, SafetyScore};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, require_self_or, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::routes::parse_code;
use crate::state::AppState;

/// A safety event against a user.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SafetyEventRequest {
    pub user_id: Uuid,
    /// `report_received`, `harassment_confirmed`, `fraud_flagged`,
    /// `refund_abuse`, `content_removed`, `blocked_by_user` or `identity_verified`.
    pub event: String,
}

impl Validate for SafetyEventRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("event", &self.event)
    }
}

/// A user's safety score.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SafetyScoreResponse {
    pub user_id: String,
    /// Mean of the four dimensions.
    pub overall: u8,
    /// `TRUSTED`, `STANDARD`, `WATCH` or `RESTRICTED`.
    pub risk_level: String,
    pub conduct: u8,
    pub financial: u8,
    pub content: u8,
    pub reputation: u8,
    pub events_recorded: u32,
    pub updated_at: String,
}

/// Build the safety router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/safety/events", post(record_event))
        .route("/v1/safety/:user", get(get_score))
}

pub(crate) fn score_to_response(s: &SafetyScore) -> SafetyScoreResponse {
    SafetyScoreResponse {
        user_id: s.user.to_string(),
        overall: s.overall(),
        risk_level: s.risk_level().as_str().to_string(),
        conduct: s.conduct,
        financial: s.financial,
        content: s.content,
        reputation: s.reputation,
        events_recorded: s.events_recorded,
        updated_at: s.updated_at.to_rfc3339(),
    }
}

/// POST /v1/safety/events — Apply a safety event.
#[utoipa::path(
    post,
    path = "/v1/safety/events",
    request_body = SafetyEventRequest,
    responses(
        (status = 200, description = "Updated score", body = SafetyScoreResponse),
        (status = 403, description = "Moderator role required"),
        (status = 422, description = "Unknown event"),
    ),
    tag = "safety"
)]
async fn record_event(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SafetyEventRequest>, JsonRejection>,
) -> Result<Json<SafetyScoreResponse>, AppError> {
    require_role(&caller, Role::Moderator)?;
    let req = extract_validated_json(body)?;
    let kind: SafetyEventKind = parse_code("safety event", &req.event)?;
    let score = state.apply_safety_event(UserId::from_uuid(req.user_id), kind, Utc::now());
    Ok(Json(score_to_response(&score)))
}

/// GET /v1/safety/:user — Read a safety score.
#[utoipa::path(
    get,
    path = "/v1/safety/{user}",
    params(("user" = Uuid, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Safety score", body = SafetyScoreResponse),
        (status = 403, description = "Not the user or a moderator"),
    ),
    tag = "safety"
)]
async fn get_score(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(user): Path<Uuid>,
) -> Result<Json<SafetyScoreResponse>, AppError> {
    let user = UserId::from_uuid(user);
    require_self_or(&caller, &user, Role::Moderator)?;
    Ok(Json(score_to_response(&state.safety_score(user, Utc::now()))))
}
