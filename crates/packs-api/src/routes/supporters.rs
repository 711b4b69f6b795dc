//! # Supporter Ranking Routes
//!
//! Serves each creator's leaderboard. The top ten supporters carry a badge.
//!
//! Spend is recorded when an escrow settles: the payer is credited with
//! whatever they did not get back. The manual spend endpoint is a staff
//! correction tool and needs the moderator role.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use packs_core::{TokenAmount, UserId};
use packs_engagement::SupporterEntry;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_positive, Validate};
use crate::routes::clamp_limit;
use crate::state::AppState;

/// Spend by a supporter toward a creator.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SpendRequest {
    pub creator_id: Uuid,
    pub supporter_id: Uuid,
    pub amount: u64,
}

impl Validate for SpendRequest {
    fn validate(&self) -> Result<(), String> {
        require_positive("amount", self.amount)?;
        if self.supporter_id == self.creator_id {
            return Err("a creator cannot support themselves".to_string());
        }
        Ok(())
    }
}

/// Rank movement after a spend.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RankChangeResponse {
    pub creator_id: String,
    pub supporter_id: String,
    pub previous_rank: Option<usize>,
    pub new_rank: usize,
    /// `TOP_1`, `TOP_3` or `TOP_10` within the top ten.
    pub badge: Option<String>,
    pub total_spent: u64,
    pub improved: bool,
}

/// One leaderboard row.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SupporterResponse {
    pub rank: usize,
    pub supporter_id: String,
    pub total_spent: u64,
    pub badge: Option<String>,
    pub first_spend_at: String,
    pub last_spend_at: String,
}

/// Leaderboard size.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaderboardQuery {
    /// Maximum rows (default 10, max 100).
    pub limit: Option<usize>,
}

/// Build the supporters router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/supporters/spend", post(record_spend))
        .route("/v1/creators/:id/leaderboard", get(leaderboard))
}

fn supporter_to_response(e: &SupporterEntry) -> SupporterResponse {
    SupporterResponse {
        rank: e.rank,
        supporter_id: e.supporter.to_string(),
        total_spent: e.total_spent.value(),
        badge: e.badge.map(|b| b.as_str().to_string()),
        first_spend_at: e.first_spend_at.to_rfc3339(),
        last_spend_at: e.last_spend_at.to_rfc3339(),
    }
}

/// POST /v1/supporters/spend — Record supporter spend by hand.
#[utoipa::path(
    post,
    path = "/v1/supporters/spend",
    request_body = SpendRequest,
    responses(
        (status = 200, description = "Rank change", body = RankChangeResponse),
        (status = 403, description = "Moderator role required"),
        (status = 422, description = "Zero amount or self-support"),
    ),
    tag = "supporters"
)]
async fn record_spend(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SpendRequest>, JsonRejection>,
) -> Result<Json<RankChangeResponse>, AppError> {
    require_role(&caller, Role::Moderator)?;
    let req = extract_validated_json(body)?;
    let supporter = UserId::from_uuid(req.supporter_id);
    let creator = UserId::from_uuid(req.creator_id);
    tracing::info!(creator = %creator, supporter = %supporter, amount = req.amount, "manual supporter spend");

    let change = state.rankings.lock().record_spend(
        creator,
        supporter,
        TokenAmount::new(req.amount),
        Utc::now(),
    )?;
    Ok(Json(RankChangeResponse {
        creator_id: change.creator.to_string(),
        supporter_id: change.supporter.to_string(),
        previous_rank: change.previous_rank,
        new_rank: change.new_rank,
        badge: change.badge.map(|b| b.as_str().to_string()),
        total_spent: change.total_spent.value(),
        improved: change.improved(),
    }))
}

/// GET /v1/creators/:id/leaderboard — Top supporters of a creator.
#[utoipa::path(
    get,
    path = "/v1/creators/{id}/leaderboard",
    params(("id" = Uuid, Path, description = "Creator UUID"), LeaderboardQuery),
    responses(
        (status = 200, description = "Leaderboard, rank 1 first", body = Vec<SupporterResponse>),
    ),
    tag = "supporters"
)]
async fn leaderboard(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(id): Path<Uuid>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<SupporterResponse>> {
    let limit = clamp_limit(query.limit, 10, 100);
    let board = state
        .rankings
        .lock()
        .leaderboard(&UserId::from_uuid(id), limit);
    Json(board.iter().map(supporter_to_response).collect())
}
