//! # Dynamic Pricing Routes
//!
//! Quotes combine the service's base price with the creator's recent
//! demand, mission level and safety standing.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use packs_core::UserId;
use packs_engagement::{level_for_xp, quote, QuoteRequest, ServiceKind};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::routes::parse_code;
use crate::state::AppState;

/// A request to price one unit of a creator's service.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteRequestBody {
    pub creator_id: Uuid,
    /// `chat_message`, `call_minute` or `event_ticket`.
    pub service: String,
    /// Requests for this creator in the recent window.
    #[serde(default)]
    pub recent_requests: u64,
    /// Typical requests per window. Zero means no demand adjustment.
    #[serde(default)]
    pub baseline_requests: u64,
}

impl Validate for QuoteRequestBody {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("service", &self.service)
    }
}

/// A price quote with the multipliers that produced it.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteResponse {
    pub creator_id: String,
    pub service: String,
    pub base: u64,
    pub creator_level: u32,
    pub risk_level: String,
    /// Multipliers in basis points, 10000 = 1.0x.
    pub demand_bps: u32,
    pub level_bps: u32,
    pub trust_bps: u32,
    pub price: u64,
    /// Whether the service's band clamped the price.
    pub clamped: bool,
}

/// Build the pricing router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/pricing/quote", post(price_quote))
}

/// POST /v1/pricing/quote — Quote a creator's service.
#[utoipa::path(
    post,
    path = "/v1/pricing/quote",
    request_body = QuoteRequestBody,
    responses(
        (status = 200, description = "Price quote", body = QuoteResponse),
        (status = 422, description = "Unknown service"),
    ),
    tag = "pricing"
)]
async fn price_quote(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    body: Result<Json<QuoteRequestBody>, JsonRejection>,
) -> Result<Json<QuoteResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let service: ServiceKind = parse_code("service", &req.service)?;
    let creator = UserId::from_uuid(req.creator_id);

    let creator_level = state
        .missions
        .lock()
        .progress(&creator)
        .map_or_else(|| level_for_xp(0), |p| p.level);
    let risk = state.safety_score(creator, Utc::now()).risk_level();

    let q = quote(
        state.pricing(),
        &QuoteRequest {
            service,
            creator_level,
            recent_requests: req.recent_requests,
            baseline_requests: req.baseline_requests,
            risk,
        },
    );
    tracing::debug!(
        creator = %creator,
        service = service.as_str(),
        price = q.price.value(),
        "price quoted"
    );
    Ok(Json(QuoteResponse {
        creator_id: creator.to_string(),
        service: service.as_str().to_string(),
        base: q.base.value(),
        creator_level,
        risk_level: risk.as_str().to_string(),
        demand_bps: q.demand_bps,
        level_bps: q.level_bps,
        trust_bps: q.trust_bps,
        price: q.price.value(),
        clamped: q.clamped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{app_as, body_json, json_request};
    use axum::http::StatusCode;
    use packs_engagement::MissionMetric;
    use packs_rules::SafetyEventKind;
    use tower::ServiceExt;

    async fn quote_for(state: &AppState, body: serde_json::Value) -> QuoteResponse {
        let resp = app_as(router(), state.clone(), CallerIdentity::user(UserId::new()))
            .oneshot(json_request("POST", "/v1/pricing/quote", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await
    }

    #[tokio::test]
    async fn neutral_quote_is_base_price() {
        let q = quote_for(
            &AppState::new(),
            serde_json::json!({"creator_id": Uuid::new_v4(), "service": "call_minute"}),
        )
        .await;
        assert_eq!(q.price, 30);
        assert_eq!(q.creator_level, 1);
        assert_eq!(q.risk_level, "TRUSTED");
        assert!(!q.clamped);
    }

    #[tokio::test]
    async fn demand_and_level_raise_price() {
        let state = AppState::new();
        let creator = UserId::new();
        // 150 XP puts the creator at level 2.
        state
            .missions
            .lock()
            .record_activity(creator, MissionMetric::CallsCompleted, 10, Utc::now())
            .unwrap();
        let q = quote_for(
            &state,
            serde_json::json!({
                "creator_id": creator.to_string(),
                "service": "chat_message",
                "recent_requests": 30,
                "baseline_requests": 20,
            }),
        )
        .await;
        assert_eq!(q.creator_level, 2);
        assert_eq!(q.demand_bps, 15_000);
        assert_eq!(q.level_bps, 10_500);
        // 10 * 1.5 = 15, * 1.05 = 15.75 -> 15
        assert_eq!(q.price, 15);
    }

    #[tokio::test]
    async fn elevated_risk_discounts() {
        let state = AppState::new();
        let creator = UserId::new();
        let now = Utc::now();
        for _ in 0..3 {
            state.apply_safety_event(creator, SafetyEventKind::HarassmentConfirmed, now);
        }
        for _ in 0..3 {
            state.apply_safety_event(creator, SafetyEventKind::FraudFlagged, now);
        }
        for _ in 0..4 {
            state.apply_safety_event(creator, SafetyEventKind::ContentRemoved, now);
        }
        let q = quote_for(
            &state,
            serde_json::json!({"creator_id": creator.to_string(), "service": "event_ticket"}),
        )
        .await;
        assert_ne!(q.risk_level, "TRUSTED");
        assert_eq!(q.trust_bps, 9_000);
        assert_eq!(q.price, 180);
    }
}
