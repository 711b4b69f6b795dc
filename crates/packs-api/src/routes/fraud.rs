//! # Fraud Audit Routes
//!
//! Read access to the append-only log of fraud detections produced while
//! screening refund requests.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use packs_rules::{FraudDetectionRecord, FraudPattern};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::routes::clamp_limit;
use crate::state::AppState;

/// A fraud detection in API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FraudRecordResponse {
    pub record_id: String,
    pub user_id: String,
    pub pattern: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub severity: String,
    pub penalty: String,
    pub refund_request_id: Option<String>,
    pub evidence: Vec<String>,
    pub detected_at: String,
}

/// Fraud log filters.
#[derive(Debug, Deserialize, IntoParams)]
pub struct FraudQuery {
    /// Only detections for this user.
    pub user_id: Option<Uuid>,
    /// Only this pattern, e.g. `REFUND_FARMING`.
    pub pattern: Option<String>,
    /// Maximum results, newest first (default 100, max 1000).
    pub limit: Option<usize>,
}

/// Build the fraud audit router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/fraud/records", get(list_records))
}

pub(crate) fn fraud_to_response(r: &FraudDetectionRecord) -> FraudRecordResponse {
    FraudRecordResponse {
        record_id: r.id.to_string(),
        user_id: r.user.to_string(),
        pattern: r.pattern.as_str().to_string(),
        confidence: r.confidence,
        severity: r.severity.as_str().to_string(),
        penalty: r.penalty.as_str().to_string(),
        refund_request_id: r.refund_request_id.map(|id| id.to_string()),
        evidence: r.evidence.clone(),
        detected_at: r.detected_at.to_rfc3339(),
    }
}

/// GET /v1/fraud/records — Fraud detection audit log.
#[utoipa::path(
    get,
    path = "/v1/fraud/records",
    params(FraudQuery),
    responses(
        (status = 200, description = "Fraud detections, newest first", body = Vec<FraudRecordResponse>),
        (status = 403, description = "Moderator role required"),
        (status = 422, description = "Unknown pattern"),
    ),
    tag = "fraud"
)]
async fn list_records(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<FraudQuery>,
) -> Result<Json<Vec<FraudRecordResponse>>, AppError> {
    require_role(&caller, Role::Moderator)?;
    let pattern = query
        .pattern
        .as_deref()
        .map(FraudPattern::from_code)
        .transpose()?;
    let limit = clamp_limit(query.limit, 100, 1000);

    let records = state.fraud_records.read();
    let out = records
        .iter()
        .rev()
        .filter(|r| query.user_id.map_or(true, |u| r.user.as_uuid() == &u))
        .filter(|r| pattern.map_or(true, |p| r.pattern == p))
        .take(limit)
        .map(fraud_to_response)
        .collect();
    Ok(Json(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{app_as, body_json, get_request};
    use axum::http::StatusCode;
    use chrono::Utc;
    use packs_core::UserId;
    use packs_rules::{FraudFinding, Severity};
    use tower::ServiceExt;

    fn record(user: UserId, pattern: FraudPattern) -> FraudDetectionRecord {
        let severity = Severity::from_confidence(9_000);
        let finding = FraudFinding {
            pattern,
            confidence: 0.9,
            severity,
            penalty: severity.penalty(),
            evidence: vec!["test".to_string()],
        };
        FraudDetectionRecord::from_finding(user, &finding, None, Utc::now())
    }

    #[tokio::test]
    async fn moderators_filter_log() {
        let state = AppState::new();
        let (a, b) = (UserId::new(), UserId::new());
        state.record_fraud(&[
            record(a, FraudPattern::RefundFarming),
            record(b, FraudPattern::EmotionalBlackmail),
            record(a, FraudPattern::EmotionalBlackmail),
        ]);
        let mod_caller = CallerIdentity {
            role: Role::Moderator,
            user_id: None,
        };
        let resp = app_as(router(), state.clone(), mod_caller.clone())
            .oneshot(get_request(&format!("/v1/fraud/records?user_id={a}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Vec<FraudRecordResponse> = body_json(resp).await;
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].pattern, "EMOTIONAL_BLACKMAIL");

        let resp = app_as(router(), state, mod_caller)
            .oneshot(get_request("/v1/fraud/records?pattern=REFUND_FARMING"))
            .await
            .unwrap();
        let body: Vec<FraudRecordResponse> = body_json(resp).await;
        assert_eq!(body.len(), 1);
    }

    #[tokio::test]
    async fn users_cannot_read_log() {
        let resp = app_as(router(), AppState::new(), CallerIdentity::user(UserId::new()))
            .oneshot(get_request("/v1/fraud/records"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
