//! # Admin Resolution Routes
//!
//! Administrator overrides. An admin may decide any open refund request
//! (tier 2 or tier 3), or settle an escrow directly. Direct settlement
//! closes the escrow's open refund request, if there is one, with the
//! matching outcome. Settled escrows feed supporter rankings and creator
//! missions the same way a payer release does.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use packs_core::TokenAmount;
use packs_ledger::{EscrowChange, EscrowId};
use packs_refund::{RefundRequest, RefundRequestId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::db::WriteSet;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::escrows::{change_to_response, EscrowChangeResponse};
use crate::routes::refunds::{
    parse_outcome, refund_to_response, resolve_to_response, resolve_writes, RefundResponse,
    ResolveRefundRequest, ResolveRefundResponse,
};
use crate::routes::staff_actor;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Admin release of an escrow.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminReleaseRequest {
    pub note: Option<String>,
}

impl Validate for AdminReleaseRequest {
    fn validate(&self) -> Result<(), String> {
        validate_note(self.note.as_deref())
    }
}

/// Admin refund of an escrow.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminRefundRequest {
    /// Tokens returned to the payer. Defaults to the whole escrow.
    pub amount: Option<u64>,
    pub note: Option<String>,
}

impl Validate for AdminRefundRequest {
    fn validate(&self) -> Result<(), String> {
        if self.amount == Some(0) {
            return Err("amount must be greater than zero".to_string());
        }
        validate_note(self.note.as_deref())
    }
}

/// Result of a direct escrow override.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminEscrowResponse {
    #[serde(flatten)]
    pub change: EscrowChangeResponse,
    /// The open refund request this override closed, if any.
    pub closed_request: Option<RefundResponse>,
}

fn validate_note(note: Option<&str>) -> Result<(), String> {
    if note.is_some_and(|n| n.chars().count() > 2000) {
        Err("note must be at most 2000 characters".to_string())
    } else {
        Ok(())
    }
}

fn override_writes(change: &EscrowChange, closed: Option<&RefundRequest>) -> WriteSet {
    WriteSet {
        escrows: vec![change.escrow.clone()],
        entries: vec![change.entry.clone()],
        refunds: closed.into_iter().cloned().collect(),
        fraud: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the admin override router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/refunds/:id/resolve", post(resolve_refund))
        .route("/v1/admin/escrows/:id/release", post(release_escrow))
        .route("/v1/admin/escrows/:id/refund", post(refund_escrow))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/admin/refunds/:id/resolve — Decide any open refund request.
#[utoipa::path(
    post,
    path = "/v1/admin/refunds/{id}/resolve",
    params(("id" = Uuid, Path, description = "Refund request UUID")),
    request_body = ResolveRefundRequest,
    responses(
        (status = 200, description = "Request resolved", body = ResolveRefundResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already closed"),
    ),
    tag = "admin"
)]
async fn resolve_refund(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ResolveRefundRequest>, JsonRejection>,
) -> Result<Json<ResolveRefundResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    let outcome = parse_outcome(&req.outcome)?;
    let admin = staff_actor(&caller);
    let now = Utc::now();

    let resolved = state
        .transact(|desk, book| {
            let resolved = desk.admin_resolve(
                &RefundRequestId::from_uuid(id),
                outcome,
                admin,
                req.note,
                book,
                now,
            )?;
            let writes = resolve_writes(&resolved);
            Ok((resolved, writes))
        })
        .await?;
    tracing::info!(
        request_id = %resolved.request.id,
        admin = %admin,
        outcome = outcome.as_str(),
        "admin resolved refund request"
    );

    state.record_settlement(&resolved.change.escrow, now);
    Ok(Json(resolve_to_response(&resolved)))
}

/// POST /v1/admin/escrows/:id/release — Release a HELD or DISPUTED escrow.
#[utoipa::path(
    post,
    path = "/v1/admin/escrows/{id}/release",
    params(("id" = Uuid, Path, description = "Escrow UUID")),
    request_body = AdminReleaseRequest,
    responses(
        (status = 200, description = "Escrow released", body = AdminEscrowResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Escrow not found"),
        (status = 409, description = "Escrow already settled"),
    ),
    tag = "admin"
)]
async fn release_escrow(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AdminReleaseRequest>, JsonRejection>,
) -> Result<Json<AdminEscrowResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    let admin = staff_actor(&caller);
    let now = Utc::now();

    let (change, closed) = state
        .transact(|desk, book| {
            let (change, closed) =
                desk.admin_release(&EscrowId::from_uuid(id), admin, req.note, book, now)?;
            let writes = override_writes(&change, closed.as_ref());
            Ok(((change, closed), writes))
        })
        .await?;
    tracing::info!(escrow_id = %change.escrow.id, admin = %admin, "admin released escrow");

    state.record_settlement(&change.escrow, now);
    Ok(Json(AdminEscrowResponse {
        change: change_to_response(&change),
        closed_request: closed.as_ref().map(refund_to_response),
    }))
}

/// POST /v1/admin/escrows/:id/refund — Refund a HELD or DISPUTED escrow.
#[utoipa::path(
    post,
    path = "/v1/admin/escrows/{id}/refund",
    params(("id" = Uuid, Path, description = "Escrow UUID")),
    request_body = AdminRefundRequest,
    responses(
        (status = 200, description = "Escrow refunded", body = AdminEscrowResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Escrow not found"),
        (status = 409, description = "Escrow already settled"),
        (status = 422, description = "Amount exceeds the escrow total"),
    ),
    tag = "admin"
)]
async fn refund_escrow(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AdminRefundRequest>, JsonRejection>,
) -> Result<Json<AdminEscrowResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    let admin = staff_actor(&caller);
    let escrow_id = EscrowId::from_uuid(id);
    let now = Utc::now();

    let (change, closed) = state
        .transact(|desk, book| {
            let amount = match req.amount {
                Some(a) => TokenAmount::new(a),
                None => book.require(&escrow_id)?.total,
            };
            let (change, closed) =
                desk.admin_refund(&escrow_id, amount, admin, req.note, book, now)?;
            let writes = override_writes(&change, closed.as_ref());
            Ok(((change, closed), writes))
        })
        .await?;
    tracing::info!(
        escrow_id = %change.escrow.id,
        admin = %admin,
        amount = change.escrow.settlement.map(|s| s.payer_refund.value()),
        "admin refunded escrow"
    );

    state.record_settlement(&change.escrow, now);
    Ok(Json(AdminEscrowResponse {
        change: change_to_response(&change),
        closed_request: closed.as_ref().map(refund_to_response),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::refunds::tests::held_escrow;
    use crate::routes::test_support::{app_as, body_json, json_request};
    use axum::http::StatusCode;
    use packs_core::UserId;
    use packs_ledger::TransactionKind;
    use packs_refund::RefundSubmission;
    use tower::ServiceExt;

    fn dispute(state: &AppState, payer: UserId, escrow_id: EscrowId, reason: &str) -> RefundRequestId {
        let mut desk = state.refunds.lock();
        let mut book = state.book.lock();
        desk.submit(
            RefundSubmission {
                escrow_id,
                requester: payer,
                reason_code: reason.to_string(),
                description: String::new(),
                evidence: None,
            },
            &mut book,
            &state.fraud_engine,
            Utc::now(),
        )
        .unwrap()
        .request
        .id
    }

    #[tokio::test]
    async fn admin_resolves_tier_three() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, _) = held_escrow(&state, payer, TransactionKind::Call, 300);
        let request_id = dispute(&state, payer, escrow_id, "harassment");

        let resp = app_as(router(), state.clone(), CallerIdentity::admin())
            .oneshot(json_request(
                "POST",
                &format!("/v1/admin/refunds/{}/resolve", request_id.as_uuid()),
                serde_json::json!({"outcome": "FULL_REFUND", "note": "confirmed"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: ResolveRefundResponse = body_json(resp).await;
        assert_eq!(body.request.resolver.as_deref(), Some("admin"));
        assert_eq!(body.request.resolution_note.as_deref(), Some("confirmed"));
        assert_eq!(body.escrow.status, "REFUNDED");
        assert_eq!(state.book.lock().wallet(payer).available.value(), 300);
    }

    #[tokio::test]
    async fn moderators_cannot_override() {
        let state = AppState::new();
        let caller = CallerIdentity {
            role: Role::Moderator,
            user_id: None,
        };
        let resp = app_as(router(), state, caller)
            .oneshot(json_request(
                "POST",
                &format!("/v1/admin/escrows/{}/release", Uuid::new_v4()),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn release_closes_pending_request() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, creator) = held_escrow(&state, payer, TransactionKind::Content, 100);
        dispute(&state, payer, escrow_id, "low_quality");

        let resp = app_as(router(), state.clone(), CallerIdentity::admin())
            .oneshot(json_request(
                "POST",
                &format!("/v1/admin/escrows/{}/release", escrow_id.as_uuid()),
                serde_json::json!({"note": "content verified"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: AdminEscrowResponse = body_json(resp).await;
        assert_eq!(body.change.escrow.status, "RELEASED");
        let closed = body.closed_request.unwrap();
        assert_eq!(closed.outcome.as_deref(), Some("CREATOR_WINS"));
        assert_eq!(state.book.lock().wallet(creator).available.value(), 65);
        assert!(state.refunds.lock().queue().is_empty());
    }

    #[tokio::test]
    async fn refund_defaults_to_full_total() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, _) = held_escrow(&state, payer, TransactionKind::Chat, 90);
        let resp = app_as(router(), state.clone(), CallerIdentity::admin())
            .oneshot(json_request(
                "POST",
                &format!("/v1/admin/escrows/{}/refund", escrow_id.as_uuid()),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: AdminEscrowResponse = body_json(resp).await;
        assert_eq!(body.change.escrow.status, "REFUNDED");
        assert!(body.closed_request.is_none());
        assert_eq!(state.book.lock().wallet(payer).available.value(), 90);
    }

    #[tokio::test]
    async fn refund_above_total_rejected() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, _) = held_escrow(&state, payer, TransactionKind::Chat, 90);
        let resp = app_as(router(), state, CallerIdentity::admin())
            .oneshot(json_request(
                "POST",
                &format!("/v1/admin/escrows/{}/refund", escrow_id.as_uuid()),
                serde_json::json!({"amount": 91}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn admin_release_ranks_the_payer() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, creator) = held_escrow(&state, payer, TransactionKind::Call, 200);
        let resp = app_as(router(), state.clone(), CallerIdentity::admin())
            .oneshot(json_request(
                "POST",
                &format!("/v1/admin/escrows/{}/release", escrow_id.as_uuid()),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let entry = state.rankings.lock().entry(&creator, &payer).cloned().unwrap();
        assert_eq!(entry.total_spent.value(), 200);
        let missions = state.missions.lock();
        let progress = missions.progress(&creator).unwrap();
        assert_eq!(progress.missions["daily_call"].progress, 1);
        assert_eq!(progress.missions["weekly_earnings"].progress, 130);
    }

    #[tokio::test]
    async fn full_admin_refund_ranks_nobody() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, creator) = held_escrow(&state, payer, TransactionKind::Chat, 90);
        let resp = app_as(router(), state.clone(), CallerIdentity::admin())
            .oneshot(json_request(
                "POST",
                &format!("/v1/admin/escrows/{}/refund", escrow_id.as_uuid()),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.rankings.lock().entry(&creator, &payer).is_none());
        assert!(state.missions.lock().progress(&creator).is_none());
    }
}
