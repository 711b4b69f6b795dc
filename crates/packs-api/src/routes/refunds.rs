//! # Refund API Routes
//!
//! Payers submit refund requests against HELD escrows. The reason code
//! routes each request to a tier:
//!
//! - **Tier 1** (automatic): decided immediately from delivery evidence.
//! - **Tier 2** (assisted review): the escrow is frozen as DISPUTED and the
//!   request waits in the moderator queue. Requests left unreviewed for
//!   the escalation window move to tier 3.
//! - **Tier 3** (human): awaits an administrator.
//!
//! Every submission is screened by the fraud engine. Account age is taken
//! from the requester's first wallet credit, never from the request. A
//! blocking finding rejects the request, and any finding is appended to
//! the fraud log and applied to the requester's safety score once the
//! submission is persisted.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use packs_core::UserId;
use packs_ledger::EscrowId;
use packs_refund::{
    DeliveryEvidence, RefundOutcome, RefundRequest, RefundRequestId, RefundSubmission,
    ResolveOutcome, Resolver,
};
use packs_rules::SafetyEventKind;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{acting_user, require_role, CallerIdentity, Role};
use crate::db::WriteSet;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::routes::escrows::{escrow_to_response, EscrowResponse};
use crate::routes::fraud::{fraud_to_response, FraudRecordResponse};
use crate::routes::ledger::{entry_to_response, LedgerEntryResponse};
use crate::routes::{clamp_limit, parse_code, staff_actor};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request for a refund on one escrow.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRefundRequest {
    pub escrow_id: Uuid,
    /// Requester. Defaults to the caller; staff may submit on a payer's behalf.
    pub requester_id: Option<Uuid>,
    /// Reason code, e.g. `message_not_delivered` or `inappropriate_content`.
    pub reason_code: String,
    /// Free-text explanation.
    #[serde(default)]
    pub description: String,
    /// Delivery facts, required for tier-1 reasons. Tagged by `kind`:
    /// `{"kind":"chat","delivered":false}`, `{"kind":"call","connected_seconds":30}`,
    /// `{"kind":"event","status":"cancelled"}`, `{"kind":"content","unlocked":false}`.
    #[schema(value_type = Option<Object>)]
    pub evidence: Option<serde_json::Value>,
}

impl Validate for SubmitRefundRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("reason_code", &self.reason_code)
    }
}

/// Moderator or admin decision on a request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRefundRequest {
    /// `FULL_REFUND`, `PARTIAL_REFUND` or `CREATOR_WINS`.
    pub outcome: String,
    /// Note recorded on the request.
    pub note: Option<String>,
}

impl Validate for ResolveRefundRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("outcome", &self.outcome)?;
        if self.note.as_ref().is_some_and(|n| n.chars().count() > 2000) {
            return Err("note must be at most 2000 characters".to_string());
        }
        Ok(())
    }
}

/// Refund request state in API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefundResponse {
    pub request_id: String,
    pub escrow_id: String,
    pub requester_id: String,
    pub recipient_id: String,
    pub escrow_total: u64,
    pub reason_code: String,
    pub description: String,
    /// 1 (automatic), 2 (assisted review) or 3 (human).
    pub tier: u8,
    pub status: String,
    pub outcome: Option<String>,
    pub refund_amount: Option<u64>,
    /// `auto`, `fraud_engine`, `moderator` or `admin`.
    pub resolver: Option<String>,
    pub resolver_id: Option<String>,
    pub resolution_note: Option<String>,
    pub fraud_record_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub escalated_at: Option<String>,
}

/// Result of a submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitRefundResponse {
    pub request: RefundResponse,
    /// The escrow after routing (REFUNDED/RELEASED for tier 1, DISPUTED otherwise).
    pub escrow: EscrowResponse,
    /// Settlement entry, present when tier 1 decided the request.
    pub entry: Option<LedgerEntryResponse>,
    /// Fraud finding, if the screening flagged the requester.
    pub fraud: Option<FraudRecordResponse>,
}

/// Result of a moderator or admin decision.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResolveRefundResponse {
    pub request: RefundResponse,
    pub escrow: EscrowResponse,
    pub entry: LedgerEntryResponse,
}

/// Refund listing filters.
#[derive(Debug, Deserialize, IntoParams)]
pub struct RefundQuery {
    /// Only requests by this user. Users always see their own.
    pub requester_id: Option<Uuid>,
    /// Maximum results, newest first (default 100, max 1000).
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the refund router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/refunds", post(submit_refund).get(list_refunds))
        .route("/v1/refunds/queue", get(review_queue))
        .route("/v1/refunds/:id", get(get_refund))
        .route("/v1/refunds/:id/review", post(review_refund))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn refund_to_response(r: &RefundRequest) -> RefundResponse {
    let (resolver, resolver_id) = match r.resolver {
        Some(Resolver::Auto) => (Some("auto"), None),
        Some(Resolver::FraudEngine) => (Some("fraud_engine"), None),
        Some(Resolver::Moderator(u)) => (Some("moderator"), Some(u.to_string())),
        Some(Resolver::Admin(u)) => (Some("admin"), Some(u.to_string())),
        None => (None, None),
    };
    RefundResponse {
        request_id: r.id.as_uuid().to_string(),
        escrow_id: r.escrow_id.as_uuid().to_string(),
        requester_id: r.requester.to_string(),
        recipient_id: r.recipient.to_string(),
        escrow_total: r.escrow_total.value(),
        reason_code: r.reason_code.clone(),
        description: r.description.clone(),
        tier: r.tier.number(),
        status: r.status.as_str().to_string(),
        outcome: r.outcome.map(|o| o.as_str().to_string()),
        refund_amount: r.refund_amount.map(|a| a.value()),
        resolver: resolver.map(str::to_string),
        resolver_id,
        resolution_note: r.resolution_note.clone(),
        fraud_record_id: r.fraud_record_id.map(|id| id.to_string()),
        created_at: r.created_at.to_rfc3339(),
        updated_at: r.updated_at.to_rfc3339(),
        escalated_at: r.escalated_at.map(|t| t.to_rfc3339()),
    }
}

pub(crate) fn parse_outcome(raw: &str) -> Result<RefundOutcome, AppError> {
    parse_code("outcome", &raw.trim().to_ascii_uppercase())
}

pub(crate) fn resolve_to_response(resolved: &ResolveOutcome) -> ResolveRefundResponse {
    ResolveRefundResponse {
        request: refund_to_response(&resolved.request),
        escrow: escrow_to_response(&resolved.change.escrow),
        entry: entry_to_response(&resolved.change.entry),
    }
}

pub(crate) fn resolve_writes(resolved: &ResolveOutcome) -> WriteSet {
    WriteSet {
        escrows: vec![resolved.change.escrow.clone()],
        entries: vec![resolved.change.entry.clone()],
        refunds: vec![resolved.request.clone()],
        fraud: Vec::new(),
    }
}

fn parse_evidence(raw: Option<serde_json::Value>) -> Result<Option<DeliveryEvidence>, AppError> {
    raw.map(|v| {
        serde_json::from_value(v)
            .map_err(|e| AppError::Validation(format!("invalid evidence: {e}")))
    })
    .transpose()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/refunds — Submit a refund request.
#[utoipa::path(
    post,
    path = "/v1/refunds",
    request_body = SubmitRefundRequest,
    responses(
        (status = 201, description = "Request routed (or rejected by fraud screening)", body = SubmitRefundResponse),
        (status = 403, description = "Only the payer may request a refund"),
        (status = 404, description = "Escrow not found"),
        (status = 409, description = "Escrow not HELD, window closed, or request pending"),
        (status = 422, description = "Disallowed reason or missing evidence"),
    ),
    tag = "refunds"
)]
async fn submit_refund(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SubmitRefundRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitRefundResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let requester = acting_user(&caller, req.requester_id.map(UserId::from_uuid))?;
    let evidence = parse_evidence(req.evidence)?;
    let now = Utc::now();

    let submission = RefundSubmission {
        escrow_id: EscrowId::from_uuid(req.escrow_id),
        requester,
        reason_code: req.reason_code,
        description: req.description,
        evidence,
    };
    let fraud_engine = &state.fraud_engine;
    let outcome = state
        .transact(|desk, book| {
            let outcome = desk.submit(submission, book, fraud_engine, now)?;
            let writes = WriteSet {
                escrows: vec![outcome.escrow.clone()],
                entries: outcome.entry.iter().cloned().collect(),
                refunds: vec![outcome.request.clone()],
                fraud: outcome.fraud_record.iter().cloned().collect(),
            };
            Ok((outcome, writes))
        })
        .await?;

    if let Some(record) = &outcome.fraud_record {
        state.record_fraud(std::slice::from_ref(record));
        state.apply_safety_event(requester, SafetyEventKind::FraudFlagged, now);
    }
    if outcome.entry.is_some() {
        state.record_settlement(&outcome.escrow, now);
    }

    let response = SubmitRefundResponse {
        request: refund_to_response(&outcome.request),
        escrow: escrow_to_response(&outcome.escrow),
        entry: outcome.entry.as_ref().map(entry_to_response),
        fraud: outcome.fraud_record.as_ref().map(fraud_to_response),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /v1/refunds — List refund requests.
#[utoipa::path(
    get,
    path = "/v1/refunds",
    params(RefundQuery),
    responses(
        (status = 200, description = "Refund requests, newest first", body = Vec<RefundResponse>),
        (status = 403, description = "Users may only list their own requests"),
    ),
    tag = "refunds"
)]
async fn list_refunds(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<RefundQuery>,
) -> Result<Json<Vec<RefundResponse>>, AppError> {
    let requester = if caller.has_role(Role::Moderator) {
        query.requester_id.map(UserId::from_uuid)
    } else {
        Some(acting_user(&caller, query.requester_id.map(UserId::from_uuid))?)
    };
    let limit = clamp_limit(query.limit, 100, 1000);

    let mut requests = state.refunds.lock().list();
    requests.retain(|r| requester.map_or(true, |u| r.requester == u));
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(
        requests.iter().take(limit).map(refund_to_response).collect(),
    ))
}

/// GET /v1/refunds/queue — Open tier-2 and tier-3 requests, oldest first.
#[utoipa::path(
    get,
    path = "/v1/refunds/queue",
    responses(
        (status = 200, description = "Review queue", body = Vec<RefundResponse>),
        (status = 403, description = "Moderator role required"),
    ),
    tag = "refunds"
)]
async fn review_queue(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<RefundResponse>>, AppError> {
    require_role(&caller, Role::Moderator)?;
    let queue = state.refunds.lock().queue();
    Ok(Json(queue.iter().map(refund_to_response).collect()))
}

/// GET /v1/refunds/:id — Read a refund request.
#[utoipa::path(
    get,
    path = "/v1/refunds/{id}",
    params(("id" = Uuid, Path, description = "Refund request UUID")),
    responses(
        (status = 200, description = "Refund request", body = RefundResponse),
        (status = 403, description = "Not the requester or a moderator"),
        (status = 404, description = "Request not found"),
    ),
    tag = "refunds"
)]
async fn get_refund(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<RefundResponse>, AppError> {
    let id = RefundRequestId::from_uuid(id);
    let request = state
        .refunds
        .lock()
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("refund request {id} not found")))?;
    if caller.user_id != Some(request.requester) {
        require_role(&caller, Role::Moderator)?;
    }
    Ok(Json(refund_to_response(&request)))
}

/// POST /v1/refunds/:id/review — Moderator decides a tier-2 request.
#[utoipa::path(
    post,
    path = "/v1/refunds/{id}/review",
    params(("id" = Uuid, Path, description = "Refund request UUID")),
    request_body = ResolveRefundRequest,
    responses(
        (status = 200, description = "Request resolved", body = ResolveRefundResponse),
        (status = 403, description = "Moderator role required"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not queued for review"),
    ),
    tag = "refunds"
)]
async fn review_refund(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ResolveRefundRequest>, JsonRejection>,
) -> Result<Json<ResolveRefundResponse>, AppError> {
    require_role(&caller, Role::Moderator)?;
    let req = extract_validated_json(body)?;
    let outcome = parse_outcome(&req.outcome)?;
    let reviewer = staff_actor(&caller);
    let now = Utc::now();

    let resolved = state
        .transact(|desk, book| {
            let resolved = desk.review(
                &RefundRequestId::from_uuid(id),
                outcome,
                reviewer,
                req.note,
                book,
                now,
            )?;
            let writes = resolve_writes(&resolved);
            Ok((resolved, writes))
        })
        .await?;

    state.record_settlement(&resolved.change.escrow, now);
    Ok(Json(resolve_to_response(&resolved)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorBody;
    use crate::routes::test_support::{app_as, body_json, get_request, json_request};
    use packs_core::TokenAmount;
    use packs_ledger::{OpenEscrow, SplitRatio, TransactionKind};
    use tower::ServiceExt;

    /// Fund `payer` and open a HELD escrow of `total` to a fresh creator.
    pub(crate) fn held_escrow(
        state: &AppState,
        payer: UserId,
        kind: TransactionKind,
        total: u64,
    ) -> (EscrowId, UserId) {
        let creator = UserId::new();
        let mut book = state.book.lock();
        let now = Utc::now();
        let established = now - chrono::Duration::days(400);
        book.credit(payer, TokenAmount::new(total), "purchase", established)
            .unwrap();
        let change = book
            .open_escrow(
                OpenEscrow {
                    payer,
                    recipient: creator,
                    kind,
                    reference: "ref-1".to_string(),
                    total: TokenAmount::new(total),
                    split: SplitRatio::STANDARD,
                },
                now,
            )
            .unwrap();
        (change.escrow.id, creator)
    }

    fn moderator() -> CallerIdentity {
        CallerIdentity {
            role: Role::Moderator,
            user_id: Some(UserId::new()),
        }
    }

    async fn submit(
        state: &AppState,
        payer: UserId,
        body: serde_json::Value,
    ) -> axum::response::Response {
        app_as(router(), state.clone(), CallerIdentity::user(payer))
            .oneshot(json_request("POST", "/v1/refunds", body))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn tier_one_undelivered_chat_refunds_in_full() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, _) = held_escrow(&state, payer, TransactionKind::Chat, 200);

        let resp = submit(
            &state,
            payer,
            serde_json::json!({
                "escrow_id": escrow_id.as_uuid(),
                "reason_code": "message_not_delivered",
                "evidence": {"kind": "chat", "delivered": false},
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: SubmitRefundResponse = body_json(resp).await;
        assert_eq!(body.request.tier, 1);
        assert_eq!(body.request.outcome.as_deref(), Some("FULL_REFUND"));
        assert_eq!(body.request.refund_amount, Some(200));
        assert_eq!(body.request.resolver.as_deref(), Some("auto"));
        assert_eq!(body.escrow.status, "REFUNDED");
        assert!(body.entry.is_some());
        assert_eq!(state.book.lock().wallet(payer).available.value(), 200);
    }

    #[tokio::test]
    async fn disallowed_reason_rejected_before_escrow_lookup() {
        let state = AppState::new();
        let payer = UserId::new();
        let resp = submit(
            &state,
            payer,
            serde_json::json!({
                "escrow_id": Uuid::new_v4(),
                "reason_code": "changed_mind",
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let err: ErrorBody = body_json(resp).await;
        assert_eq!(err.error.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn tier_one_without_evidence_rejected() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, _) = held_escrow(&state, payer, TransactionKind::Chat, 50);
        let resp = submit(
            &state,
            payer,
            serde_json::json!({
                "escrow_id": escrow_id.as_uuid(),
                "reason_code": "message_not_delivered",
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn tier_two_queues_and_moderator_resolves() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, creator) = held_escrow(&state, payer, TransactionKind::Content, 400);

        let resp = submit(
            &state,
            payer,
            serde_json::json!({
                "escrow_id": escrow_id.as_uuid(),
                "reason_code": "inappropriate_content",
                "description": "not what was advertised",
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: SubmitRefundResponse = body_json(resp).await;
        assert_eq!(body.request.tier, 2);
        assert_eq!(body.request.status, "QUEUED_FOR_REVIEW");
        assert_eq!(body.escrow.status, "DISPUTED");
        let request_id = body.request.request_id;

        let resp = app_as(router(), state.clone(), moderator())
            .oneshot(get_request("/v1/refunds/queue"))
            .await
            .unwrap();
        let queue: Vec<RefundResponse> = body_json(resp).await;
        assert_eq!(queue.len(), 1);

        let resp = app_as(router(), state.clone(), moderator())
            .oneshot(json_request(
                "POST",
                &format!("/v1/refunds/{request_id}/review"),
                serde_json::json!({"outcome": "partial_refund", "note": "half delivered"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resolved: ResolveRefundResponse = body_json(resp).await;
        assert_eq!(resolved.request.status, "RESOLVED");
        assert_eq!(resolved.request.refund_amount, Some(200));
        assert_eq!(resolved.request.resolver.as_deref(), Some("moderator"));
        assert_eq!(resolved.escrow.status, "REFUNDED");

        let book = state.book.lock();
        assert_eq!(book.wallet(payer).available.value(), 200);
        assert_eq!(book.wallet(creator).available.value(), 130);
        assert_eq!(book.platform_balance().value(), 70);
    }

    #[tokio::test]
    async fn users_cannot_review() {
        let state = AppState::new();
        let payer = UserId::new();
        let resp = app_as(router(), state, CallerIdentity::user(payer))
            .oneshot(json_request(
                "POST",
                &format!("/v1/refunds/{}/review", Uuid::new_v4()),
                serde_json::json!({"outcome": "FULL_REFUND"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn only_payer_may_submit() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, creator) = held_escrow(&state, payer, TransactionKind::Chat, 50);
        let resp = submit(
            &state,
            creator,
            serde_json::json!({
                "escrow_id": escrow_id.as_uuid(),
                "reason_code": "message_not_delivered",
                "evidence": {"kind": "chat", "delivered": false},
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn requester_reads_own_request() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, _) = held_escrow(&state, payer, TransactionKind::Event, 80);
        let resp = submit(
            &state,
            payer,
            serde_json::json!({
                "escrow_id": escrow_id.as_uuid(),
                "reason_code": "harassment",
            }),
        )
        .await;
        let body: SubmitRefundResponse = body_json(resp).await;
        let uri = format!("/v1/refunds/{}", body.request.request_id);

        let resp = app_as(router(), state.clone(), CallerIdentity::user(payer))
            .oneshot(get_request(&uri))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = app_as(router(), state, CallerIdentity::user(UserId::new()))
            .oneshot(get_request(&uri))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn backdated_account_date_is_ignored() {
        let state = AppState::new();
        let payer = UserId::new();
        let creator = UserId::new();
        let now = Utc::now();
        let escrow_id = {
            let mut book = state.book.lock();
            book.credit(payer, TokenAmount::new(100), "purchase", now)
                .unwrap();
            book.open_escrow(
                OpenEscrow {
                    payer,
                    recipient: creator,
                    kind: TransactionKind::Chat,
                    reference: "msg-fresh".to_string(),
                    total: TokenAmount::new(100),
                    split: SplitRatio::STANDARD,
                },
                now,
            )
            .unwrap()
            .escrow
            .id
        };

        let resp = submit(
            &state,
            payer,
            serde_json::json!({
                "escrow_id": escrow_id.as_uuid(),
                "reason_code": "other",
                "account_created_at": "2019-01-01T00:00:00Z",
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: SubmitRefundResponse = body_json(resp).await;
        assert_eq!(body.request.status, "REJECTED");
        let fraud = body.fraud.unwrap();
        assert_eq!(fraud.pattern, "NEW_ACCOUNT_ABUSE");
        assert_eq!(fraud.penalty, "ACCOUNT_REVIEW");
        assert_eq!(state.fraud_records.read().len(), 1);
        assert_eq!(body.escrow.status, "HELD");
    }

    #[tokio::test]
    async fn failed_write_discards_submission() {
        let state = crate::routes::test_support::unreachable_db_state();
        let payer = UserId::new();
        let (escrow_id, _) = held_escrow(&state, payer, TransactionKind::Content, 400);
        let ledger_len = state.book.lock().ledger().len();

        let resp = submit(
            &state,
            payer,
            serde_json::json!({
                "escrow_id": escrow_id.as_uuid(),
                "reason_code": "inappropriate_content",
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert!(state.refunds.lock().list().is_empty());
        let book = state.book.lock();
        assert_eq!(book.require(&escrow_id).unwrap().status.as_str(), "HELD");
        assert_eq!(book.ledger().len(), ledger_len);
        assert!(state.fraud_records.read().is_empty());
    }

    #[tokio::test]
    async fn release_by_review_ranks_the_supporter() {
        let state = AppState::new();
        let payer = UserId::new();
        let (escrow_id, creator) = held_escrow(&state, payer, TransactionKind::Content, 400);
        let resp = submit(
            &state,
            payer,
            serde_json::json!({
                "escrow_id": escrow_id.as_uuid(),
                "reason_code": "low_quality",
            }),
        )
        .await;
        let body: SubmitRefundResponse = body_json(resp).await;

        let resp = app_as(router(), state.clone(), moderator())
            .oneshot(json_request(
                "POST",
                &format!("/v1/refunds/{}/review", body.request.request_id),
                serde_json::json!({"outcome": "creator_wins"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let rankings = state.rankings.lock();
        let entry = rankings.entry(&creator, &payer).unwrap();
        assert_eq!(entry.total_spent.value(), 400);
        assert_eq!(entry.rank, 1);
        let missions = state.missions.lock();
        assert_eq!(
            missions.progress(&creator).unwrap().missions["weekly_earnings"].progress,
            260
        );
    }
}
