//! # Escrow API Routes
//!
//! Payers open escrows against their available balance and confirm
//! delivery by releasing them. Parties and moderators can read an escrow;
//! moderators can list across users.
//!
//! ## Lifecycle
//!
//! ```text
//! HELD ──release──▶ RELEASED
//!  │ └──refund───▶ REFUNDED
//!  └──dispute──▶ DISPUTED ──release/refund──▶ RELEASED / REFUNDED
//! ```
//!
//! Disputes and refunds are driven by the refund routes; admin overrides
//! live in the admin routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use packs_core::{TokenAmount, UserId};
use packs_ledger::{
    EscrowChange, EscrowId, EscrowRecord, EscrowStatus, OpenEscrow, ReleaseTrigger, SplitRatio,
    TransactionKind,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{acting_user, require_role, CallerIdentity, Role};
use crate::db::WriteSet;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, require_positive, Validate};
use crate::routes::ledger::{entry_to_response, LedgerEntryResponse};
use crate::routes::clamp_limit;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to open an escrow.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenEscrowRequest {
    /// Payer. Defaults to the caller; staff may open on a user's behalf.
    pub payer_id: Option<Uuid>,
    /// Creator receiving the recipient share.
    pub recipient_id: Uuid,
    /// `chat`, `call`, `event` or `content`.
    pub kind: String,
    /// Message, call, event or content identifier.
    pub reference: String,
    /// Tokens to hold.
    pub total: u64,
    /// `standard` (65/35), `creator` (80/20) or a recipient percentage.
    #[serde(default)]
    pub split: Option<String>,
}

impl Validate for OpenEscrowRequest {
    fn validate(&self) -> Result<(), String> {
        require_positive("total", self.total)?;
        require_non_blank("reference", &self.reference)?;
        require_non_blank("kind", &self.kind)?;
        if self.reference.chars().count() > 200 {
            return Err("reference must be at most 200 characters".to_string());
        }
        Ok(())
    }
}

/// Final division of an escrow.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettlementResponse {
    pub payer_refund: u64,
    pub recipient_amount: u64,
    pub platform_fee: u64,
}

/// A recorded status change.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionResponse {
    pub from: String,
    pub to: String,
    pub at: String,
    pub reason: String,
}

/// Escrow state in API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EscrowResponse {
    pub escrow_id: String,
    pub payer_id: String,
    pub recipient_id: String,
    pub kind: String,
    pub reference: String,
    pub total: u64,
    pub recipient_percent: u32,
    pub recipient_share: u64,
    pub platform_share: u64,
    pub status: String,
    pub created_at: String,
    /// Refund requests are accepted until this instant.
    pub release_deadline: String,
    /// The sweep releases the escrow after this instant if still HELD.
    pub auto_release_at: String,
    pub settlement: Option<SettlementResponse>,
    pub transitions: Vec<TransitionResponse>,
    pub valid_transitions: Vec<String>,
}

/// An escrow together with the journal entry that changed it.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EscrowChangeResponse {
    pub escrow: EscrowResponse,
    pub entry: LedgerEntryResponse,
}

/// Escrow listing filters.
#[derive(Debug, Deserialize, IntoParams)]
pub struct EscrowQuery {
    /// Only escrows in this status (`HELD`, `RELEASED`, `REFUNDED`, `DISPUTED`).
    pub status: Option<String>,
    /// Only escrows where this user is a party. Users always see their own.
    pub user_id: Option<Uuid>,
    /// Maximum results (default 100, max 1000).
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the escrow router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/escrows", post(open_escrow).get(list_escrows))
        .route("/v1/escrows/:id", get(get_escrow))
        .route("/v1/escrows/:id/release", post(release_escrow))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn escrow_to_response(e: &EscrowRecord) -> EscrowResponse {
    EscrowResponse {
        escrow_id: e.id.as_uuid().to_string(),
        payer_id: e.payer.to_string(),
        recipient_id: e.recipient.to_string(),
        kind: e.kind.as_str().to_string(),
        reference: e.reference.clone(),
        total: e.total.value(),
        recipient_percent: e.split.recipient_percent(),
        recipient_share: e.recipient_share.value(),
        platform_share: e.platform_share.value(),
        status: e.status.as_str().to_string(),
        created_at: e.created_at.to_rfc3339(),
        release_deadline: e.release_deadline.to_rfc3339(),
        auto_release_at: e.auto_release_at.to_rfc3339(),
        settlement: e.settlement.map(|s| SettlementResponse {
            payer_refund: s.payer_refund.value(),
            recipient_amount: s.recipient_amount.value(),
            platform_fee: s.platform_fee.value(),
        }),
        transitions: e
            .transitions
            .iter()
            .map(|t| TransitionResponse {
                from: t.from.as_str().to_string(),
                to: t.to.as_str().to_string(),
                at: t.at.to_rfc3339(),
                reason: t.reason.clone(),
            })
            .collect(),
        valid_transitions: e
            .status
            .valid_transitions()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
    }
}

pub(crate) fn change_to_response(change: &EscrowChange) -> EscrowChangeResponse {
    EscrowChangeResponse {
        escrow: escrow_to_response(&change.escrow),
        entry: entry_to_response(&change.entry),
    }
}

pub(crate) fn change_writes(change: EscrowChange) -> WriteSet {
    WriteSet {
        escrows: vec![change.escrow],
        entries: vec![change.entry],
        ..WriteSet::default()
    }
}

fn parse_status(raw: &str) -> Result<EscrowStatus, AppError> {
    EscrowStatus::ALL
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| AppError::Validation(format!("unknown escrow status: '{raw}'")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/escrows — Hold tokens from the payer for a transaction.
#[utoipa::path(
    post,
    path = "/v1/escrows",
    request_body = OpenEscrowRequest,
    responses(
        (status = 201, description = "Escrow opened", body = EscrowChangeResponse),
        (status = 403, description = "Users may only open escrows as payer"),
        (status = 409, description = "Insufficient funds"),
        (status = 422, description = "Validation error"),
    ),
    tag = "escrows"
)]
async fn open_escrow(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<OpenEscrowRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EscrowChangeResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let payer = acting_user(&caller, req.payer_id.map(UserId::from_uuid))?;
    let kind: TransactionKind = req.kind.parse()?;
    let split: SplitRatio = match req.split.as_deref() {
        Some(raw) => raw.parse()?,
        None => SplitRatio::STANDARD,
    };

    let open = OpenEscrow {
        payer,
        recipient: UserId::from_uuid(req.recipient_id),
        kind,
        reference: req.reference.trim().to_string(),
        total: TokenAmount::new(req.total),
        split,
    };

    let response = state
        .transact(|_, book| {
            let change = book.open_escrow(open, Utc::now())?;
            Ok((change_to_response(&change), change_writes(change)))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /v1/escrows — List escrows.
#[utoipa::path(
    get,
    path = "/v1/escrows",
    params(EscrowQuery),
    responses(
        (status = 200, description = "Escrows, newest first", body = Vec<EscrowResponse>),
        (status = 403, description = "Users may only list their own escrows"),
    ),
    tag = "escrows"
)]
async fn list_escrows(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<EscrowQuery>,
) -> Result<Json<Vec<EscrowResponse>>, AppError> {
    let party = if caller.has_role(Role::Moderator) {
        query.user_id.map(UserId::from_uuid)
    } else {
        Some(acting_user(&caller, query.user_id.map(UserId::from_uuid))?)
    };
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let limit = clamp_limit(query.limit, 100, 1000);

    let mut escrows = state.book.lock().list();
    escrows.retain(|e| {
        party.map_or(true, |u| e.is_party(&u)) && status.map_or(true, |s| e.status == s)
    });
    escrows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(
        escrows.iter().take(limit).map(escrow_to_response).collect(),
    ))
}

/// GET /v1/escrows/:id — Read an escrow.
#[utoipa::path(
    get,
    path = "/v1/escrows/{id}",
    params(("id" = Uuid, Path, description = "Escrow UUID")),
    responses(
        (status = 200, description = "Escrow", body = EscrowResponse),
        (status = 403, description = "Not a party or moderator"),
        (status = 404, description = "Escrow not found"),
    ),
    tag = "escrows"
)]
async fn get_escrow(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<EscrowResponse>, AppError> {
    let escrow = state.book.lock().require(&EscrowId::from_uuid(id))?.clone();
    let is_party = caller.user_id.is_some_and(|u| escrow.is_party(&u));
    if !is_party {
        require_role(&caller, Role::Moderator)?;
    }
    Ok(Json(escrow_to_response(&escrow)))
}

/// POST /v1/escrows/:id/release — Payer confirms delivery.
#[utoipa::path(
    post,
    path = "/v1/escrows/{id}/release",
    params(("id" = Uuid, Path, description = "Escrow UUID")),
    responses(
        (status = 200, description = "Escrow released", body = EscrowChangeResponse),
        (status = 403, description = "Only the payer may release"),
        (status = 404, description = "Escrow not found"),
        (status = 409, description = "Escrow is not HELD"),
    ),
    tag = "escrows"
)]
async fn release_escrow(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<EscrowChangeResponse>, AppError> {
    let id = EscrowId::from_uuid(id);
    let now = Utc::now();
    let (response, escrow) = state
        .transact(|_, book| {
            let payer = book.require(&id)?.payer;
            if caller.user_id != Some(payer) {
                return Err(AppError::Forbidden(
                    "only the payer may confirm a release".into(),
                ));
            }
            let change = book.release(&id, ReleaseTrigger::Payer, now)?;
            let escrow = change.escrow.clone();
            Ok(((change_to_response(&change), escrow), change_writes(change)))
        })
        .await?;

    state.record_settlement(&escrow, now);
    Ok(Json(response))
}
