//! # Wallet API Routes
//!
//! Wallet balances are views over the journal: `available` and
//! `in_escrow` are the maintained balances of the user's two ledger
//! accounts. Top-ups post a balanced entry against the external account.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use packs_core::{TokenAmount, UserId};
use packs_ledger::WalletBalance;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, require_self_or, CallerIdentity, Role};
use crate::db::WriteSet;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_positive, Validate};
use crate::routes::ledger::{entry_to_response, LedgerEntryResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to top up a wallet.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreditRequest {
    /// Tokens to add.
    pub amount: u64,
    /// Purchase reference or note.
    #[serde(default)]
    pub memo: Option<String>,
}

impl Validate for CreditRequest {
    fn validate(&self) -> Result<(), String> {
        require_positive("amount", self.amount)?;
        if self.memo.as_ref().is_some_and(|m| m.chars().count() > 200) {
            return Err("memo must be at most 200 characters".to_string());
        }
        Ok(())
    }
}

/// A user's balances.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    pub user_id: String,
    /// Spendable tokens.
    pub available: u64,
    /// Tokens committed to open escrows.
    pub in_escrow: u64,
}

/// Result of a top-up.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreditResponse {
    pub wallet: WalletResponse,
    pub entry: LedgerEntryResponse,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the wallet router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/wallets/:user", get(get_wallet))
        .route("/v1/wallets/:user/credit", post(credit_wallet))
}

pub(crate) fn wallet_to_response(w: &WalletBalance) -> WalletResponse {
    WalletResponse {
        user_id: w.user.to_string(),
        available: w.available.value(),
        in_escrow: w.in_escrow.value(),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/wallets/:user/credit — Top up a wallet.
#[utoipa::path(
    post,
    path = "/v1/wallets/{user}/credit",
    params(("user" = Uuid, Path, description = "User UUID")),
    request_body = CreditRequest,
    responses(
        (status = 201, description = "Wallet credited", body = CreditResponse),
        (status = 403, description = "Admin role required"),
        (status = 422, description = "Validation error"),
    ),
    tag = "wallets"
)]
async fn credit_wallet(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(user): Path<Uuid>,
    body: Result<Json<CreditRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreditResponse>), AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    let user = UserId::from_uuid(user);
    let memo = req.memo.unwrap_or_else(|| "wallet top-up".to_string());

    let response = state
        .transact(|_, book| {
            let entry = book.credit(user, TokenAmount::new(req.amount), &memo, Utc::now())?;
            let response = CreditResponse {
                wallet: wallet_to_response(&book.wallet(user)),
                entry: entry_to_response(&entry),
            };
            let writes = WriteSet {
                entries: vec![entry],
                ..WriteSet::default()
            };
            Ok((response, writes))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /v1/wallets/:user — Read a wallet's balances.
#[utoipa::path(
    get,
    path = "/v1/wallets/{user}",
    params(("user" = Uuid, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Wallet balances", body = WalletResponse),
        (status = 403, description = "Not the owner or a moderator"),
    ),
    tag = "wallets"
)]
async fn get_wallet(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(user): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let user = UserId::from_uuid(user);
    require_self_or(&caller, &user, Role::Moderator)?;
    let wallet = state.book.lock().wallet(user);
    Ok(Json(wallet_to_response(&wallet)))
}
