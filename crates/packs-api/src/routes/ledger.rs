//! # Ledger API Routes
//!
//! Read-only view of the hash-chained journal. Verification walks every
//! entry, checks sequence numbering, posting balance and hash links, and
//! compares the maintained balance aggregate against a full replay.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use packs_ledger::LedgerEntry;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::routes::clamp_limit;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// One leg of a journal entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostingResponse {
    /// Account name, e.g. `user:{id}:available` or `platform`.
    pub account: String,
    /// Signed change in tokens.
    pub delta: i64,
}

/// A journal entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntryResponse {
    pub sequence: u64,
    pub kind: String,
    pub escrow_id: Option<String>,
    pub memo: String,
    pub postings: Vec<PostingResponse>,
    pub recorded_at: String,
    pub prev_hash: String,
    pub hash: String,
}

/// Result of a hash-chain verification.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChainVerificationResponse {
    /// Whether the chain and the balance aggregate are intact.
    pub valid: bool,
    /// Number of entries checked.
    pub entries: usize,
    /// Digest of the newest entry.
    pub head_hash: String,
    /// Whether replaying the journal reproduces the maintained balances.
    pub balances_consistent: bool,
    /// The first problem found, if any.
    pub error: Option<String>,
}

/// Journal listing filters.
#[derive(Debug, Deserialize, IntoParams)]
pub struct EntryQuery {
    /// Only entries for this escrow.
    pub escrow_id: Option<Uuid>,
    /// Maximum entries returned, newest first (default 100, max 1000).
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the ledger router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/ledger/verify", get(verify_chain))
        .route("/v1/ledger/entries", get(list_entries))
}

pub(crate) fn entry_to_response(entry: &LedgerEntry) -> LedgerEntryResponse {
    LedgerEntryResponse {
        sequence: entry.sequence,
        kind: entry.kind.as_str().to_string(),
        escrow_id: entry.escrow_id.map(|id| id.to_string()),
        memo: entry.memo.clone(),
        postings: entry
            .postings
            .iter()
            .map(|p| PostingResponse {
                account: p.account.to_string(),
                delta: p.delta,
            })
            .collect(),
        recorded_at: entry.recorded_at.to_rfc3339(),
        prev_hash: entry.prev_hash.to_string(),
        hash: entry.hash.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /v1/ledger/verify — Verify the journal's hash chain.
#[utoipa::path(
    get,
    path = "/v1/ledger/verify",
    responses(
        (status = 200, description = "Verification result", body = ChainVerificationResponse),
        (status = 403, description = "Admin role required"),
    ),
    tag = "ledger"
)]
async fn verify_chain(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ChainVerificationResponse>, AppError> {
    require_role(&caller, Role::Admin)?;

    let book = state.book.lock();
    let ledger = book.ledger();
    let chain = book.verify_chain();
    let balances_consistent = ledger.balances_consistent();
    let error = match (&chain, balances_consistent) {
        (Err(e), _) => Some(e.to_string()),
        (Ok(()), false) => Some("maintained balances differ from journal replay".to_string()),
        (Ok(()), true) => None,
    };
    if let Some(reason) = &error {
        tracing::error!(entries = ledger.len(), reason = %reason, "ledger verification failed");
    }

    Ok(Json(ChainVerificationResponse {
        valid: error.is_none(),
        entries: ledger.len(),
        head_hash: ledger.head_hash().to_string(),
        balances_consistent,
        error,
    }))
}

/// GET /v1/ledger/entries — List journal entries, newest first.
#[utoipa::path(
    get,
    path = "/v1/ledger/entries",
    params(EntryQuery),
    responses(
        (status = 200, description = "Journal entries", body = Vec<LedgerEntryResponse>),
        (status = 403, description = "Admin role required"),
    ),
    tag = "ledger"
)]
async fn list_entries(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<EntryQuery>,
) -> Result<Json<Vec<LedgerEntryResponse>>, AppError> {
    require_role(&caller, Role::Admin)?;
    let limit = clamp_limit(query.limit, 100, 1000);

    let book = state.book.lock();
    let entries = book
        .ledger()
        .entries()
        .iter()
        .rev()
        .filter(|e| query.escrow_id.map_or(true, |id| e.escrow_id == Some(id)))
        .take(limit)
        .map(entry_to_response)
        .collect();
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{app_as, body_json, get_request};
    use axum::http::StatusCode;
    use chrono::Utc;
    use packs_core::{TokenAmount, UserId};
    use tower::ServiceExt;

    #[tokio::test]
    async fn verify_reports_intact_chain() {
        let state = AppState::new();
        {
            let mut book = state.book.lock();
            book.credit(UserId::new(), TokenAmount::new(500), "purchase", Utc::now())
                .unwrap();
            book.credit(UserId::new(), TokenAmount::new(70), "purchase", Utc::now())
                .unwrap();
        }
        let app = app_as(router(), state, CallerIdentity::admin());
        let resp = app.oneshot(get_request("/v1/ledger/verify")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: ChainVerificationResponse = body_json(resp).await;
        assert!(body.valid);
        assert!(body.balances_consistent);
        assert_eq!(body.entries, 2);
        assert!(body.error.is_none());
    }

    #[tokio::test]
    async fn verify_requires_admin() {
        let app = app_as(router(), AppState::new(), CallerIdentity::user(UserId::new()));
        let resp = app.oneshot(get_request("/v1/ledger/verify")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn entries_listed_newest_first() {
        let state = AppState::new();
        {
            let mut book = state.book.lock();
            for amount in [10, 20, 30] {
                book.credit(UserId::new(), TokenAmount::new(amount), "purchase", Utc::now())
                    .unwrap();
            }
        }
        let app = app_as(router(), state, CallerIdentity::admin());
        let resp = app
            .oneshot(get_request("/v1/ledger/entries?limit=2"))
            .await
            .unwrap();
        let entries: Vec<LedgerEntryResponse> = body_json(resp).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence, 3);
        assert_eq!(entries[0].kind, "CREDIT");
        assert_eq!(entries[0].postings.len(), 2);
        assert_eq!(entries[0].prev_hash, entries[1].hash);
    }
}
