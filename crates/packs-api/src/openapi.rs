//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI 3.1 spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer token security scheme to the spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "`{role}:{user_id}:{secret}` or the bare shared secret (admin). \
                             The secret is set via AUTH_TOKEN.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Packs API",
        version = "0.3.0",
        description = "Token-economy services for creator/supporter interactions.\n\nProvides:\n- **Wallets and escrows** over a hash-chained double-entry journal\n- **Tiered refunds**: automatic decisions, moderator review, and admin resolution\n- **Fraud screening** of refund requests with an append-only audit log\n- **Safety scores** and an **abuse firewall** with escalating sanctions\n- **Supporter leaderboards**, **creator missions**, and **dynamic pricing**\n- **Scheduled jobs**: escrow auto-release, safety decay, refund escalation, mission resets\n\nAll `/v1/*` endpoints require `Authorization: Bearer <token>`. Health checks and `/metrics` are unauthenticated.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Wallets ─────────────────────────────────────────────────────
        crate::routes::wallets::credit_wallet,
        crate::routes::wallets::get_wallet,
        // ── Ledger ──────────────────────────────────────────────────────
        crate::routes::ledger::verify_chain,
        crate::routes::ledger::list_entries,
        // ── Escrows ─────────────────────────────────────────────────────
        crate::routes::escrows::open_escrow,
        crate::routes::escrows::list_escrows,
        crate::routes::escrows::get_escrow,
        crate::routes::escrows::release_escrow,
        // ── Refunds ─────────────────────────────────────────────────────
        crate::routes::refunds::submit_refund,
        crate::routes::refunds::list_refunds,
        crate::routes::refunds::review_queue,
        crate::routes::refunds::get_refund,
        crate::routes::refunds::review_refund,
        // ── Admin ───────────────────────────────────────────────────────
        crate::routes::admin::resolve_refund,
        crate::routes::admin::release_escrow,
        crate::routes::admin::refund_escrow,
        // ── Fraud ───────────────────────────────────────────────────────
        crate::routes::fraud::list_records,
        // ── Safety ──────────────────────────────────────────────────────
        crate::routes::safety::record_event,
        crate::routes::safety::get_score,
        // ── Abuse ───────────────────────────────────────────────────────
        crate::routes::abuse::screen_message,
        crate::routes::abuse::get_offender,
        // ── Supporters ──────────────────────────────────────────────────
        crate::routes::supporters::record_spend,
        crate::routes::supporters::leaderboard,
        // ── Missions ────────────────────────────────────────────────────
        crate::routes::missions::get_missions,
        crate::routes::missions::record_activity,
        // ── Pricing ─────────────────────────────────────────────────────
        crate::routes::pricing::price_quote,
        // ── Jobs ────────────────────────────────────────────────────────
        crate::routes::jobs::list_jobs,
        crate::routes::jobs::update_schedule,
        crate::routes::jobs::trigger_job,
    ),
    components(
        schemas(
            crate::auth::Role,
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::wallets::CreditRequest,
            crate::routes::wallets::WalletResponse,
            crate::routes::wallets::CreditResponse,
            crate::routes::ledger::PostingResponse,
            crate::routes::ledger::LedgerEntryResponse,
            crate::routes::ledger::ChainVerificationResponse,
            crate::routes::escrows::OpenEscrowRequest,
            crate::routes::escrows::SettlementResponse,
            crate::routes::escrows::TransitionResponse,
            crate::routes::escrows::EscrowResponse,
            crate::routes::escrows::EscrowChangeResponse,
            crate::routes::refunds::SubmitRefundRequest,
            crate::routes::refunds::ResolveRefundRequest,
            crate::routes::refunds::RefundResponse,
            crate::routes::refunds::SubmitRefundResponse,
            crate::routes::refunds::ResolveRefundResponse,
            crate::routes::admin::AdminReleaseRequest,
            crate::routes::admin::AdminRefundRequest,
            crate::routes::admin::AdminEscrowResponse,
            crate::routes::fraud::FraudRecordResponse,
            crate::routes::safety::SafetyEventRequest,
            crate::routes::safety::SafetyScoreResponse,
            crate::routes::abuse::ScreenRequest,
            crate::routes::abuse::ScreenResponse,
            crate::routes::abuse::OffenderResponse,
            crate::routes::supporters::SpendRequest,
            crate::routes::supporters::RankChangeResponse,
            crate::routes::supporters::SupporterResponse,
            crate::routes::missions::ActivityRequest,
            crate::routes::missions::ActivityResponse,
            crate::routes::missions::CreatorMissionsResponse,
            crate::routes::missions::MissionStatusResponse,
            crate::routes::pricing::QuoteRequestBody,
            crate::routes::pricing::QuoteResponse,
            crate::routes::jobs::ScheduleResponse,
            crate::routes::jobs::ScheduleUpdateRequest,
            crate::routes::jobs::JobRunResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "wallets", description = "Wallet top-ups and balances"),
        (name = "ledger", description = "Journal integrity and history"),
        (name = "escrows", description = "Escrow lifecycle"),
        (name = "refunds", description = "Tiered refund requests and the review queue"),
        (name = "admin", description = "Administrator overrides"),
        (name = "fraud", description = "Fraud detection audit log"),
        (name = "safety", description = "Safety events and scores"),
        (name = "abuse", description = "Message screening and sanctions"),
        (name = "supporters", description = "Supporter spend and leaderboards"),
        (name = "missions", description = "Creator missions and XP"),
        (name = "pricing", description = "Dynamic price quotes"),
        (name = "jobs", description = "Scheduled job control"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
