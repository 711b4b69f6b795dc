//! # packs-api — Axum API Services for the Packs Token Economy
//!
//! Wires the domain crates (ledger, refunds, rules, engagement, jobs) into
//! one HTTP service. Route handlers validate input, check the caller's
//! role, and delegate to the domain crates.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                   | Domain                      |
//! |------------------------|--------------------------|-----------------------------|
//! | `/v1/wallets/*`        | [`routes::wallets`]      | Top-ups and balances        |
//! | `/v1/ledger/*`         | [`routes::ledger`]       | Journal verification        |
//! | `/v1/escrows/*`        | [`routes::escrows`]      | Escrow lifecycle            |
//! | `/v1/refunds/*`        | [`routes::refunds`]      | Tiered refunds, review queue|
//! | `/v1/admin/*`          | [`routes::admin`]        | Admin overrides             |
//! | `/v1/fraud/*`          | [`routes::fraud`]        | Fraud audit log             |
//! | `/v1/safety/*`         | [`routes::safety`]       | Safety scores               |
//! | `/v1/abuse/*`          | [`routes::abuse`]        | Abuse firewall              |
//! | `/v1/supporters/*`, `/v1/creators/*` | [`routes::supporters`] | Leaderboards  |
//! | `/v1/missions/*`       | [`routes::missions`]     | Creator missions            |
//! | `/v1/pricing/*`        | [`routes::pricing`]      | Dynamic pricing             |
//! | `/v1/jobs/*`           | [`routes::jobs`]         | Scheduled jobs              |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros, served at `/openapi.json`.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use packs_refund::RefundStatus;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::config::parse_flag;
use crate::middleware::metrics::ApiMetrics;

pub use error::AppError;
pub use state::AppState;

/// `PACKS_METRICS_ENABLED`; defaults to on.
fn metrics_enabled() -> bool {
    std::env::var("PACKS_METRICS_ENABLED")
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(true)
}

fn build_metrics() -> Option<ApiMetrics> {
    if !metrics_enabled() {
        return None;
    }
    match ApiMetrics::new() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::error!(error = %e, "failed to register Prometheus metrics; /metrics disabled");
            None
        }
    }
}

/// Assemble the full application router with all routes and middleware.
///
/// Health checks (`/health/*`), `/metrics` and `/openapi.json` are mounted
/// outside the auth middleware so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = build_metrics();

    let api = Router::new()
        .merge(routes::wallets::router())
        .merge(routes::ledger::router())
        .merge(routes::escrows::router())
        .merge(routes::refunds::router())
        .merge(routes::admin::router())
        .merge(routes::fraud::router())
        .merge(routes::safety::router())
        .merge(routes::abuse::router())
        .merge(routes::supporters::router())
        .merge(routes::missions::router())
        .merge(routes::pricing::router())
        .merge(routes::jobs::router());

    // 2 MiB body limit.
    let mut api = api
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(auth::auth_middleware));

    if let Some(m) = &metrics {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(m.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state.clone());

    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .merge(openapi::router());

    if let Some(m) = metrics {
        unauthenticated = unauthenticated
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(m));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics — Prometheus scrape endpoint.
///
/// Domain gauges are refreshed from `AppState` on each scrape.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    {
        let book = state.book.lock();
        metrics.escrows_total().reset();
        for (status, count) in book.count_by_status() {
            metrics
                .escrows_total()
                .with_label_values(&[status.as_str()])
                .set(count as f64);
        }
        metrics
            .platform_balance()
            .set(book.platform_balance().value() as f64);
        metrics
            .ledger_entries_total()
            .set(book.ledger().len() as f64);
    }

    {
        let requests = state.refunds.lock().list();
        metrics.refund_requests_total().reset();
        for status in RefundStatus::ALL {
            let count = requests.iter().filter(|r| r.status == status).count();
            metrics
                .refund_requests_total()
                .with_label_values(&[status.as_str()])
                .set(count as f64);
        }
    }

    metrics
        .fraud_records_total()
        .set(state.fraud_records.read().len() as f64);

    {
        let firewall = state.firewall.lock();
        metrics.offenders_total().reset();
        for (sanction, count) in firewall.count_by_sanction() {
            metrics
                .offenders_total()
                .with_label_values(&[sanction.as_str()])
                .set(count as f64);
        }
    }

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness check. Always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check.
///
/// Ready once startup hydration has loaded and verified the journal, and
/// the database (when configured) answers.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if !state.is_ready() {
        return (StatusCode::SERVICE_UNAVAILABLE, "hydrating").into_response();
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
