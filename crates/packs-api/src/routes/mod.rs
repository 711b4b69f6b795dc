//! # API Route Modules
//!
//! - `wallets` — wallet top-ups and balances.
//! - `ledger` — hash-chain verification of the journal.
//! - `escrows` — open, read and payer-release escrows.
//! - `refunds` — submit and read refund requests; the tier-2 review queue.
//! - `admin` — administrator overrides for refunds and escrows.
//! - `fraud` — fraud detection audit log.
//! - `safety` — safety events and scores.
//! - `abuse` — message screening and offender records.
//! - `supporters` — supporter spend and creator leaderboards.
//! - `missions` — creator mission progress and activity.
//! - `pricing` — dynamic price quotes.
//! - `jobs` — job schedules and manual triggers.
//!
//! Every handler resolves the caller's [`CallerIdentity`](crate::auth::CallerIdentity)
//! first. Financial changes run through [`AppState::transact`](crate::state::AppState::transact),
//! which rolls them back if the database write fails. Rankings, missions
//! and safety scores are updated only after that write commits.

pub mod abuse;
pub mod admin;
pub mod escrows;
pub mod fraud;
pub mod jobs;
pub mod ledger;
pub mod missions;
pub mod pricing;
pub mod refunds;
pub mod safety;
pub mod supporters;
pub mod wallets;

use packs_core::UserId;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;

/// Parse a wire code into one of the serde-named domain enums.
pub(crate) fn parse_code<T: DeserializeOwned>(field: &str, raw: &str) -> Result<T, AppError> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string()))
        .map_err(|_| AppError::Validation(format!("unknown {field}: '{raw}'")))
}

/// The user recorded as resolver for staff actions. Staff tokens without a
/// user binding resolve as the nil id.
pub(crate) fn staff_actor(caller: &CallerIdentity) -> UserId {
    caller
        .user_id
        .unwrap_or_else(|| UserId::from_uuid(Uuid::nil()))
}

/// Default and maximum list sizes.
pub(crate) fn clamp_limit(limit: Option<usize>, default: usize, max: usize) -> usize {
    limit.unwrap_or(default).clamp(1, max)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::response::Response;
    use axum::Router;
    use http_body_util::BodyExt;

    use crate::auth::CallerIdentity;
    use crate::state::AppState;

    /// Serve `router` with `caller` injected as the authenticated identity.
    pub fn app_as(router: Router<AppState>, state: AppState, caller: CallerIdentity) -> Router<()> {
        router.layer(axum::Extension(caller)).with_state(state)
    }

    /// Decode a JSON response body.
    pub async fn body_json<T: serde::de::DeserializeOwned>(resp: Response) -> T {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Build a JSON request.
    pub fn json_request(
        method: &str,
        uri: &str,
        body: serde_json::Value,
    ) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    /// Build a body-less GET request.
    pub fn get_request(uri: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap()
    }
    /// State whose database refuses every connection.
    pub fn unreachable_db_state() -> AppState {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://packs@127.0.0.1:1/packs")
            .unwrap();
        AppState::with_config(crate::config::AppConfig::default(), Some(pool))
    }
}
