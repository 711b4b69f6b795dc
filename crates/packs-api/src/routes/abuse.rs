//! # Abuse Firewall Routes
//!
//! Message screening before delivery, and offender records for staff.
//! A flagged or blocked message adds strikes to the sender and lowers
//! their conduct score.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use packs_core::UserId;
use packs_rules::OffenderRecord;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{acting_user, require_self_or, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::state::AppState;

/// A message to screen.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScreenRequest {
    /// Sender. Defaults to the caller.
    pub sender_id: Option<Uuid>,
    pub text: String,
}

impl Validate for ScreenRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("text", &self.text)
    }
}

/// A sender's strike record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OffenderResponse {
    pub user_id: String,
    pub strikes: u32,
    pub violations: u32,
    /// `NONE`, `WARNING`, `MUTE`, `SUSPENSION` or `BAN`.
    pub sanction: String,
    pub sanction_until: Option<String>,
    /// Whether the sender may not send messages right now.
    pub silenced: bool,
    pub last_violation_at: String,
}

/// Screening verdict.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScreenResponse {
    /// `ALLOW`, `FLAG` or `BLOCK`.
    pub verdict: String,
    pub categories: Vec<String>,
    pub max_severity: u32,
    pub matched: Vec<String>,
    /// The sender's record after this message, when it was not allowed.
    pub offender: Option<OffenderResponse>,
}

/// Build the abuse router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/abuse/screen", post(screen_message))
        .route("/v1/abuse/:user", get(get_offender))
}

fn offender_to_response(o: &OffenderRecord) -> OffenderResponse {
    OffenderResponse {
        user_id: o.user.to_string(),
        strikes: o.strikes,
        violations: o.violations,
        sanction: o.sanction.as_str().to_string(),
        sanction_until: o.sanction_until.map(|t| t.to_rfc3339()),
        silenced: o.is_silenced(Utc::now()),
        last_violation_at: o.last_violation_at.to_rfc3339(),
    }
}

/// POST /v1/abuse/screen — Screen a message.
#[utoipa::path(
    post,
    path = "/v1/abuse/screen",
    request_body = ScreenRequest,
    responses(
        (status = 200, description = "Verdict", body = ScreenResponse),
        (status = 403, description = "Users may only screen their own messages"),
        (status = 422, description = "Empty text"),
    ),
    tag = "abuse"
)]
async fn screen_message(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ScreenRequest>, JsonRejection>,
) -> Result<Json<ScreenResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let sender = acting_user(&caller, req.sender_id.map(UserId::from_uuid))?;
    let now = Utc::now();

    let outcome = state.firewall.lock().screen_message(sender, &req.text, now);
    if let Some(event) = outcome.safety_event {
        state.apply_safety_event(sender, event, now);
    }

    let result = outcome.result;
    Ok(Json(ScreenResponse {
        verdict: result.verdict.as_str().to_string(),
        categories: result.categories.iter().map(|c| c.as_str().to_string()).collect(),
        max_severity: result.max_severity,
        matched: result.matched,
        offender: outcome.offender.as_ref().map(offender_to_response),
    }))
}

/// GET /v1/abuse/:user — A user's offender record.
#[utoipa::path(
    get,
    path = "/v1/abuse/{user}",
    params(("user" = Uuid, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Offender record", body = OffenderResponse),
        (status = 403, description = "Not the user or a moderator"),
        (status = 404, description = "User has never been flagged"),
    ),
    tag = "abuse"
)]
async fn get_offender(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(user): Path<Uuid>,
) -> Result<Json<OffenderResponse>, AppError> {
    let user = UserId::from_uuid(user);
    require_self_or(&caller, &user, Role::Moderator)?;
    let firewall = state.firewall.lock();
    let record = firewall
        .offender(&user)
        .ok_or_else(|| AppError::NotFound(format!("no offender record for {user}")))?;
    Ok(Json(offender_to_response(record)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{app_as, body_json, get_request, json_request};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    async fn screen(state: &AppState, sender: UserId, text: &str) -> ScreenResponse {
        let resp = app_as(router(), state.clone(), CallerIdentity::user(sender))
            .oneshot(json_request(
                "POST",
                "/v1/abuse/screen",
                serde_json::json!({"text": text}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await
    }

    #[tokio::test]
    async fn clean_message_allowed() {
        let state = AppState::new();
        let body = screen(&state, UserId::new(), "Thanks for the call today!").await;
        assert_eq!(body.verdict, "ALLOW");
        assert!(body.offender.is_none());
    }

    #[tokio::test]
    async fn threat_blocked_and_sanctioned() {
        let state = AppState::new();
        let sender = UserId::new();
        let body = screen(&state, sender, "I know where you live.").await;
        assert_eq!(body.verdict, "BLOCK");
        assert_eq!(body.categories, vec!["threat"]);
        let offender = body.offender.unwrap();
        assert_eq!(offender.strikes, 5);
        assert_eq!(offender.sanction, "MUTE");
        assert!(offender.silenced);

        assert_eq!(state.safety_score(sender, Utc::now()).conduct, 75);

        let resp = app_as(router(), state, CallerIdentity::user(sender))
            .oneshot(get_request(&format!("/v1/abuse/{sender}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let record: OffenderResponse = body_json(resp).await;
        assert_eq!(record.violations, 1);
    }

    #[tokio::test]
    async fn insult_flagged_with_warning() {
        let state = AppState::new();
        let body = screen(&state, UserId::new(), "what a LOSER").await;
        assert_eq!(body.verdict, "FLAG");
        assert_eq!(body.offender.unwrap().sanction, "WARNING");
    }

    #[tokio::test]
    async fn unflagged_user_has_no_record() {
        let user = UserId::new();
        let resp = app_as(router(), AppState::new(), CallerIdentity::user(user))
            .oneshot(get_request(&format!("/v1/abuse/{user}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn users_cannot_screen_as_others() {
        let resp = app_as(router(), AppState::new(), CallerIdentity::user(UserId::new()))
            .oneshot(json_request(
                "POST",
                "/v1/abuse/screen",
                serde_json::json!({"sender_id": Uuid::new_v4(), "text": "hello"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
