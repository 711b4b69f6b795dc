//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{user_id}:{secret}   — role-scoped caller
//! Bearer {secret}                    — legacy format (treated as admin)
//! ```
//!
//! `user_id` may be empty for staff tokens that act across users. The
//! platform identity system issues tokens; this service only parses them.
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use packs_core::UserId;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Role ────────────────────────────────────────────────────────────────────

/// Caller roles, ordered by privilege: `User < Moderator < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A platform member acting on their own wallet, escrows and requests.
    User,
    /// Trust-and-safety staff: review queue, fraud log, safety scores.
    Moderator,
    /// Full access, including overrides and manual job runs.
    Admin,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The caller's role.
    pub role: Role,
    /// The caller's user id. `None` for staff tokens without a user binding.
    pub user_id: Option<UserId>,
}

impl CallerIdentity {
    /// Identity injected when authentication is disabled.
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            user_id: None,
        }
    }

    /// A user-role caller bound to `user`.
    pub fn user(user: UserId) -> Self {
        Self {
            role: Role::User,
            user_id: Some(user),
        }
    }

    /// Check if the caller has at least the given minimum role.
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }

    /// Whether the caller is `user` or holds at least `staff`.
    pub fn is_self_or(&self, user: &UserId, staff: Role) -> bool {
        self.user_id.as_ref() == Some(user) || self.has_role(staff)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has at least the required role.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role.as_str()
        )))
    }
}

/// Check that the caller is `user`, or staff of at least `staff`.
pub fn require_self_or(caller: &CallerIdentity, user: &UserId, staff: Role) -> Result<(), AppError> {
    if caller.is_self_or(user, staff) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "caller may only access their own records (or be '{}')",
            staff.as_str()
        )))
    }
}

/// Resolve the user a request acts for.
///
/// Users act for themselves; `requested` must be absent or equal their own
/// id. Moderators and admins act for whoever `requested` names.
pub fn acting_user(caller: &CallerIdentity, requested: Option<UserId>) -> Result<UserId, AppError> {
    match (caller.role, requested, caller.user_id) {
        (Role::User, Some(req), Some(own)) if req != own => Err(AppError::Forbidden(
            "users may only act on their own behalf".into(),
        )),
        (_, Some(req), _) => Ok(req),
        (_, None, Some(own)) => Ok(own),
        (_, None, None) => Err(AppError::Validation(
            "caller token has no user binding; supply the user id explicitly".into(),
        )),
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// A secret string whose `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Auth configuration injected into request extensions.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token: Option<SecretString>,
}

// ── Token Validation ────────────────────────────────────────────────────────

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token in format `{role}:{user_id}:{secret}` or `{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.as_slice() {
        [secret] => {
            if constant_time_token_eq(secret, expected_secret) {
                Ok(CallerIdentity::admin())
            } else {
                Err("invalid bearer token".into())
            }
        }
        [role_str, user_str, secret] => {
            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }

            let role = match *role_str {
                "admin" => Role::Admin,
                "moderator" => Role::Moderator,
                "user" => Role::User,
                other => return Err(format!("unknown role: {other}")),
            };

            let user_id = if user_str.is_empty() {
                None
            } else {
                Some(
                    user_str
                        .parse::<UserId>()
                        .map_err(|e| format!("invalid user_id: {e}"))?,
                )
            };

            if role == Role::User && user_id.is_none() {
                return Err("user tokens must carry a user_id".into());
            }

            Ok(CallerIdentity { role, user_id })
        }
        _ => Err("invalid token format, expected {role}:{user_id}:{secret} or {secret}".into()),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token and inject the caller's [`CallerIdentity`].
///
/// When `AuthConfig.token` is `None`, every request runs as admin.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());

    let Some(expected) = expected_token else {
        request.extensions_mut().insert(CallerIdentity::admin());
        return next.run(request).await;
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => match header_value.strip_prefix("Bearer ") {
            Some(provided) => match parse_bearer_token(provided, expected.expose()) {
                Ok(identity) => {
                    request.extensions_mut().insert(identity);
                    next.run(request).await
                }
                Err(msg) => {
                    tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                    unauthorized_response(&msg)
                }
            },
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                unauthorized_response("authorization header must use Bearer scheme")
            }
        },
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(token: Option<&str>) -> Router {
        let auth_config = AuthConfig {
            token: token.map(SecretString::new),
        };
        Router::new()
            .route(
                "/whoami",
                get(|caller: CallerIdentity| async move { caller.role.as_str() }),
            )
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(auth_config))
    }

    async fn call(app: Router, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn legacy_token_is_admin() {
        let (status, body) = call(test_app(Some("s3cret")), Some("Bearer s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin");
    }

    #[tokio::test]
    async fn scoped_token_carries_role() {
        let user = UserId::new();
        let header = format!("Bearer user:{user}:s3cret");
        let (status, body) = call(test_app(Some("s3cret")), Some(&header)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user");

        let (status, body) = call(test_app(Some("s3cret")), Some("Bearer moderator::s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "moderator");
    }

    #[tokio::test]
    async fn missing_header_rejected() {
        let (status, body) = call(test_app(Some("s3cret")), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let err: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(err["error"]["code"], "UNAUTHORIZED");
        assert!(err["error"]["message"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn wrong_secret_and_scheme_rejected() {
        let (status, _) = call(test_app(Some("s3cret")), Some("Bearer admin::nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = call(test_app(Some("s3cret")), Some("Basic dXNlcjpwYXNz")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Bearer scheme"));
    }

    #[tokio::test]
    async fn auth_disabled_injects_admin() {
        let (status, body) = call(test_app(None), Some("Bearer anything")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin");
    }

    #[test]
    fn unknown_role_and_unbound_user_rejected() {
        assert!(parse_bearer_token("superuser::s", "s")
            .unwrap_err()
            .contains("unknown role"));
        assert!(parse_bearer_token("user::s", "s").is_err());
        assert!(parse_bearer_token("user:not-a-uuid:s", "s").is_err());
    }

    #[test]
    fn constant_time_eq_rejects_prefix_and_empty() {
        assert!(constant_time_token_eq("token-1", "token-1"));
        assert!(!constant_time_token_eq("token", "token-1"));
        assert!(!constant_time_token_eq("", "token-1"));
    }

    #[test]
    fn role_ordering() {
        assert!(Role::User < Role::Moderator);
        assert!(Role::Moderator < Role::Admin);
        let mod_caller = CallerIdentity {
            role: Role::Moderator,
            user_id: None,
        };
        assert!(require_role(&mod_caller, Role::Moderator).is_ok());
        assert!(matches!(
            require_role(&mod_caller, Role::Admin),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn acting_user_rules() {
        let me = UserId::new();
        let other = UserId::new();
        let caller = CallerIdentity::user(me);
        assert_eq!(acting_user(&caller, None).unwrap(), me);
        assert_eq!(acting_user(&caller, Some(me)).unwrap(), me);
        assert!(acting_user(&caller, Some(other)).is_err());

        let admin = CallerIdentity::admin();
        assert_eq!(acting_user(&admin, Some(other)).unwrap(), other);
        assert!(matches!(acting_user(&admin, None), Err(AppError::Validation(_))));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let cfg = AuthConfig {
            token: Some(SecretString::new("hunter2")),
        };
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("REDACTED"));
    }
}
