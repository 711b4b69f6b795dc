//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps ledger, refund and validation errors to HTTP status codes with a
//! JSON body carrying a machine-readable code and a message. Internal
//! failures (broken hash chain, unbalanced entries, database errors) are
//! logged and surfaced as an opaque 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use packs_core::ValidationError;
use packs_ledger::LedgerError;
use packs_refund::RefundError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CONFLICT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the role or ownership the operation needs (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with the current state of an escrow or refund request (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if let Self::Internal(_) = &self {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::EscrowNotFound(_) => Self::NotFound(err.to_string()),
            LedgerError::InsufficientFunds { .. }
            | LedgerError::InvalidEscrowOperation { .. }
            | LedgerError::ReleaseNotYetEligible { .. } => Self::Conflict(err.to_string()),
            LedgerError::RefundExceedsTotal { .. }
            | LedgerError::SelfEscrow
            | LedgerError::ZeroAmount
            | LedgerError::Validation(_) => Self::Validation(err.to_string()),
            LedgerError::AmountOverflow { .. }
            | LedgerError::Overdraw { .. }
            | LedgerError::Unbalanced { .. }
            | LedgerError::ChainBroken { .. }
            | LedgerError::Digest(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<RefundError> for AppError {
    fn from(err: RefundError) -> Self {
        match err {
            RefundError::Ledger(inner) => inner.into(),
            RefundError::RequestNotFound(_) => Self::NotFound(err.to_string()),
            RefundError::NotPayer { .. } => Self::Forbidden(err.to_string()),
            RefundError::EscrowNotRefundable { .. }
            | RefundError::RefundWindowClosed { .. }
            | RefundError::DuplicatePending { .. }
            | RefundError::InvalidRequestState { .. } => Self::Conflict(err.to_string()),
            RefundError::DisallowedReason(_)
            | RefundError::EvidenceRequired { .. }
            | RefundError::EvidenceMismatch { .. }
            | RefundError::Validation(_) => Self::Validation(err.to_string()),
        }
    }
}
